//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use journal::{InMemoryJournal, Journal, PostgresJournal};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn open_journal(config: &Config) -> Arc<dyn Journal> {
    match &config.database_url {
        Some(url) => {
            let journal = PostgresJournal::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            journal
                .run_migrations()
                .await
                .expect("failed to run journal migrations");
            tracing::info!("using PostgreSQL journal");
            Arc::new(journal)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, carts will not survive a restart");
            Arc::new(InMemoryJournal::new())
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the journal and bring back every cart it holds
    let journal = open_journal(&config).await;
    let runtime = api::create_runtime(journal, config.process_options());
    let report = runtime.recover().await.expect("cart recovery failed");
    tracing::info!(
        resumed = report.resumed.len(),
        closed = report.closed.len(),
        "carts recovered"
    );

    // 4. Build the application
    let app = api::create_app(runtime.clone(), metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    runtime.shutdown().await;
    tracing::info!("server shut down gracefully");
}
