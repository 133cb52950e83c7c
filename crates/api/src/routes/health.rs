//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use workflow::CartRuntime;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Cart processes currently known to the runtime.
    pub carts: usize,
}

/// GET /health: liveness, plus how many carts are loaded.
pub async fn check(State(runtime): State<CartRuntime>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        carts: runtime.len().await,
    })
}
