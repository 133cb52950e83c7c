use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartId, EntryId, JournalEntry, JournalError, Result, Sequence,
    store::{AppendOptions, Journal, validate_append},
};

/// PostgreSQL-backed journal.
#[derive(Debug, Clone)]
pub struct PostgresJournal {
    pool: PgPool,
}

impl PostgresJournal {
    /// Creates a journal on top of an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a journal.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_entry(row: PgRow) -> Result<JournalEntry> {
        Ok(JournalEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            stream_id: CartId::new(row.try_get::<String, _>("stream_id")?),
            stream_kind: row.try_get("stream_kind")?,
            sequence: Sequence::new(row.try_get("sequence")?),
            event_type: row.try_get("event_type")?,
            recorded_at: row.try_get("recorded_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl Journal for PostgresJournal {
    async fn append(
        &self,
        entries: Vec<JournalEntry>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        validate_append(&entries)?;

        let Some(stream_id) = entries.first().map(|entry| entry.stream_id.clone()) else {
            return Err(JournalError::InvalidAppend("empty batch".to_string()));
        };

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_sequence {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence) FROM journal WHERE stream_id = $1")
                    .bind(stream_id.as_str())
                    .fetch_one(&mut *tx)
                    .await?;

            let actual = Sequence::new(current.unwrap_or(0));
            if actual != expected {
                return Err(JournalError::SequenceConflict {
                    stream_id,
                    expected,
                    actual,
                });
            }
        }

        let count = entries.len();
        let mut last = Sequence::initial();
        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO journal (id, stream_id, stream_kind, sequence, event_type, recorded_at, payload)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(entry.entry_id.as_uuid())
            .bind(entry.stream_id.as_str())
            .bind(&entry.stream_kind)
            .bind(entry.sequence.as_i64())
            .bind(&entry.event_type)
            .bind(entry.recorded_at)
            .bind(&entry.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_stream_sequence")
                {
                    return JournalError::SequenceConflict {
                        stream_id: stream_id.clone(),
                        expected: options.expected_sequence.unwrap_or(Sequence::initial()),
                        actual: entry.sequence,
                    };
                }
                JournalError::Database(e)
            })?;

            last = entry.sequence;
        }

        tx.commit().await?;
        metrics::counter!("journal_entries_appended_total").increment(count as u64);
        tracing::debug!(stream_id = %stream_id, sequence = %last, "journal append committed");
        Ok(last)
    }

    async fn read_stream(&self, stream_id: &CartId) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, stream_id, stream_kind, sequence, event_type, recorded_at, payload
            FROM journal
            WHERE stream_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(stream_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn list_streams(&self, stream_kind: &str) -> Result<Vec<CartId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT stream_id
            FROM journal
            WHERE stream_kind = $1 AND sequence = 1
            ORDER BY recorded_at ASC, stream_id ASC
            "#,
        )
        .bind(stream_kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(CartId::new).collect())
    }
}
