use crate::domain::{NewProcessorResponse, ProcessorResponseRecord};
use crate::store::{StoreError, StoreResult};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
struct ProcessorResponseRow {
    id: Uuid,
    processor_name: String,
    transaction_id: String,
    response: serde_json::Value,
    basket_id: Option<i64>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProcessorResponseRow> for ProcessorResponseRecord {
    fn from(row: ProcessorResponseRow) -> Self {
        Self {
            id: row.id,
            processor_name: row.processor_name,
            transaction_id: row.transaction_id,
            response: row.response,
            basket_id: row.basket_id,
            created_at: row.created_at,
        }
    }
}

/// Processor Response Repository for the append-only gateway ledger
pub struct ProcessorResponseRepository {
    pool: PgPool,
}

impl ProcessorResponseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a response on the pool, outside any unit of work
    pub async fn record(&self, response: NewProcessorResponse) -> StoreResult<ProcessorResponseRecord> {
        Self::insert(&self.pool, response).await
    }

    pub async fn insert<'e, E>(
        executor: E,
        response: NewProcessorResponse,
    ) -> StoreResult<ProcessorResponseRecord>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProcessorResponseRow>(
            "INSERT INTO processor_responses (id, processor_name, transaction_id, response, basket_id, created_at)
             VALUES ($1, $2, $3, $4, $5, clock_timestamp())
             RETURNING id, processor_name, transaction_id, response, basket_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&response.processor_name)
        .bind(&response.transaction_id)
        .bind(&response.response)
        .bind(response.basket_id)
        .fetch_one(executor)
        .await
        .map(ProcessorResponseRecord::from)
        .map_err(|e| {
            StoreError::from_sqlx(e).with_context(format!(
                "{} response {}",
                response.processor_name, response.transaction_id
            ))
        })
    }

    /// Entries for a transaction, oldest first
    pub async fn find_by_transaction(
        &self,
        processor_name: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<ProcessorResponseRecord>> {
        let rows = sqlx::query_as::<_, ProcessorResponseRow>(
            "SELECT id, processor_name, transaction_id, response, basket_id, created_at
             FROM processor_responses
             WHERE processor_name = $1 AND transaction_id = $2
             ORDER BY created_at ASC, id ASC",
        )
        .bind(processor_name)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(rows.into_iter().map(ProcessorResponseRecord::from).collect())
    }
}
