use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit entry of a raw gateway response.
///
/// Keyed by processor name and the transaction (or reference) id the
/// response belongs to. Rows are never updated or deleted; the ledger doubles
/// as the idempotency trail for manual recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorResponseRecord {
    pub id: Uuid,
    pub processor_name: String,
    pub transaction_id: String,
    pub response: serde_json::Value,
    pub basket_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A response about to be appended to the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessorResponse {
    pub processor_name: String,
    pub transaction_id: String,
    pub response: serde_json::Value,
    pub basket_id: Option<i64>,
}

impl NewProcessorResponse {
    /// `payload` is `None` when the gateway body could not be decoded
    pub fn new(
        processor_name: &str,
        transaction_id: impl Into<String>,
        payload: Option<&serde_json::Value>,
        basket_id: Option<i64>,
    ) -> Self {
        Self {
            processor_name: processor_name.to_string(),
            transaction_id: transaction_id.into(),
            response: payload.cloned().unwrap_or(serde_json::Value::Null),
            basket_id,
        }
    }

    pub fn into_record(self, created_at: DateTime<Utc>) -> ProcessorResponseRecord {
        ProcessorResponseRecord {
            id: Uuid::new_v4(),
            processor_name: self.processor_name,
            transaction_id: self.transaction_id,
            response: self.response,
            basket_id: self.basket_id,
            created_at,
        }
    }
}
