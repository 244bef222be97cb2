//! Gateway request/response shapes and the values the processor exchanges
//! with checkout and order placement.

use crate::domain::Basket;
use crate::payments::errors::{PaymentError, PaymentResult};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Resolved request descriptor handed to the client executor
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

/// Uniform success/failure envelope returned by every gateway operation
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub ok: bool,
    pub status: u16,
    /// Decoded body, `None` when the body was not valid JSON
    pub payload: Option<Value>,
}

impl GatewayResponse {
    /// Gateway's human readable `message`, if any
    pub fn message(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("message"))
            .and_then(Value::as_str)
    }

    /// Raw `data` object of the gateway envelope
    pub fn data_value(&self) -> Option<&Value> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("data"))
            .filter(|d| !d.is_null())
    }

    /// Deserialize the `data` object into an operation specific shape
    pub fn data<T: DeserializeOwned>(&self) -> PaymentResult<T> {
        let data = self
            .data_value()
            .ok_or_else(|| PaymentError::malformed("data"))?;
        serde_json::from_value(data.clone()).map_err(|e| PaymentError::malformed(format!("data: {}", e)))
    }
}

/// Display-only field shown on the hosted payment page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub display_name: String,
    pub variable_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub cancel_action: String,
    pub order_number: String,
    pub basket_id: i64,
    pub custom_fields: Vec<CustomField>,
}

/// Initialize-transaction payload built from a basket; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Amount in the smallest currency unit (kobo for NGN)
    pub amount: String,
    pub email: String,
    pub callback_url: String,
    pub metadata: TransactionMetadata,
}

/// What checkout needs to send the payer to the hosted payment page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionParameters {
    pub payment_page_url: String,
}

// Initialize transaction response data
#[derive(Debug, Clone, Deserialize)]
pub struct InitializedTransaction {
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
}

/// Metadata echoed back by the gateway on verification
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EchoedMetadata {
    #[serde(default)]
    pub basket_id: Option<Value>,
    #[serde(default)]
    pub order_number: Option<String>,
}

impl EchoedMetadata {
    /// Parse the echoed basket id, returning the raw value on failure
    pub fn basket_id(&self) -> Result<i64, String> {
        match &self.basket_id {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| n.to_string()),
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| s.clone()),
            Some(other) => Err(other.to_string()),
            None => Err("null".to_string()),
        }
    }
}

// Verify transaction response data
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedTransaction {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<EchoedMetadata>,
    #[serde(default)]
    pub authorization: Option<Authorization>,
}

impl VerifiedTransaction {
    pub fn metadata(&self) -> EchoedMetadata {
        self.metadata.clone().unwrap_or_default()
    }
}

// Create/fetch refund response data
#[derive(Debug, Clone, Deserialize)]
pub struct RefundData {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Normalized outcome of a successful transaction, consumed by order placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandledProcessorResponse {
    pub transaction_id: String,
    pub total: Decimal,
    pub currency: String,
    /// Masked card digits
    pub card_number: Option<String>,
    pub card_type: Option<String>,
}

/// Request to refund a captured payment
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_number: String,
    pub basket: Basket,
    /// Gateway transaction reference being refunded
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Successful refund paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// Gateway confirmed a new refund as processed
    Refunded { refund_id: String },
    /// Gateway reports the transaction was already reversed
    AlreadyReversed { reference: String },
}

impl RefundOutcome {
    /// Reference to store against the local refund
    pub fn reference(&self) -> &str {
        match self {
            RefundOutcome::Refunded { refund_id } => refund_id,
            RefundOutcome::AlreadyReversed { reference } => reference,
        }
    }
}

/// Webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    pub fn reference(&self) -> Option<&str> {
        self.data.get("reference").and_then(Value::as_str)
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(payload: Value) -> GatewayResponse {
        GatewayResponse {
            ok: true,
            status: 200,
            payload: Some(payload),
        }
    }

    #[test]
    fn test_verified_transaction_accepts_numeric_ids() {
        let resp = response(json!({
            "status": true,
            "data": {
                "id": 4099260516u64,
                "amount": 10000,
                "currency": "NGN",
                "metadata": {"basket_id": 12, "order_number": "EDX-100012"},
                "authorization": {"last4": "4081", "card_type": "visa "}
            }
        }));
        let data: VerifiedTransaction = resp.data().unwrap();
        assert_eq!(data.id.as_deref(), Some("4099260516"));
        assert_eq!(data.amount.as_deref(), Some("10000"));
        assert_eq!(data.metadata().basket_id(), Ok(12));
    }

    #[test]
    fn test_basket_id_parsing() {
        let meta = |v: Value| EchoedMetadata {
            basket_id: Some(v),
            order_number: None,
        };
        assert_eq!(meta(json!("42")).basket_id(), Ok(42));
        assert_eq!(meta(json!("forty")).basket_id(), Err("forty".to_string()));
        assert_eq!(meta(json!(1.5)).basket_id(), Err("1.5".to_string()));
        assert!(EchoedMetadata::default().basket_id().is_err());
    }

    #[test]
    fn test_missing_data_is_malformed() {
        let resp = GatewayResponse {
            ok: true,
            status: 200,
            payload: None,
        };
        let err = resp.data::<RefundData>().unwrap_err();
        assert!(matches!(err, PaymentError::MalformedResponse { .. }));
    }

    #[test]
    fn test_message_is_read_from_payload() {
        let resp = response(json!({"status": false, "message": "Transaction has been fully reversed"}));
        assert_eq!(resp.message(), Some("Transaction has been fully reversed"));
        assert!(resp.data_value().is_none());
    }
}
