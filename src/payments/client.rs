//! Paystack HTTP client
//!
//! Stateless protocol adapter: turns one of the four gateway operations into
//! an HTTP request and hands back a uniform [`GatewayResponse`]. It makes no
//! decisions about what a response means for baskets or orders.

use crate::payments::errors::{MissingClientArgument, PaymentError, PaymentResult};
use crate::payments::types::{GatewayRequest, GatewayResponse};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use sha2::Sha512;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

pub const INITIALIZE_TRANSACTION_CODE: &str = "initialize_transaction";
pub const VERIFY_TRANSACTION_CODE: &str = "verify_transaction";
pub const CREATE_REFUND_CODE: &str = "create_refund";
pub const FETCH_REFUND_CODE: &str = "fetch_refund";

const GET_METHOD: &str = "GET";
const POST_METHOD: &str = "POST";
const CONTENT_TYPE_JSON: &str = "application/json";
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// The four gateway operations the client knows how to send
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOperation {
    InitializeTransaction(Value),
    VerifyTransaction(String),
    CreateRefund(String),
    FetchRefund(String),
}

impl GatewayOperation {
    /// Map a string operation code and its argument onto an operation
    pub fn from_code(code: &str, data: Value) -> PaymentResult<Self> {
        let as_id = |data: Value| -> PaymentResult<String> {
            match data {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(PaymentError::malformed(format!(
                    "{} argument {}",
                    code, other
                ))),
            }
        };

        match code {
            INITIALIZE_TRANSACTION_CODE => Ok(Self::InitializeTransaction(data)),
            VERIFY_TRANSACTION_CODE => Ok(Self::VerifyTransaction(as_id(data)?)),
            CREATE_REFUND_CODE => Ok(Self::CreateRefund(as_id(data)?)),
            FETCH_REFUND_CODE => Ok(Self::FetchRefund(as_id(data)?)),
            other => Err(PaymentError::invalid_gateway_operation(other)),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InitializeTransaction(_) => INITIALIZE_TRANSACTION_CODE,
            Self::VerifyTransaction(_) => VERIFY_TRANSACTION_CODE,
            Self::CreateRefund(_) => CREATE_REFUND_CODE,
            Self::FetchRefund(_) => FETCH_REFUND_CODE,
        }
    }

    /// Resolve the operation into its request descriptor
    pub fn request(&self) -> GatewayRequest {
        match self {
            Self::InitializeTransaction(data) => PaystackClient::initialize_transaction(data),
            Self::VerifyTransaction(reference) => PaystackClient::verify_transaction(reference),
            Self::CreateRefund(transaction_id) => PaystackClient::create_refund(transaction_id),
            Self::FetchRefund(refund_id) => PaystackClient::fetch_refund(refund_id),
        }
    }
}

/// Transport settings for outbound gateway calls
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound on a single request, connect to last body byte
    pub timeout: Duration,
    /// Retries for requests that never reached the gateway
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl ClientOptions {
    /// Exponential delay before retry `attempt`, capped at thirty seconds
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(MAX_RETRY_BACKOFF)
    }
}

/// Paystack API client
pub struct PaystackClient {
    base_url: String,
    authorization_key: String,
    options: ClientOptions,
    http: Client,
}

impl fmt::Debug for PaystackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackClient")
            .field("base_url", &self.base_url)
            .field("authorization_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl PaystackClient {
    /// Create a client for `base_url` authenticating with `authorization_key`.
    ///
    /// Both arguments are required; the error names whichever is missing.
    pub fn new(
        base_url: &str,
        authorization_key: &str,
        options: ClientOptions,
    ) -> PaymentResult<Self> {
        let missing = match (base_url.trim().is_empty(), authorization_key.trim().is_empty()) {
            (false, false) => None,
            (true, true) => Some(MissingClientArgument::Both),
            (true, false) => Some(MissingClientArgument::BaseUrl),
            (false, true) => Some(MissingClientArgument::AuthorizationKey),
        };
        if let Some(missing) = missing {
            let err = PaymentError::InvalidClientArgument { missing };
            error!("{}", err);
            return Err(err);
        }

        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("paystack-checkout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                PaymentError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization_key: authorization_key.to_string(),
            options,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request URL for a path relative to the base end point
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn initialize_transaction(data: &Value) -> GatewayRequest {
        GatewayRequest {
            method: POST_METHOD.to_string(),
            path: "/transaction/initialize".to_string(),
            body: Some(data.clone()),
        }
    }

    pub fn verify_transaction(reference: &str) -> GatewayRequest {
        GatewayRequest {
            method: GET_METHOD.to_string(),
            path: format!("/transaction/verify/{}", reference),
            body: None,
        }
    }

    pub fn create_refund(transaction_id: &str) -> GatewayRequest {
        GatewayRequest {
            method: POST_METHOD.to_string(),
            path: "/refund".to_string(),
            body: Some(json!({ "transaction": transaction_id })),
        }
    }

    pub fn fetch_refund(refund_id: &str) -> GatewayRequest {
        GatewayRequest {
            method: GET_METHOD.to_string(),
            path: format!("/refund/{}", refund_id),
            body: None,
        }
    }

    /// Build and send a gateway operation
    pub async fn handle(&self, operation: GatewayOperation) -> PaymentResult<GatewayResponse> {
        self.execute(operation.request()).await
    }

    /// Send an operation identified by its string code
    pub async fn dispatch(&self, code: &str, data: Value) -> PaymentResult<GatewayResponse> {
        let operation = GatewayOperation::from_code(code, data)?;
        self.handle(operation).await
    }

    /// Execute a resolved request descriptor against the gateway
    pub async fn execute(&self, request: GatewayRequest) -> PaymentResult<GatewayResponse> {
        let method = match request.method.to_ascii_uppercase().as_str() {
            GET_METHOD => Method::GET,
            POST_METHOD => Method::POST,
            _ => return Err(PaymentError::invalid_request_method(request.method)),
        };
        let url = self.url(&request.path);

        info!("Sending paystack {} request on URL: {}", method, url);

        let mut attempt = 0;
        let response = loop {
            let mut builder = self
                .http
                .request(method.clone(), &url)
                .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                .header(AUTHORIZATION, format!("Bearer {}", self.authorization_key));
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => break response,
                // The request never reached the gateway, so resending cannot duplicate it
                Err(e) if e.is_connect() && attempt < self.options.max_retries => {
                    let backoff = self.options.backoff(attempt);
                    warn!(
                        "Paystack connection failed, retrying after {:?} (attempt {}): {}",
                        backoff,
                        attempt + 1,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Paystack {} request on URL {} failed: {}", method, url, e);
                    return Err(e.into());
                }
            }
        };

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read Paystack response body from {}: {}", url, e);
            PaymentError::from(e)
        })?;

        Ok(Self::parse_response(status, &body))
    }

    /// Decode a gateway body; success is decided by the HTTP status alone
    pub fn parse_response(status: u16, body: &[u8]) -> GatewayResponse {
        let payload = serde_json::from_slice::<Value>(body).ok();
        if let Some(data) = &payload {
            let gateway_status = data.get("status").unwrap_or(&Value::Null);
            let gateway_message = data.get("message").unwrap_or(&Value::Null);
            info!(
                "Paystack status: {}, Paystack message: {}.",
                gateway_status, gateway_message
            );
        }

        let rendered = payload
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "null".to_string());
        let ok = matches!(status, 200 | 201);

        if ok {
            info!("Paystack API returned success response: {}.", rendered);
        } else {
            error!("Paystack API return response with status code: {}.", status);
            error!("Paystack API return Error response: {}.", rendered);
        }

        GatewayResponse {
            ok,
            status,
            payload,
        }
    }

    /// Check a webhook body against its `x-paystack-signature` header
    /// (hex HMAC-SHA512 keyed by the secret key)
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha512>::new_from_slice(self.authorization_key.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> PaystackClient {
        PaystackClient::new(
            "http://fake_base_url/",
            "fake_auth_key",
            ClientOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_base_url_and_key() {
        let cases = [
            ("", "", MissingClientArgument::Both),
            ("", "fake_key", MissingClientArgument::BaseUrl),
            ("fake_url", " ", MissingClientArgument::AuthorizationKey),
        ];
        for (base_url, key, expected) in cases {
            match PaystackClient::new(base_url, key, ClientOptions::default()) {
                Err(PaymentError::InvalidClientArgument { missing }) => assert_eq!(missing, expected),
                other => panic!("expected InvalidClientArgument, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_builders() {
        let data = json!({"amount": "1999"});
        assert_eq!(
            PaystackClient::initialize_transaction(&data),
            GatewayRequest {
                method: "POST".to_string(),
                path: "/transaction/initialize".to_string(),
                body: Some(data.clone()),
            }
        );
        let verify = PaystackClient::verify_transaction("abcdedgh");
        assert_eq!(verify.method, "GET");
        assert_eq!(verify.path, "/transaction/verify/abcdedgh");
        assert!(verify.body.is_none());

        let refund = PaystackClient::create_refund("T1");
        assert_eq!(refund.path, "/refund");
        assert_eq!(refund.body, Some(json!({"transaction": "T1"})));

        assert_eq!(PaystackClient::fetch_refund("77").path, "/refund/77");
    }

    #[test]
    fn test_from_code_maps_every_operation() {
        let op = GatewayOperation::from_code(FETCH_REFUND_CODE, json!(3018284)).unwrap();
        assert_eq!(op, GatewayOperation::FetchRefund("3018284".to_string()));
        assert_eq!(op.code(), FETCH_REFUND_CODE);

        let op = GatewayOperation::from_code(VERIFY_TRANSACTION_CODE, json!("ref")).unwrap();
        assert_eq!(op.request().path, "/transaction/verify/ref");

        let err = GatewayOperation::from_code("charge_card", json!({})).unwrap_err();
        assert!(matches!(err, PaymentError::InvalidGatewayOperation { code } if code == "charge_card"));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_code_without_io() {
        let client = create_test_client();
        let err = client.dispatch("unknown", json!("x")).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidGatewayOperation { .. }));
    }

    #[tokio::test]
    async fn test_execute_rejects_unsupported_method() {
        let client = create_test_client();
        let request = GatewayRequest {
            method: "DELETE".to_string(),
            path: "/refund/1".to_string(),
            body: None,
        };
        let err = client.execute(request).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequestMethod { method } if method == "DELETE"));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = create_test_client();
        assert_eq!(client.url("/refund"), "http://fake_base_url/refund");
    }

    #[test]
    fn test_parse_response_uses_status_only() {
        let ok = PaystackClient::parse_response(201, br#"{"status": true, "data": {}}"#);
        assert!(ok.ok);
        assert!(ok.payload.is_some());

        let not_json = PaystackClient::parse_response(200, b"<html>ok</html>");
        assert!(not_json.ok);
        assert!(not_json.payload.is_none());

        let failed = PaystackClient::parse_response(400, br#"{"status": false, "message": "some error message"}"#);
        assert!(!failed.ok);
        assert_eq!(failed.message(), Some("some error message"));

        let redirect = PaystackClient::parse_response(302, b"");
        assert!(!redirect.ok);
        assert!(redirect.payload.is_none());
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let options = ClientOptions::default();
        assert_eq!(options.backoff(0), Duration::from_millis(200));
        assert_eq!(options.backoff(2), Duration::from_millis(800));
        assert_eq!(options.backoff(40), MAX_RETRY_BACKOFF);
        assert_eq!(options.backoff(u32::MAX), MAX_RETRY_BACKOFF);
    }

    #[test]
    fn test_parse_response_logs_status_and_message_fields() {
        let response = PaystackClient::parse_response(
            200,
            br#"{"status": true, "message": "Verification successful", "data": {"id": 1}}"#,
        );
        assert!(response.ok);
        assert_eq!(response.message(), Some("Verification successful"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", create_test_client());
        assert!(!rendered.contains("fake_auth_key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_webhook_signature_validation() {
        let client = create_test_client();
        let payload = br#"{"event":"charge.success"}"#;

        let mut mac = Hmac::<Sha512>::new_from_slice(b"fake_auth_key").unwrap();
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(client.verify_webhook_signature(payload, &signature));
        assert!(!client.verify_webhook_signature(b"tampered", &signature));
        assert!(!client.verify_webhook_signature(payload, "invalid_signature"));
    }
}
