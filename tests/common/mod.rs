//! Shared fixtures: a mock Paystack gateway on an ephemeral port plus
//! baskets, site configuration and wiring helpers.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use paystack_checkout::checkout::ReturnHandler;
use paystack_checkout::config::{PaystackSettings, SiteConfiguration};
use paystack_checkout::domain::{Basket, BasketLine, BasketStatus, Product, User};
use paystack_checkout::payments::Paystack;
use paystack_checkout::store::InMemoryStore;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET_KEY: &str = "sk_test_checkout_secret";
pub const ECOMMERCE_URL: &str = "https://shop.example.com";
pub const ERROR_URL: &str = "https://shop.example.com/checkout/error/";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct MockRoute {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(String, String), MockRoute>,
    requests: Vec<RecordedRequest>,
}

/// Canned Paystack API served by axum on 127.0.0.1
#[derive(Clone)]
pub struct MockGateway {
    pub base_url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn mock_json(&self, method: &str, path: &str, status: u16, body: Value) {
        self.mock_raw(method, path, status, &body.to_string());
    }

    pub fn mock_raw(&self, method: &str, path: &str, status: u16, body: &str) {
        self.insert(method, path, MockRoute {
            status,
            body: body.to_string(),
            delay: None,
        });
    }

    pub fn mock_delayed(&self, method: &str, path: &str, delay: Duration) {
        self.insert(method, path, MockRoute {
            status: 200,
            body: json!({"status": true}).to_string(),
            delay: Some(delay),
        });
    }

    fn insert(&self, method: &str, path: &str, route: MockRoute) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .insert((method.to_string(), path.to_string()), route);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

async fn respond(
    State(state): State<Arc<Mutex<MockState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let route = {
        let mut state = state.lock().unwrap();
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            authorization: header("authorization"),
            content_type: header("content-type"),
            body: serde_json::from_slice(&body).ok(),
        });
        state
            .routes
            .get(&(method.to_string(), uri.path().to_string()))
            .cloned()
    };

    let Some(route) = route else {
        return (
            StatusCode::NOT_FOUND,
            json!({"status": false, "message": "not mocked"}).to_string(),
        )
            .into_response();
    };

    if let Some(delay) = route.delay {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::from_u16(route.status).unwrap(),
        [("content-type", "application/json")],
        route.body,
    )
        .into_response()
}

pub fn site(base_url: &str) -> SiteConfiguration {
    SiteConfiguration {
        ecommerce_url: ECOMMERCE_URL.to_string(),
        receipt_path: "/checkout/receipt/".to_string(),
        order_number_prefix: "EDX".to_string(),
        paystack: PaystackSettings {
            public_key: "pk_test_checkout".to_string(),
            secret_key: SECRET_KEY.to_string(),
            base_url: base_url.to_string(),
            cancel_checkout_path: "/checkout/cancel-checkout/".to_string(),
            error_path: "/checkout/error/".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        },
    }
}

pub fn basket(id: i64, price: Decimal) -> Basket {
    Basket {
        id,
        order_number: format!("EDX-{}", 100_000 + id),
        owner: User {
            id: 7,
            username: "amaka".to_string(),
            email: "amaka@example.com".to_string(),
        },
        currency: "NGN".to_string(),
        status: BasketStatus::Frozen,
        lines: vec![BasketLine {
            product: Product {
                id: 21,
                title: "Demo Course".to_string(),
                course_id: Some("course-v1:edX+DemoX+Demo".to_string()),
            },
            quantity: 1,
            unit_price_excl_tax: price,
            unit_price_incl_tax: price,
        }],
    }
}

/// Successful verify envelope for a basket
pub fn verify_success(basket: &Basket, transaction_id: &str, amount: u64) -> Value {
    json!({
        "status": true,
        "message": "Verification successful",
        "data": {
            "id": transaction_id,
            "currency": "NGN",
            "amount": amount,
            "metadata": {"basket_id": basket.id, "order_number": basket.order_number},
            "authorization": {"last4": "1111", "card_type": "visa"}
        }
    })
}

pub fn processor(store: &InMemoryStore, gateway: &MockGateway) -> Arc<Paystack> {
    Arc::new(Paystack::new(site(&gateway.base_url), Arc::new(store.clone())).unwrap())
}

pub fn return_handler(store: &InMemoryStore, gateway: &MockGateway) -> ReturnHandler {
    ReturnHandler::new(
        Arc::new(store.clone()),
        processor(store, gateway),
        site(&gateway.base_url),
    )
}

/// Hex HMAC-SHA512 of `payload` keyed by the fixture secret
pub fn sign(payload: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    let mut mac = Hmac::<Sha512>::new_from_slice(SECRET_KEY.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Base URL of a port with nothing listening on it
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
