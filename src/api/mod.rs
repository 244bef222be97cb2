//! HTTP surface: payer return, gateway webhook and health check

pub mod health;
pub mod paystack;

use crate::checkout::ReturnHandler;
use http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ReturnHandler>,
    pub environment: String,
}

impl AppState {
    pub fn new(handler: ReturnHandler, environment: impl Into<String>) -> Self {
        Self {
            handler: Arc::new(handler),
            environment: environment.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/payment/paystack/execute", get(paystack::execute))
        .route("/payment/paystack/webhook", post(paystack::webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
