//! Paystack return and webhook endpoints

use super::{AppState, REQUEST_ID_HEADER};
use crate::checkout::{ReturnContext, ReturnOutcome};
use crate::payments::errors::PaymentError;
use crate::payments::types::WebhookEvent;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";
pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";

#[derive(Debug, Deserialize)]
pub struct ExecuteQuery {
    pub reference: Option<String>,
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Payer redirect target after the hosted payment page
pub async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExecuteQuery>,
) -> Response {
    let ctx = ReturnContext {
        reference: query.reference,
        request_id: request_id(&headers),
    };

    match state.handler.handle(ctx).await {
        Ok(outcome) => Redirect::to(outcome.redirect_url()).into_response(),
        Err(e) => {
            error!("Paystack return could not be handled: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Server to server notification, signed with the secret key
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let processor = state.handler.processor();

    match signature {
        Some(signature) if processor.validate_webhook_signature(&body, signature) => {}
        _ => {
            warn!("Rejected Paystack webhook with missing or invalid signature");
            return error_response(StatusCode::UNAUTHORIZED, "Invalid signature");
        }
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected malformed Paystack webhook: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Malformed event");
        }
    };

    if event.event != CHARGE_SUCCESS_EVENT {
        info!("Ignoring Paystack webhook event {}", event.event);
        return (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response();
    }

    let Some(reference) = event.reference() else {
        return error_response(StatusCode::BAD_REQUEST, "Event carries no reference");
    };

    let ctx = ReturnContext {
        reference: Some(reference.to_string()),
        request_id: request_id(&headers),
    };

    match state.handler.handle(ctx).await {
        Ok(ReturnOutcome::Receipt { order_number, .. }) => (
            StatusCode::OK,
            Json(json!({ "status": "placed", "order_number": order_number })),
        )
            .into_response(),
        Ok(ReturnOutcome::Failed { at, .. }) => (
            StatusCode::OK,
            Json(json!({ "status": "failed", "state": at.to_string() })),
        )
            .into_response(),
        Err(e @ PaymentError::InvalidBasket { .. }) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => {
            error!("Paystack webhook could not be handled: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
