mod common;

use common::*;
use paystack_checkout::payments::{PaymentError, PaymentProcessor, Paystack, RefundFailure};
use paystack_checkout::payments::types::RefundRequest;
use paystack_checkout::store::{CommerceStore, InMemoryStore};
use rust_decimal_macros::dec;
use serde_json::json;

fn refund_request(reference: &str) -> RefundRequest {
    let basket = basket(4, dec!(100.00));
    RefundRequest {
        order_number: basket.order_number.clone(),
        amount: basket.total_incl_tax(),
        currency: basket.currency.clone(),
        basket,
        reference: reference.to_string(),
    }
}

#[tokio::test]
async fn test_initiate_returns_exact_authorization_url() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/transaction/initialize",
        200,
        json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/0peioxfhpn",
                "access_code": "0peioxfhpn",
                "reference": "7PVGX8MEk85tgeEpVDtD"
            }
        }),
    );
    let store = InMemoryStore::new();
    let processor = processor(&store, &gateway);
    let basket = basket(4, dec!(19.99));

    let parameters = processor.get_transaction_parameters(&basket).await.unwrap();

    assert_eq!(
        parameters.payment_page_url,
        "https://checkout.paystack.com/0peioxfhpn"
    );
    let sent = gateway.requests()[0].body.clone().unwrap();
    assert_eq!(sent["amount"], "1999");
    assert_eq!(sent["metadata"]["basket_id"], 4);

    let records = store.responses_for(Paystack::NAME, "EDX-100004").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].basket_id, Some(4));
}

#[tokio::test]
async fn test_initiate_gateway_failure_is_gateway_error() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/transaction/initialize",
        400,
        json!({"status": false, "message": "Invalid key"}),
    );
    let store = InMemoryStore::new();
    let processor = processor(&store, &gateway);

    let err = processor
        .get_transaction_parameters(&basket(4, dec!(19.99)))
        .await
        .unwrap_err();

    assert!(matches!(&err, PaymentError::Gateway { .. }));
    assert_eq!(
        err.to_string(),
        "Paystack payment creation failure: unable to get Paystack form token."
    );
    assert!(store.orders().await.is_empty());
    assert_eq!(store.responses().await.len(), 1);
}

#[tokio::test]
async fn test_initiate_without_authorization_url_fails() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/transaction/initialize",
        200,
        json!({"status": true, "data": {"access_code": "x"}}),
    );
    let store = InMemoryStore::new();

    let err = processor(&store, &gateway)
        .get_transaction_parameters(&basket(4, dec!(19.99)))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { .. }));
}

#[tokio::test]
async fn test_initiate_on_unreachable_gateway_is_gateway_error() {
    let base_url = closed_port_url().await;
    let store = InMemoryStore::new();
    let processor = Paystack::new(site(&base_url), std::sync::Arc::new(store.clone())).unwrap();

    let err = processor
        .get_transaction_parameters(&basket(4, dec!(19.99)))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Gateway { .. }));
    assert!(store.responses().await.is_empty());
}

#[tokio::test]
async fn test_refund_status_only_processed_is_true() {
    let gateway = MockGateway::start().await;
    gateway.mock_json("GET", "/refund/1", 200, json!({"status": true, "data": {"id": 1, "status": "processed"}}));
    gateway.mock_json("GET", "/refund/2", 200, json!({"status": true, "data": {"id": 2, "status": "pending"}}));
    gateway.mock_json("GET", "/refund/3", 200, json!({"status": true, "data": {"id": 3, "status": "failed"}}));
    gateway.mock_json("GET", "/refund/4", 500, json!({"status": false, "message": "boom"}));
    let store = InMemoryStore::new();
    let processor = processor(&store, &gateway);

    assert!(processor.refund_status("1").await);
    assert!(!processor.refund_status("2").await);
    assert!(!processor.refund_status("3").await);
    assert!(!processor.refund_status("4").await);
    // Unmocked path answers 404
    assert!(!processor.refund_status("5").await);

    assert_eq!(store.responses_for(Paystack::NAME, "1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_issue_credit_returns_refund_id_when_processed() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/refund",
        200,
        json!({"status": true, "data": {"id": 3018284, "status": "pending"}}),
    );
    gateway.mock_json(
        "GET",
        "/refund/3018284",
        200,
        json!({"status": true, "data": {"id": 3018284, "status": "processed"}}),
    );
    let store = InMemoryStore::new();
    let processor = processor(&store, &gateway);

    let reference = processor.issue_credit(refund_request("T1")).await.unwrap();

    assert_eq!(reference, "3018284");
    let records = store.responses_for(Paystack::NAME, "3018284").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].basket_id, Some(4));
    assert_eq!(records[1].response["data"]["status"], "processed");
}

#[tokio::test]
async fn test_issue_credit_returns_reference_when_fully_reversed() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/refund",
        400,
        json!({"status": false, "message": "Transaction has been fully reversed"}),
    );
    let store = InMemoryStore::new();

    let reference = processor(&store, &gateway)
        .issue_credit(refund_request("T1"))
        .await
        .unwrap();

    assert_eq!(reference, "T1");
    assert_eq!(gateway.request_count("/refund"), 1);
    assert_eq!(store.responses_for(Paystack::NAME, "T1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_issue_credit_fails_when_creation_fails() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/refund",
        400,
        json!({"status": false, "message": "Transaction not found"}),
    );
    let store = InMemoryStore::new();

    let err = processor(&store, &gateway)
        .issue_credit(refund_request("T1"))
        .await
        .unwrap_err();

    match err {
        PaymentError::Refund { order_number, cause } => {
            assert_eq!(order_number, "EDX-100004");
            assert!(matches!(cause, RefundFailure::CallFailed { message } if message == "Transaction not found"));
        }
        other => panic!("expected refund error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_issue_credit_fails_when_refund_stays_pending() {
    let gateway = MockGateway::start().await;
    gateway.mock_json(
        "POST",
        "/refund",
        200,
        json!({"status": true, "data": {"id": 99, "status": "pending"}}),
    );
    gateway.mock_json(
        "GET",
        "/refund/99",
        200,
        json!({"status": true, "data": {"id": 99, "status": "pending"}}),
    );
    let store = InMemoryStore::new();

    let err = processor(&store, &gateway)
        .issue_credit(refund_request("T1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::Refund { cause: RefundFailure::Unconfirmed { ref refund_id }, .. } if refund_id == "99"
    ));
}

#[tokio::test]
async fn test_issue_credit_on_unreachable_gateway_is_refund_error() {
    let base_url = closed_port_url().await;
    let store = InMemoryStore::new();
    let processor = Paystack::new(site(&base_url), std::sync::Arc::new(store.clone())).unwrap();

    let err = processor.issue_credit(refund_request("T1")).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Refund { cause: RefundFailure::Unexpected { .. }, .. }
    ));
}
