//! Payment processor trait definitions

use crate::domain::Basket;
use crate::payments::errors::PaymentResult;
use crate::payments::types::{
    GatewayResponse, HandledProcessorResponse, RefundRequest, TransactionParameters,
};
use crate::store::ResponseLedger;
use async_trait::async_trait;

/// Gateway-specific business rules the checkout flow relies on
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Name recorded on ledger entries, payment events and sources
    fn name(&self) -> &'static str;

    /// Where payers land when a payment cannot be completed
    fn error_url(&self) -> String;

    /// Basket total in the gateway's minor currency unit
    fn basket_amount(&self, basket: &Basket) -> String;

    /// Initialize a hosted payment for the basket
    ///
    /// # Returns
    /// * `TransactionParameters` - the hosted payment page the payer is sent to
    async fn get_transaction_parameters(&self, basket: &Basket)
        -> PaymentResult<TransactionParameters>;

    /// Ask the gateway, server to server, for the state of a transaction
    async fn verify_transaction(&self, reference: &str) -> PaymentResult<GatewayResponse>;

    /// Record a verified transaction and normalize it for order placement.
    ///
    /// `response` is the raw `data` object of the verify response. The record
    /// is written through `ledger` so it shares the caller's unit of work.
    async fn handle_processor_response(
        &self,
        ledger: &dyn ResponseLedger,
        response: &serde_json::Value,
        basket: &Basket,
    ) -> PaymentResult<HandledProcessorResponse>;

    /// Refund a captured payment, returning the reference to store locally
    async fn issue_credit(&self, request: RefundRequest) -> PaymentResult<String>;

    /// Verify that a webhook body came from the gateway
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}
