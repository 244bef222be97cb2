//! Payer return handling
//!
//! The gateway redirects the payer back with a transaction reference. The
//! handler verifies it server to server, resolves the basket the payment was
//! for, records the verified response and places the order in one unit of
//! work. A payment already turned into an order, for instance by the
//! `charge.success` webhook arriving first, resolves to the same receipt.
//! Every failure ends in a redirect except an unresolvable basket, which is
//! surfaced to the caller.

use crate::checkout::receipt::receipt_page_url;
use crate::config::SiteConfiguration;
use crate::domain::{Basket, NewProcessorResponse, Order, OrderNumberGenerator, OrderPlacement};
use crate::payments::errors::{PaymentError, PaymentResult};
use crate::payments::traits::PaymentProcessor;
use crate::payments::types::{GatewayResponse, VerifiedTransaction};
use crate::store::{CommerceStore, UnitOfWork};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, instrument, warn};

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.=-]{1,100}$").expect("reference pattern is a valid regex")
});

const SUCCESS_STATUS: &str = "success";

/// Inbound request values the handler needs
#[derive(Debug, Clone, Default)]
pub struct ReturnContext {
    pub reference: Option<String>,
    pub request_id: Option<String>,
}

impl ReturnContext {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Progress of a single return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnState {
    Received,
    Verified,
    BasketResolved,
    PaymentRecorded,
    OrderPlaced,
}

impl fmt::Display for ReturnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReturnState::Received => "received",
            ReturnState::Verified => "verified",
            ReturnState::BasketResolved => "basket_resolved",
            ReturnState::PaymentRecorded => "payment_recorded",
            ReturnState::OrderPlaced => "order_placed",
        })
    }
}

/// Where the payer is sent once the return has been handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    Receipt { order_number: String, url: String },
    /// `at` is the last state reached before failing
    Failed { url: String, at: ReturnState },
}

impl ReturnOutcome {
    pub fn redirect_url(&self) -> &str {
        match self {
            ReturnOutcome::Receipt { url, .. } | ReturnOutcome::Failed { url, .. } => url,
        }
    }

    pub fn is_receipt(&self) -> bool {
        matches!(self, ReturnOutcome::Receipt { .. })
    }
}

pub fn is_valid_reference(reference: &str) -> bool {
    REFERENCE_PATTERN.is_match(reference)
}

/// Handles the payer's return from the hosted payment page
pub struct ReturnHandler {
    store: Arc<dyn CommerceStore>,
    processor: Arc<dyn PaymentProcessor>,
    site: SiteConfiguration,
}

impl ReturnHandler {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        processor: Arc<dyn PaymentProcessor>,
        site: SiteConfiguration,
    ) -> Self {
        Self {
            store,
            processor,
            site,
        }
    }

    pub fn processor(&self) -> &Arc<dyn PaymentProcessor> {
        &self.processor
    }

    /// Run the return flow for one inbound request.
    ///
    /// Returns `Err` only for `InvalidBasket`. Gateway, ledger and store
    /// failures are logged and resolve to the error page redirect.
    #[instrument(skip(self, ctx), fields(reference = ctx.reference.as_deref().unwrap_or(""), request_id = ctx.request_id.as_deref().unwrap_or("")))]
    pub async fn handle(&self, ctx: ReturnContext) -> PaymentResult<ReturnOutcome> {
        let reference = match ctx.reference.as_deref() {
            Some(reference) if is_valid_reference(reference) => reference,
            Some(reference) => {
                warn!("Rejected malformed Paystack reference: {:?}", reference);
                return Ok(self.failed(ReturnState::Received));
            }
            None => {
                warn!("Paystack return received without a reference");
                return Ok(self.failed(ReturnState::Received));
            }
        };

        let response = match self.processor.verify_transaction(reference).await {
            Ok(response) => response,
            Err(e) => {
                error!("Paystack verify call failed for reference {}: {}", reference, e);
                self.record(reference, None, None).await;
                return Ok(self.failed(ReturnState::Received));
            }
        };

        if !response.ok {
            self.record(reference, response.payload.as_ref(), None).await;
            error!("Paystack payment verification failed for reference: {}", reference);
            return Ok(self.failed(ReturnState::Verified));
        }

        let transaction = match response.data::<VerifiedTransaction>() {
            Ok(transaction) => transaction,
            Err(e) => {
                self.record(reference, response.payload.as_ref(), None).await;
                error!("Paystack verify response for {} is unusable: {}", reference, e);
                return Ok(self.failed(ReturnState::Verified));
            }
        };

        let basket = match self.resolve_basket(reference, &response, &transaction).await {
            Ok(basket) => basket,
            Err(e @ PaymentError::InvalidBasket { .. }) => return Err(e),
            Err(e) => {
                error!("Basket lookup for Paystack reference {} failed: {}", reference, e);
                return Ok(self.failed(ReturnState::Verified));
            }
        };

        self.record(reference, response.payload.as_ref(), Some(basket.id))
            .await;

        if !self.payment_confirmed(reference, &transaction, &basket) {
            return Ok(self.failed(ReturnState::PaymentRecorded));
        }

        let Some(data) = response.data_value() else {
            return Ok(self.failed(ReturnState::PaymentRecorded));
        };

        let order = match self.existing_order(&basket, &transaction).await {
            Some(order) => {
                info!(
                    "Order {} already placed for basket {}, skipping placement",
                    order.number, basket.id
                );
                order
            }
            None => match self.place_order(data, &basket, ctx.request_id).await {
                Ok(order) => order,
                Err(e) => match self.existing_order(&basket, &transaction).await {
                    // Lost the race to a concurrent notification for the same payment
                    Some(order) => order,
                    None => {
                        error!(
                            "Attempts to handle payment for basket [{}] failed: {}",
                            basket.id, e
                        );
                        return Ok(self.failed(ReturnState::PaymentRecorded));
                    }
                },
            },
        };

        match receipt_page_url(&order.number, &self.site) {
            Ok(url) => {
                info!("Order {} placed for basket {}", order.number, basket.id);
                Ok(ReturnOutcome::Receipt {
                    order_number: order.number,
                    url: url.to_string(),
                })
            }
            Err(e) => {
                error!("Order {} placed but receipt URL failed: {}", order.number, e);
                Ok(self.failed(ReturnState::OrderPlaced))
            }
        }
    }

    async fn resolve_basket(
        &self,
        reference: &str,
        response: &GatewayResponse,
        transaction: &VerifiedTransaction,
    ) -> PaymentResult<Basket> {
        let metadata = transaction.metadata();

        let basket_id = match metadata.basket_id() {
            Ok(basket_id) => basket_id,
            Err(raw) => {
                self.record(reference, response.payload.as_ref(), None).await;
                error!(
                    "Received Paystack payment notification for non-existent basket [{}].",
                    raw
                );
                return Err(PaymentError::invalid_basket(raw));
            }
        };

        let basket = match self.store.find_basket(basket_id).await {
            Ok(Some(basket)) => basket,
            Ok(None) => {
                self.record(reference, response.payload.as_ref(), None).await;
                error!(
                    "Received Paystack payment notification for non-existent basket [{}].",
                    basket_id
                );
                return Err(PaymentError::invalid_basket(basket_id.to_string()));
            }
            Err(e) => {
                self.record(reference, response.payload.as_ref(), None).await;
                return Err(e.into());
            }
        };

        if let Some(order_number) = metadata.order_number.as_deref() {
            let generator = OrderNumberGenerator::new(self.site.order_number_prefix.as_str());
            if generator.basket_id(order_number) != Some(basket.id) {
                warn!(
                    "Paystack order number {} does not belong to basket {} ({})",
                    order_number, basket.id, basket.order_number
                );
            }
        }

        if !basket.is_frozen() {
            warn!(
                "Basket {} is {} rather than Frozen at Paystack return",
                basket.id, basket.status
            );
        }

        Ok(basket)
    }

    fn payment_confirmed(
        &self,
        reference: &str,
        transaction: &VerifiedTransaction,
        basket: &Basket,
    ) -> bool {
        if let Some(status) = transaction.status.as_deref() {
            if status != SUCCESS_STATUS {
                error!(
                    "Paystack transaction {} for basket {} has status {}",
                    reference, basket.id, status
                );
                return false;
            }
        }

        if let Some(amount) = transaction.amount.as_deref() {
            let expected = self.processor.basket_amount(basket);
            if amount != expected {
                error!(
                    "Paystack transaction {} amount {} does not match basket {} amount {}",
                    reference, amount, basket.id, expected
                );
                return false;
            }
        }

        true
    }

    /// The order already placed for `basket` from this very payment, if any.
    ///
    /// Both the order and the committed ledger entry for the transaction id
    /// must exist; a lookup failure counts as no order.
    async fn existing_order(
        &self,
        basket: &Basket,
        transaction: &VerifiedTransaction,
    ) -> Option<Order> {
        let transaction_id = transaction.id.as_deref()?;
        let order = match self.store.find_order(&basket.order_number).await {
            Ok(Some(order)) if order.basket_id == basket.id => order,
            Ok(_) => return None,
            Err(e) => {
                error!("Order lookup for basket {} failed: {}", basket.id, e);
                return None;
            }
        };

        match self
            .store
            .responses_for(self.processor.name(), transaction_id)
            .await
        {
            Ok(records) if records.iter().any(|r| r.basket_id == Some(basket.id)) => Some(order),
            Ok(_) => {
                warn!(
                    "Order {} exists for basket {} but not from transaction {}",
                    order.number, basket.id, transaction_id
                );
                None
            }
            Err(e) => {
                error!("Ledger lookup for transaction {} failed: {}", transaction_id, e);
                None
            }
        }
    }

    async fn place_order(
        &self,
        data: &Value,
        basket: &Basket,
        request_id: Option<String>,
    ) -> PaymentResult<Order> {
        let unit = self.store.begin().await?;

        match self.place_order_in(unit.as_ref(), data, basket, request_id).await {
            Ok(order) => {
                unit.commit().await?;
                Ok(order)
            }
            Err(e) => {
                if let Err(rollback) = unit.rollback().await {
                    error!("Failed to roll back basket {} unit of work: {}", basket.id, rollback);
                }
                Err(e)
            }
        }
    }

    async fn place_order_in(
        &self,
        unit: &dyn UnitOfWork,
        data: &Value,
        basket: &Basket,
        request_id: Option<String>,
    ) -> PaymentResult<Order> {
        let payment = self
            .processor
            .handle_processor_response(unit.ledger(), data, basket)
            .await?;

        let placement =
            OrderPlacement::digital(basket.clone(), payment, self.processor.name(), request_id);
        Ok(unit.place_order(placement).await?)
    }

    async fn record(
        &self,
        reference: &str,
        payload: Option<&Value>,
        basket_id: Option<i64>,
    ) {
        let entry = NewProcessorResponse::new(self.processor.name(), reference, payload, basket_id);
        if let Err(e) = self.store.record_response(entry).await {
            error!("Failed to record Paystack response for {}: {}", reference, e);
        }
    }

    fn failed(&self, at: ReturnState) -> ReturnOutcome {
        ReturnOutcome::Failed {
            url: self.processor.error_url(),
            at,
        }
    }
}
