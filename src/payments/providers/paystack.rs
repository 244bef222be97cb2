//! Paystack payment processor
//!
//! Business rules layered on [`PaystackClient`]: kobo conversion, initialize
//! payloads, verify normalization and the refund flow.

use crate::config::SiteConfiguration;
use crate::domain::{Basket, NewProcessorResponse};
use crate::payments::client::{ClientOptions, GatewayOperation, PaystackClient};
use crate::payments::errors::{PaymentError, PaymentResult, RefundFailure};
use crate::payments::traits::PaymentProcessor;
use crate::payments::types::{
    CustomField, GatewayResponse, HandledProcessorResponse, InitializedTransaction, RefundData,
    RefundOutcome, RefundRequest, TransactionMetadata, TransactionParameters, TransactionRequest,
    VerifiedTransaction,
};
use crate::store::ResponseLedger;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Path of the return endpoint the gateway redirects payers to
pub const EXECUTE_PATH: &str = "/payment/paystack/execute";

/// Gateway message for a refund of an already reversed transaction
pub const FULLY_REVERSED_MESSAGE: &str = "Transaction has been fully reversed";

const PROCESSED_REFUND_STATUS: &str = "processed";

/// Paystack payment processor
pub struct Paystack {
    site: SiteConfiguration,
    client: PaystackClient,
    ledger: Arc<dyn ResponseLedger>,
}

impl Paystack {
    pub const NAME: &'static str = "paystack";

    /// Create the processor for a site. Fails when the site has no gateway
    /// endpoint or secret key configured.
    pub fn new(site: SiteConfiguration, ledger: Arc<dyn ResponseLedger>) -> PaymentResult<Self> {
        let options = ClientOptions {
            timeout: Duration::from_secs(site.paystack.timeout_secs),
            max_retries: site.paystack.max_retries,
            ..ClientOptions::default()
        };
        let client = PaystackClient::new(
            &site.paystack.base_url,
            &site.paystack.secret_key,
            options,
        )?;

        Ok(Self {
            site,
            client,
            ledger,
        })
    }

    pub fn cancel_url(&self) -> String {
        self.site.ecommerce_url(&self.site.paystack.cancel_checkout_path)
    }

    pub fn return_url(&self) -> String {
        self.site.ecommerce_url(EXECUTE_PATH)
    }

    /// Basket total in kobo.
    ///
    /// Paystack amounts are positive integers in the smallest currency unit,
    /// so NGN 100 is sent as "10000". Half-way values round to even.
    pub fn amount_for(basket: &Basket) -> String {
        (basket.total_incl_tax() * Decimal::ONE_HUNDRED)
            .round()
            .to_string()
    }

    /// Display-only fields for the hosted payment page, taken from the
    /// basket's first line (checkout baskets hold a single course seat)
    pub fn custom_fields(basket: &Basket) -> PaymentResult<Vec<CustomField>> {
        let product = &basket
            .lines
            .first()
            .ok_or(PaymentError::EmptyBasket {
                basket_id: basket.id,
            })?
            .product;

        let course_id = product
            .course_id
            .clone()
            .unwrap_or_else(|| product.id.to_string());

        Ok(vec![
            CustomField {
                display_name: "Order Number".to_string(),
                variable_name: "order_number".to_string(),
                value: basket.order_number.clone(),
            },
            CustomField {
                display_name: "Course Id".to_string(),
                variable_name: "course_id".to_string(),
                value: course_id,
            },
            CustomField {
                display_name: "Course Name".to_string(),
                variable_name: "course_title".to_string(),
                value: product.title.clone(),
            },
        ])
    }

    pub fn transaction_request(&self, basket: &Basket) -> PaymentResult<TransactionRequest> {
        Ok(TransactionRequest {
            amount: Self::amount_for(basket),
            email: basket.owner.email.clone(),
            callback_url: self.return_url(),
            metadata: TransactionMetadata {
                cancel_action: self.cancel_url(),
                order_number: basket.order_number.clone(),
                basket_id: basket.id,
                custom_fields: Self::custom_fields(basket)?,
            },
        })
    }

    /// True only when the gateway reports the refund as processed.
    ///
    /// `false` means "not known to be processed": a pending refund and a
    /// failed lookup look the same to callers.
    pub async fn refund_status(&self, refund_id: &str) -> bool {
        let response = match self
            .client
            .handle(GatewayOperation::FetchRefund(refund_id.to_string()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Unable to fetch refund object from paystack for refund_id: {}: {}", refund_id, e);
                return false;
            }
        };

        if let Err(e) = self.record(refund_id, &response, None).await {
            error!("Failed to record Paystack refund lookup for refund_id {}: {}", refund_id, e);
            return false;
        }

        if response.ok {
            match response.data::<RefundData>() {
                Ok(refund) => {
                    let status = refund.status.unwrap_or_default();
                    info!("Paystack refund has been fetched with status: {}.", status);
                    return status == PROCESSED_REFUND_STATUS;
                }
                Err(e) => warn!("Paystack refund {} lookup returned no status: {}", refund_id, e),
            }
        }

        error!("Unable to fetch refund object from paystack for refund_id: {}.", refund_id);
        false
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundOutcome, RefundFailure> {
        let unexpected = |e: PaymentError| RefundFailure::Unexpected {
            message: e.to_string(),
        };

        let response = self
            .client
            .handle(GatewayOperation::CreateRefund(request.reference.clone()))
            .await
            .map_err(unexpected)?;

        let refund_id = if response.ok {
            response.data::<RefundData>().ok().and_then(|refund| refund.id)
        } else {
            None
        };
        let record_key = refund_id.as_deref().unwrap_or(&request.reference);
        self.record(record_key, &response, Some(request.basket.id))
            .await
            .map_err(unexpected)?;

        if !response.ok {
            if response.message() == Some(FULLY_REVERSED_MESSAGE) {
                // No refund id exists for an already reversed transaction
                return Ok(RefundOutcome::AlreadyReversed {
                    reference: request.reference.clone(),
                });
            }
            return Err(RefundFailure::CallFailed {
                message: response
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {}", response.status)),
            });
        }

        let refund_id = refund_id.ok_or_else(|| RefundFailure::Unexpected {
            message: "refund response carries no id".to_string(),
        })?;
        info!(
            "Successfully created Paystack refund request for transaction: {}, and got refund_id: {}.",
            request.reference, refund_id
        );

        if self.refund_status(&refund_id).await {
            Ok(RefundOutcome::Refunded { refund_id })
        } else {
            Err(RefundFailure::Unconfirmed { refund_id })
        }
    }

    async fn record(
        &self,
        transaction_id: &str,
        response: &GatewayResponse,
        basket_id: Option<i64>,
    ) -> PaymentResult<()> {
        self.ledger
            .record_response(NewProcessorResponse::new(
                Self::NAME,
                transaction_id,
                response.payload.as_ref(),
                basket_id,
            ))
            .await?;
        Ok(())
    }
}

fn form_token_failure() -> PaymentError {
    PaymentError::gateway("Paystack payment creation failure: unable to get Paystack form token.")
}

#[async_trait]
impl PaymentProcessor for Paystack {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn error_url(&self) -> String {
        self.site.ecommerce_url(&self.site.paystack.error_path)
    }

    fn basket_amount(&self, basket: &Basket) -> String {
        Self::amount_for(basket)
    }

    async fn get_transaction_parameters(
        &self,
        basket: &Basket,
    ) -> PaymentResult<TransactionParameters> {
        let request = self.transaction_request(basket)?;
        info!(
            "Initiating Paystack payment: {} {} for basket {}",
            request.amount, basket.currency, basket.id
        );

        let data = serde_json::to_value(&request)?;
        let response = match self
            .client
            .handle(GatewayOperation::InitializeTransaction(data))
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_gateway_failure() => {
                error!("Paystack initialize call failed for basket {}: {}", basket.id, e);
                return Err(form_token_failure());
            }
            Err(e) => return Err(e),
        };

        self.record(&basket.order_number, &response, Some(basket.id))
            .await?;

        if response.ok {
            if let Ok(InitializedTransaction {
                authorization_url: Some(payment_page_url),
                ..
            }) = response.data::<InitializedTransaction>()
            {
                info!("Successfully got hosted Paystack payment page for basket: {}.", basket.id);
                return Ok(TransactionParameters { payment_page_url });
            }
        }

        error!("Failed to get Paystack payment form for basket: {}.", basket.id);
        Err(form_token_failure())
    }

    async fn verify_transaction(&self, reference: &str) -> PaymentResult<GatewayResponse> {
        info!("Verifying Paystack payment: reference={}", reference);
        self.client
            .handle(GatewayOperation::VerifyTransaction(reference.to_string()))
            .await
    }

    async fn handle_processor_response(
        &self,
        ledger: &dyn ResponseLedger,
        response: &serde_json::Value,
        basket: &Basket,
    ) -> PaymentResult<HandledProcessorResponse> {
        let transaction: VerifiedTransaction = serde_json::from_value(response.clone())?;
        let transaction_id = transaction.id.ok_or_else(|| PaymentError::malformed("id"))?;

        ledger
            .record_response(NewProcessorResponse::new(
                Self::NAME,
                transaction_id.as_str(),
                Some(response),
                Some(basket.id),
            ))
            .await?;

        let authorization = transaction
            .authorization
            .ok_or_else(|| PaymentError::malformed("authorization"))?;

        info!(
            "Successfully executed Paystack payment [{}] for basket: {}.",
            transaction_id, basket.id
        );

        let currency = transaction.currency.unwrap_or_else(|| {
            warn!(
                "Paystack transaction {} carries no currency, using basket currency {}",
                transaction_id, basket.currency
            );
            basket.currency.clone()
        });

        Ok(HandledProcessorResponse {
            transaction_id,
            total: basket.total_incl_tax(),
            currency,
            card_number: authorization.last4,
            card_type: authorization.card_type,
        })
    }

    async fn issue_credit(&self, request: RefundRequest) -> PaymentResult<String> {
        info!(
            "Issuing Paystack credit for order {}: {} {} on transaction {}",
            request.order_number, request.amount, request.currency, request.reference
        );

        match self.refund(&request).await {
            Ok(outcome) => {
                if let RefundOutcome::AlreadyReversed { .. } = &outcome {
                    info!(
                        "Paystack transaction {} for order {} was already reversed",
                        request.reference, request.order_number
                    );
                }
                Ok(outcome.reference().to_string())
            }
            Err(cause) => {
                error!(
                    "An error occurred while attempting Paystack issue a credit for order:{}: {}",
                    request.order_number, cause
                );
                Err(PaymentError::Refund {
                    order_number: request.order_number,
                    cause,
                })
            }
        }
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        self.client.verify_webhook_signature(payload, signature)
    }
}
