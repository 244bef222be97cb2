use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Which client construction argument was not supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingClientArgument {
    Both,
    BaseUrl,
    AuthorizationKey,
}

impl fmt::Display for MissingClientArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingClientArgument::Both => "Authorization key and Base Url",
            MissingClientArgument::BaseUrl => "Base Url",
            MissingClientArgument::AuthorizationKey => "Authorization key",
        })
    }
}

/// Why a refund could not be confirmed
#[derive(Debug, Error)]
pub enum RefundFailure {
    #[error("refund creation failed: {message}")]
    CallFailed { message: String },

    #[error("refund {refund_id} was not confirmed as processed")]
    Unconfirmed { refund_id: String },

    #[error("unexpected refund failure: {message}")]
    Unexpected { message: String },
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Missing {missing} argument.")]
    InvalidClientArgument { missing: MissingClientArgument },

    #[error("Invalid Code: unable to map '{code}' with a gateway client method")]
    InvalidGatewayOperation { code: String },

    #[error("Request method '{method}' not recognised or implemented")]
    InvalidRequestMethod { method: String },

    #[error("Gateway request failed: {message}")]
    Transport { message: String },

    #[error("{message}")]
    Gateway { message: String },

    #[error("Malformed gateway response: missing or invalid '{field}'")]
    MalformedResponse { field: String },

    #[error("Received gateway response for non-existent basket: {basket_id}")]
    InvalidBasket { basket_id: String },

    #[error("An error occurred while attempting to issue a credit for order: {order_number}")]
    Refund {
        order_number: String,
        #[source]
        cause: RefundFailure,
    },

    #[error("Basket {basket_id} has no lines")]
    EmptyBasket { basket_id: i64 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn invalid_gateway_operation(code: impl Into<String>) -> Self {
        Self::InvalidGatewayOperation { code: code.into() }
    }

    pub fn invalid_request_method(method: impl Into<String>) -> Self {
        Self::InvalidRequestMethod {
            method: method.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            message: message.into(),
        }
    }

    pub fn malformed(field: impl Into<String>) -> Self {
        Self::MalformedResponse {
            field: field.into(),
        }
    }

    pub fn invalid_basket(basket_id: impl Into<String>) -> Self {
        Self::InvalidBasket {
            basket_id: basket_id.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for failures of the gateway call itself (transport or HTTP status)
    pub fn is_gateway_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Gateway { .. })
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::transport(format!("request timed out: {}", err))
        } else {
            PaymentError::transport(format!("request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::malformed(format!("json: {}", err))
    }
}
