//! Payment gateway integration
//!
//! `client` speaks the Paystack HTTP protocol, `providers` hold the business
//! rules built on top of it and `traits` is the seam checkout depends on.

pub mod client;
pub mod errors;
pub mod providers;
pub mod traits;
pub mod types;

pub use client::{ClientOptions, GatewayOperation, PaystackClient};
pub use errors::{PaymentError, PaymentResult, RefundFailure};
pub use providers::Paystack;
pub use traits::PaymentProcessor;
