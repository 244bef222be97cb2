//! Checkout return flow: from the payer's redirect to a placed order

pub mod execution;
pub mod receipt;

pub use execution::{ReturnContext, ReturnHandler, ReturnOutcome, ReturnState};
pub use receipt::receipt_page_url;
