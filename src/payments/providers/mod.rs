//! Payment processor implementations

pub mod paystack;

pub use paystack::Paystack;
