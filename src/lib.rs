//! Paystack checkout: hosted payment initiation, return verification and
//! atomic order placement.

pub mod api;
pub mod checkout;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod domain;
pub mod payments;
pub mod store;
pub mod telemetry;
