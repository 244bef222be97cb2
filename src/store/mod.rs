//! Persistence seam for baskets, orders and the processor response ledger
//!
//! The payment flow only talks to these traits. `InMemoryStore` backs tests
//! and local runs; `crate::database::PgStore` backs production.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use memory::InMemoryStore;

use crate::domain::{
    Basket, NewProcessorResponse, Order, OrderPlacement, ProcessorResponseRecord,
};
use async_trait::async_trait;

/// Append-only ledger of raw gateway responses
#[async_trait]
pub trait ResponseLedger: Send + Sync {
    async fn record_response(
        &self,
        response: NewProcessorResponse,
    ) -> StoreResult<ProcessorResponseRecord>;
}

/// One atomic unit of local persistence.
///
/// Nothing written through a unit is visible until `commit`; `rollback` (or
/// a failed `commit`) discards every write made through it.
#[async_trait]
pub trait UnitOfWork: ResponseLedger {
    /// This unit viewed as a ledger, for processors recording inside it
    fn ledger(&self) -> &dyn ResponseLedger;

    /// Create the order, its payment event and source, and submit the basket.
    ///
    /// Fails with a unique constraint violation when the order number is
    /// already taken or the basket was already submitted.
    async fn place_order(&self, placement: OrderPlacement) -> StoreResult<Order>;

    async fn commit(&self) -> StoreResult<()>;

    async fn rollback(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait CommerceStore: ResponseLedger {
    async fn find_basket(&self, basket_id: i64) -> StoreResult<Option<Basket>>;

    async fn find_order(&self, order_number: &str) -> StoreResult<Option<Order>>;

    /// Ledger entries for a processor and transaction/reference id, oldest first
    async fn responses_for(
        &self,
        processor_name: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<ProcessorResponseRecord>>;

    /// Begin an atomic unit of work
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}
