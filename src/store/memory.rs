use super::{CommerceStore, ResponseLedger, StoreError, StoreResult, UnitOfWork};
use crate::domain::{
    Basket, BasketStatus, NewProcessorResponse, Order, OrderPlacement, PaymentEvent,
    ProcessorResponseRecord, Source,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Default)]
struct State {
    baskets: HashMap<i64, Basket>,
    orders: HashMap<String, Order>,
    payment_events: Vec<PaymentEvent>,
    sources: Vec<Source>,
    responses: Vec<ProcessorResponseRecord>,
}

impl State {
    fn check_placement(&self, order_number: &str, basket_id: i64) -> StoreResult<()> {
        if self.orders.contains_key(order_number) {
            return Err(StoreError::duplicate("orders.number", order_number));
        }
        match self.baskets.get(&basket_id) {
            None => Err(StoreError::not_found("Basket", basket_id.to_string())),
            Some(basket) if basket.status == BasketStatus::Submitted => Err(
                StoreError::duplicate("baskets.status", format!("{} submitted", basket_id)),
            ),
            Some(_) => Ok(()),
        }
    }
}

/// A thread-safe in-memory commerce store.
///
/// Uses `Arc<RwLock<..>>` so clones share the same baskets, orders and
/// ledger. Ideal for tests and local runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_basket(&self, basket: Basket) {
        let mut state = self.state.write().await;
        state.baskets.insert(basket.id, basket);
    }

    pub async fn orders(&self) -> Vec<Order> {
        let state = self.state.read().await;
        state.orders.values().cloned().collect()
    }

    pub async fn payment_events_for(&self, order_number: &str) -> Vec<PaymentEvent> {
        let state = self.state.read().await;
        state
            .payment_events
            .iter()
            .filter(|event| event.order_number == order_number)
            .cloned()
            .collect()
    }

    pub async fn sources_for(&self, order_number: &str) -> Vec<Source> {
        let state = self.state.read().await;
        state
            .sources
            .iter()
            .filter(|source| source.order_number == order_number)
            .cloned()
            .collect()
    }

    /// Full ledger in append order
    pub async fn responses(&self) -> Vec<ProcessorResponseRecord> {
        let state = self.state.read().await;
        state.responses.clone()
    }
}

#[async_trait]
impl ResponseLedger for InMemoryStore {
    async fn record_response(
        &self,
        response: NewProcessorResponse,
    ) -> StoreResult<ProcessorResponseRecord> {
        let record = response.into_record(Utc::now());
        let mut state = self.state.write().await;
        state.responses.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn find_basket(&self, basket_id: i64) -> StoreResult<Option<Basket>> {
        let state = self.state.read().await;
        Ok(state.baskets.get(&basket_id).cloned())
    }

    async fn find_order(&self, order_number: &str) -> StoreResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(order_number).cloned())
    }

    async fn responses_for(
        &self,
        processor_name: &str,
        transaction_id: &str,
    ) -> StoreResult<Vec<ProcessorResponseRecord>> {
        let state = self.state.read().await;
        Ok(state
            .responses
            .iter()
            .filter(|r| r.processor_name == processor_name && r.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        debug!("Beginning in-memory unit of work");
        Ok(Box::new(InMemoryUnit {
            state: Arc::clone(&self.state),
            pending: Mutex::new(Some(Pending::default())),
        }))
    }
}

struct StagedPlacement {
    order: Order,
    payment_event: PaymentEvent,
    source: Source,
}

#[derive(Default)]
struct Pending {
    responses: Vec<ProcessorResponseRecord>,
    placements: Vec<StagedPlacement>,
}

/// Unit of work staging writes locally and applying them under a single
/// write lock at commit.
struct InMemoryUnit {
    state: Arc<RwLock<State>>,
    pending: Mutex<Option<Pending>>,
}

fn completed() -> StoreError {
    StoreError::transaction("Unit of work already completed")
}

#[async_trait]
impl ResponseLedger for InMemoryUnit {
    async fn record_response(
        &self,
        response: NewProcessorResponse,
    ) -> StoreResult<ProcessorResponseRecord> {
        let mut pending = self.pending.lock().await;
        let pending = pending.as_mut().ok_or_else(completed)?;
        let record = response.into_record(Utc::now());
        pending.responses.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    fn ledger(&self) -> &dyn ResponseLedger {
        self
    }

    async fn place_order(&self, placement: OrderPlacement) -> StoreResult<Order> {
        let mut pending = self.pending.lock().await;
        let pending = pending.as_mut().ok_or_else(completed)?;

        {
            let state = self.state.read().await;
            state.check_placement(&placement.order_number, placement.basket.id)?;
        }
        if pending
            .placements
            .iter()
            .any(|staged| staged.order.number == placement.order_number)
        {
            return Err(StoreError::duplicate("orders.number", &placement.order_number));
        }

        let placed_at = Utc::now();
        let order = placement.build_order(placed_at);
        pending.placements.push(StagedPlacement {
            order: order.clone(),
            payment_event: placement.build_payment_event(placed_at),
            source: placement.build_source(),
        });
        Ok(order)
    }

    async fn commit(&self) -> StoreResult<()> {
        let pending = self.pending.lock().await.take().ok_or_else(completed)?;
        let mut state = self.state.write().await;

        // A concurrent unit may have committed the same order since staging
        for staged in &pending.placements {
            state.check_placement(&staged.order.number, staged.order.basket_id)?;
        }

        for staged in pending.placements {
            if let Some(basket) = state.baskets.get_mut(&staged.order.basket_id) {
                basket
                    .submit()
                    .map_err(|e| StoreError::transaction(e.to_string()))?;
            }
            state.payment_events.push(staged.payment_event);
            state.sources.push(staged.source);
            state.orders.insert(staged.order.number.clone(), staged.order);
        }
        state.responses.extend(pending.responses);
        debug!("Committed in-memory unit of work");
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.pending.lock().await.take().ok_or_else(completed)?;
        debug!("Rolled back in-memory unit of work");
        Ok(())
    }
}
