//! Order, payment event and payment source entities, plus the inputs the
//! order placement step consumes.

use crate::domain::basket::{Basket, User};
use crate::payments::types::HandledProcessorResponse;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Payment event type recorded when a payment is captured
pub const PAID_EVENT_TYPE: &str = "paid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Complete,
    Fulfillment,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "Open",
            OrderStatus::Complete => "Complete",
            OrderStatus::Fulfillment => "Fulfillment",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(OrderStatus::Open),
            "Complete" => Ok(OrderStatus::Complete),
            "Fulfillment" => Ok(OrderStatus::Fulfillment),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub basket_id: i64,
    pub user_id: i64,
    pub currency: String,
    pub total_incl_tax: Decimal,
    pub total_excl_tax: Decimal,
    pub shipping_incl_tax: Decimal,
    pub shipping_method: String,
    pub status: OrderStatus,
    pub date_placed: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    pub order_number: String,
    pub event_type: String,
    pub amount: Decimal,
    pub reference: String,
    pub processor_name: String,
    pub created_at: DateTime<Utc>,
}

/// Payment source allocated and debited for an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub order_number: String,
    pub source_type: String,
    pub currency: String,
    pub amount_allocated: Decimal,
    pub amount_debited: Decimal,
    pub reference: String,
    pub card_type: Option<String>,
    /// Masked card digits
    pub label: Option<String>,
}

/// Shipping method applied at order placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShippingMethod {
    /// Digital goods, never charged
    NoShippingRequired,
}

impl ShippingMethod {
    pub fn code(&self) -> &'static str {
        match self {
            ShippingMethod::NoShippingRequired => "no-shipping-required",
        }
    }

    pub fn calculate(&self, _basket: &Basket) -> ShippingCharge {
        match self {
            ShippingMethod::NoShippingRequired => ShippingCharge::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCharge {
    pub excl_tax: Decimal,
    pub incl_tax: Decimal,
}

impl ShippingCharge {
    pub fn zero() -> Self {
        Self {
            excl_tax: Decimal::ZERO,
            incl_tax: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotal {
    pub excl_tax: Decimal,
    pub incl_tax: Decimal,
}

pub struct OrderTotalCalculator;

impl OrderTotalCalculator {
    pub fn calculate(basket: &Basket, shipping_charge: &ShippingCharge) -> OrderTotal {
        OrderTotal {
            excl_tax: basket.total_excl_tax() + shipping_charge.excl_tax,
            incl_tax: basket.total_incl_tax() + shipping_charge.incl_tax,
        }
    }
}

/// Postal address; digital checkouts never carry one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub city: String,
    pub country: String,
}

/// Everything the order placement step needs to create an order exactly once
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    pub order_number: String,
    pub user: User,
    pub basket: Basket,
    pub shipping_address: Option<Address>,
    pub shipping_method: ShippingMethod,
    pub shipping_charge: ShippingCharge,
    pub billing_address: Option<Address>,
    pub order_total: OrderTotal,
    pub payment: HandledProcessorResponse,
    pub processor_name: String,
    pub request_id: Option<String>,
}

impl OrderPlacement {
    /// Placement for a digital basket: no shipping, no addresses
    pub fn digital(
        basket: Basket,
        payment: HandledProcessorResponse,
        processor_name: &str,
        request_id: Option<String>,
    ) -> Self {
        let shipping_method = ShippingMethod::NoShippingRequired;
        let shipping_charge = shipping_method.calculate(&basket);
        let order_total = OrderTotalCalculator::calculate(&basket, &shipping_charge);

        Self {
            order_number: basket.order_number.clone(),
            user: basket.owner.clone(),
            basket,
            shipping_address: None,
            shipping_method,
            shipping_charge,
            billing_address: None,
            order_total,
            payment,
            processor_name: processor_name.to_string(),
            request_id,
        }
    }

    pub fn build_order(&self, placed_at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            number: self.order_number.clone(),
            basket_id: self.basket.id,
            user_id: self.user.id,
            currency: self.payment.currency.clone(),
            total_incl_tax: self.order_total.incl_tax,
            total_excl_tax: self.order_total.excl_tax,
            shipping_incl_tax: self.shipping_charge.incl_tax,
            shipping_method: self.shipping_method.code().to_string(),
            status: OrderStatus::Open,
            date_placed: placed_at,
        }
    }

    pub fn build_payment_event(&self, placed_at: DateTime<Utc>) -> PaymentEvent {
        PaymentEvent {
            id: Uuid::new_v4(),
            order_number: self.order_number.clone(),
            event_type: PAID_EVENT_TYPE.to_string(),
            amount: self.payment.total,
            reference: self.payment.transaction_id.clone(),
            processor_name: self.processor_name.clone(),
            created_at: placed_at,
        }
    }

    pub fn build_source(&self) -> Source {
        Source {
            id: Uuid::new_v4(),
            order_number: self.order_number.clone(),
            source_type: self.processor_name.clone(),
            currency: self.payment.currency.clone(),
            amount_allocated: self.payment.total,
            amount_debited: self.payment.total,
            reference: self.payment.transaction_id.clone(),
            card_type: self.payment.card_type.clone(),
            label: self.payment.card_number.clone(),
        }
    }
}
