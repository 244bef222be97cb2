//! Commerce entities the payment flow reads and produces

pub mod basket;
pub mod order;
pub mod processor_response;

pub use basket::{Basket, BasketLine, BasketStatus, OrderNumberGenerator, Product, User};
pub use order::{
    Address, Order, OrderPlacement, OrderStatus, OrderTotal, OrderTotalCalculator, PaymentEvent,
    ShippingCharge, ShippingMethod, Source, PAID_EVENT_TYPE,
};
pub use processor_response::{NewProcessorResponse, ProcessorResponseRecord};
