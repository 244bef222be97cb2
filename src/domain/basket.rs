//! Basket entity and its checkout lifecycle

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Basket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketStatus {
    /// Lines can still be added or removed
    Open,
    /// Locked once checkout begins
    Frozen,
    /// Converted into an order
    Submitted,
}

impl BasketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasketStatus::Open => "Open",
            BasketStatus::Frozen => "Frozen",
            BasketStatus::Submitted => "Submitted",
        }
    }
}

impl fmt::Display for BasketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BasketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(BasketStatus::Open),
            "Frozen" => Ok(BasketStatus::Frozen),
            "Submitted" => Ok(BasketStatus::Submitted),
            other => Err(format!("unknown basket status '{}'", other)),
        }
    }
}

/// Basket owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Purchasable product (a course seat for course products)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub product: Product,
    pub quantity: u32,
    pub unit_price_excl_tax: Decimal,
    pub unit_price_incl_tax: Decimal,
}

impl BasketLine {
    pub fn line_price_excl_tax(&self) -> Decimal {
        self.unit_price_excl_tax * Decimal::from(self.quantity)
    }

    pub fn line_price_incl_tax(&self) -> Decimal {
        self.unit_price_incl_tax * Decimal::from(self.quantity)
    }
}

/// Error for an illegal basket status transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Basket {basket_id} cannot move from {from} to {to}")]
pub struct BasketTransitionError {
    pub basket_id: i64,
    pub from: BasketStatus,
    pub to: BasketStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: i64,
    pub order_number: String,
    pub owner: User,
    pub currency: String,
    pub status: BasketStatus,
    pub lines: Vec<BasketLine>,
}

impl Basket {
    pub fn total_incl_tax(&self) -> Decimal {
        self.lines.iter().map(BasketLine::line_price_incl_tax).sum()
    }

    pub fn total_excl_tax(&self) -> Decimal {
        self.lines.iter().map(BasketLine::line_price_excl_tax).sum()
    }

    pub fn is_frozen(&self) -> bool {
        self.status == BasketStatus::Frozen
    }

    /// Lock the basket against line changes when checkout begins
    pub fn freeze(&mut self) -> Result<(), BasketTransitionError> {
        if self.status != BasketStatus::Open {
            return Err(self.transition_error(BasketStatus::Frozen));
        }
        self.status = BasketStatus::Frozen;
        Ok(())
    }

    /// Mark the basket as converted into an order. Allowed exactly once.
    pub fn submit(&mut self) -> Result<(), BasketTransitionError> {
        if self.status == BasketStatus::Submitted {
            return Err(self.transition_error(BasketStatus::Submitted));
        }
        self.status = BasketStatus::Submitted;
        Ok(())
    }

    fn transition_error(&self, to: BasketStatus) -> BasketTransitionError {
        BasketTransitionError {
            basket_id: self.id,
            from: self.status,
            to,
        }
    }
}

/// Generates order numbers from basket ids
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    const OFFSET: i64 = 100_000;

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn order_number(&self, basket_id: i64) -> String {
        format!("{}-{}", self.prefix, Self::OFFSET + basket_id)
    }

    /// Recover the basket id from an order number produced by this generator
    pub fn basket_id(&self, order_number: &str) -> Option<i64> {
        let (prefix, number) = order_number.rsplit_once('-')?;
        if prefix != self.prefix {
            return None;
        }
        number.parse::<i64>().ok().map(|n| n - Self::OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn basket(status: BasketStatus) -> Basket {
        Basket {
            id: 7,
            order_number: "EDX-100007".to_string(),
            owner: User {
                id: 1,
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
            },
            currency: "NGN".to_string(),
            status,
            lines: vec![
                BasketLine {
                    product: Product {
                        id: 3,
                        title: "Rust 101".to_string(),
                        course_id: Some("course-v1:edX+RS101+2024".to_string()),
                    },
                    quantity: 2,
                    unit_price_excl_tax: dec!(40.00),
                    unit_price_incl_tax: dec!(50.00),
                },
                BasketLine {
                    product: Product {
                        id: 4,
                        title: "Workbook".to_string(),
                        course_id: None,
                    },
                    quantity: 1,
                    unit_price_excl_tax: dec!(9.99),
                    unit_price_incl_tax: dec!(9.99),
                },
            ],
        }
    }

    #[test]
    fn test_totals_sum_lines() {
        let basket = basket(BasketStatus::Open);
        assert_eq!(basket.total_incl_tax(), dec!(109.99));
        assert_eq!(basket.total_excl_tax(), dec!(89.99));
    }

    #[test]
    fn test_freeze_only_from_open() {
        let mut basket = basket(BasketStatus::Open);
        assert!(basket.freeze().is_ok());
        assert!(basket.is_frozen());
        assert!(basket.freeze().is_err());
    }

    #[test]
    fn test_submit_at_most_once() {
        let mut basket = basket(BasketStatus::Frozen);
        basket.submit().unwrap();
        let err = basket.submit().unwrap_err();
        assert_eq!(err.from, BasketStatus::Submitted);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [BasketStatus::Open, BasketStatus::Frozen, BasketStatus::Submitted] {
            assert_eq!(status.as_str().parse::<BasketStatus>(), Ok(status));
        }
        assert!("Merged".parse::<BasketStatus>().is_err());
    }

    #[test]
    fn test_order_number_generator() {
        let generator = OrderNumberGenerator::new("EDX");
        assert_eq!(generator.order_number(7), "EDX-100007");
        assert_eq!(generator.basket_id("EDX-100007"), Some(7));
        assert_eq!(generator.basket_id("OTHER-100007"), None);
    }
}
