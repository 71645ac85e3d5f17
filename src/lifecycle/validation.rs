//! Field validation run before the Risk Pipeline (spec.md §4.2.1).

use chrono::{Duration as ChronoDuration, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

use crate::models::{OrderIntent, OrderType};

use super::LifecycleError;

/// `^[A-Z0-9]{1,10}(-[A-Z0-9]{1,10})?$`
fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{1,10}(-[A-Z0-9]{1,10})?$").expect("symbol pattern is valid"))
}

/// Per-symbol bounds a deployment configures; looked up by the caller
/// (the lifecycle manager holds one of these per known symbol, falling
/// back to a default for symbols not explicitly configured).
#[derive(Debug, Clone)]
pub struct SymbolLimits {
    pub min_quantity: Decimal,
    pub max_quantity: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl Default for SymbolLimits {
    fn default() -> Self {
        Self {
            min_quantity: Decimal::new(1, 8),
            max_quantity: Decimal::from(1_000_000),
            min_price: Decimal::new(1, 4),
            max_price: Decimal::from(10_000_000),
        }
    }
}

pub fn validate_intent(intent: &OrderIntent, limits: &SymbolLimits) -> Result<(), LifecycleError> {
    if intent.client_order_id.trim().is_empty() {
        return Err(LifecycleError::Validation("client_order_id is required".into()));
    }
    if !symbol_pattern().is_match(&intent.symbol) {
        return Err(LifecycleError::Validation(format!(
            "symbol '{}' does not match the required pattern",
            intent.symbol
        )));
    }
    if intent.quantity <= Decimal::ZERO {
        return Err(LifecycleError::Validation("quantity must be positive".into()));
    }
    if intent.quantity < limits.min_quantity || intent.quantity > limits.max_quantity {
        return Err(LifecycleError::Validation(format!(
            "quantity {} outside configured bounds [{}, {}]",
            intent.quantity, limits.min_quantity, limits.max_quantity
        )));
    }

    let price_required = intent.order_type.requires_price();
    match (price_required, intent.price) {
        (true, None) => {
            return Err(LifecycleError::Validation(format!(
                "price is required for order type {}",
                intent.order_type
            )))
        }
        (false, Some(_)) if intent.order_type == OrderType::Market => {
            return Err(LifecycleError::Validation("price must not be set for MARKET orders".into()))
        }
        (true, Some(price)) if price < limits.min_price || price > limits.max_price => {
            return Err(LifecycleError::Validation(format!(
                "price {} outside configured bounds [{}, {}]",
                price, limits.min_price, limits.max_price
            )))
        }
        _ => {}
    }

    let stop_required = intent.order_type.requires_stop_price();
    match (stop_required, intent.stop_price) {
        (true, None) => {
            return Err(LifecycleError::Validation(format!(
                "stop_price is required for order type {}",
                intent.order_type
            )))
        }
        (false, Some(_)) => {
            return Err(LifecycleError::Validation("stop_price must not be set for this order type".into()))
        }
        _ => {}
    }

    if intent.order_type == OrderType::StopLimit {
        if let (Some(price), Some(stop_price)) = (intent.price, intent.stop_price) {
            let sane = match intent.side {
                crate::models::Side::Buy => stop_price >= price,
                crate::models::Side::Sell => stop_price <= price,
            };
            if !sane {
                tracing::warn!(
                    side = %intent.side,
                    price = %price,
                    stop_price = %stop_price,
                    "stop_limit order has an unusual stop_price/price relationship"
                );
            }
        }
    }

    if let Some(expires_at) = intent.expires_at {
        let now = Utc::now();
        if expires_at <= now {
            return Err(LifecycleError::Validation("expires_at must be in the future".into()));
        }
        if expires_at > now + ChronoDuration::days(90) {
            return Err(LifecycleError::Validation("expires_at must be within 90 days".into()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, Side, TimeInForce, UserId};
    use rust_decimal_macros::dec;

    fn base_intent() -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".to_string(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: dec!(10),
            price: Some(dec!(150.00)),
            stop_price: None,
            expires_at: None,
        }
    }

    #[test]
    fn valid_limit_order_passes() {
        assert!(validate_intent(&base_intent(), &SymbolLimits::default()).is_ok());
    }

    #[test]
    fn rejects_malformed_symbol() {
        let mut intent = base_intent();
        intent.symbol = "aapl!".to_string();
        assert!(validate_intent(&intent, &SymbolLimits::default()).is_err());
    }

    #[test]
    fn limit_order_requires_price() {
        let mut intent = base_intent();
        intent.price = None;
        assert!(validate_intent(&intent, &SymbolLimits::default()).is_err());
    }

    #[test]
    fn stop_limit_requires_stop_price() {
        let mut intent = base_intent();
        intent.order_type = OrderType::StopLimit;
        intent.stop_price = None;
        assert!(validate_intent(&intent, &SymbolLimits::default()).is_err());
    }

    #[test]
    fn quantity_below_minimum_is_rejected() {
        let mut intent = base_intent();
        let limits = SymbolLimits {
            min_quantity: dec!(5),
            ..SymbolLimits::default()
        };
        intent.quantity = dec!(1);
        assert!(validate_intent(&intent, &limits).is_err());
    }
}
