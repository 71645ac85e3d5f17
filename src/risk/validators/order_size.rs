use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::OrderIntent;
use crate::risk::validator::{RiskContext, RiskValidator, ValidationResult};

/// Rejects orders outside `[min_qty, max_qty]` or whose notional
/// (`quantity * reference price`) exceeds `max_notional`.
pub struct OrderSizeValidator {
    priority: i32,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub max_notional: Decimal,
}

impl OrderSizeValidator {
    pub fn new(priority: i32, min_qty: Decimal, max_qty: Decimal, max_notional: Decimal) -> Self {
        Self {
            priority,
            min_qty,
            max_qty,
            max_notional,
        }
    }
}

#[async_trait]
impl RiskValidator for OrderSizeValidator {
    fn name(&self) -> &str {
        "order_size"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, order: &OrderIntent, context: &RiskContext) -> ValidationResult {
        if order.quantity < self.min_qty {
            return ValidationResult::reject(format!(
                "quantity {} below min_qty {}",
                order.quantity, self.min_qty
            ));
        }
        if order.quantity > self.max_qty {
            return ValidationResult::reject(format!(
                "quantity {} above max_qty {}",
                order.quantity, self.max_qty
            ));
        }

        let reference_price = order.price.or(context.current_price);
        if let Some(price) = reference_price {
            let notional = order.quantity * price;
            if notional > self.max_notional {
                return ValidationResult::reject(format!(
                    "notional {notional} exceeds max_notional {}",
                    self.max_notional
                ));
            }
        }

        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, Side, TimeInForce, UserId};

    fn intent(qty: Decimal, price: Option<Decimal>) -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".into(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: qty,
            price,
            stop_price: None,
            expires_at: None,
        }
    }

    fn context() -> RiskContext {
        RiskContext {
            current_position: Decimal::ZERO,
            current_price: None,
            recent_volatility: Decimal::ZERO,
            daily_realized_pnl: Decimal::ZERO,
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        }
    }

    #[tokio::test]
    async fn rejects_below_minimum() {
        let v = OrderSizeValidator::new(1, Decimal::from(10), Decimal::from(1000), Decimal::from(1_000_000));
        let result = v.validate(&intent(Decimal::from(1), Some(Decimal::from(10))), &context()).await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }

    #[tokio::test]
    async fn rejects_notional_above_max() {
        let v = OrderSizeValidator::new(1, Decimal::from(1), Decimal::from(1000), Decimal::from(500));
        let result = v
            .validate(&intent(Decimal::from(100), Some(Decimal::from(10))), &context())
            .await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }
}
