use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{OrderIntent, Side};
use crate::risk::validator::{RiskContext, RiskValidator, ValidationResult};

/// Rejects if the hypothetical post-order position breaches any of
/// `max_long`, `max_short`, `max_total` for the account.
pub struct PositionLimitValidator {
    priority: i32,
    pub max_long: Decimal,
    pub max_short: Decimal,
    pub max_total: Decimal,
}

impl PositionLimitValidator {
    pub fn new(priority: i32, max_long: Decimal, max_short: Decimal, max_total: Decimal) -> Self {
        Self {
            priority,
            max_long,
            max_short,
            max_total,
        }
    }
}

#[async_trait]
impl RiskValidator for PositionLimitValidator {
    fn name(&self) -> &str {
        "position_limit"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, order: &OrderIntent, context: &RiskContext) -> ValidationResult {
        let signed_qty = match order.side {
            Side::Buy => order.quantity,
            Side::Sell => -order.quantity,
        };
        let post_position = context.current_position + signed_qty;

        if post_position > self.max_long {
            return ValidationResult::reject(format!(
                "post-order long position {post_position} exceeds max_long {}",
                self.max_long
            ));
        }
        if post_position < -self.max_short {
            return ValidationResult::reject(format!(
                "post-order short position {post_position} exceeds max_short {}",
                self.max_short
            ));
        }
        if post_position.abs() > self.max_total {
            return ValidationResult::reject(format!(
                "post-order position {post_position} exceeds max_total {}",
                self.max_total
            ));
        }

        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, TimeInForce, UserId};

    fn intent(side: Side, qty: Decimal) -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".into(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: qty,
            price: Some(Decimal::from(150)),
            stop_price: None,
            expires_at: None,
        }
    }

    fn context(position: Decimal) -> RiskContext {
        RiskContext {
            current_position: position,
            current_price: Some(Decimal::from(150)),
            recent_volatility: Decimal::ZERO,
            daily_realized_pnl: Decimal::ZERO,
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        }
    }

    #[tokio::test]
    async fn rejects_when_post_order_long_exceeds_max() {
        let validator = PositionLimitValidator::new(1, Decimal::from(100), Decimal::from(100), Decimal::from(200));
        let result = validator
            .validate(&intent(Side::Buy, Decimal::from(20)), &context(Decimal::from(95)))
            .await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }

    #[tokio::test]
    async fn passes_within_bounds() {
        let validator = PositionLimitValidator::new(1, Decimal::from(100), Decimal::from(100), Decimal::from(200));
        let result = validator
            .validate(&intent(Side::Buy, Decimal::from(5)), &context(Decimal::from(95)))
            .await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Pass);
    }
}
