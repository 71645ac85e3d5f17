use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::OrderIntent;
use crate::risk::validator::{RiskContext, RiskValidator, ValidationResult};

/// Rejects new risk-adding orders once the account's realized plus
/// unrealized PnL has breached `max_daily_loss`. Orders that reduce
/// existing exposure (closing trades) are exempt — they can only help.
pub struct DailyLossValidator {
    priority: i32,
    pub max_daily_loss: Decimal,
}

impl DailyLossValidator {
    pub fn new(priority: i32, max_daily_loss: Decimal) -> Self {
        Self { priority, max_daily_loss }
    }
}

#[async_trait]
impl RiskValidator for DailyLossValidator {
    fn name(&self) -> &str {
        "daily_loss"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, order: &OrderIntent, context: &RiskContext) -> ValidationResult {
        let total_pnl = context.daily_realized_pnl + context.daily_unrealized_pnl;
        if total_pnl >= -self.max_daily_loss {
            return ValidationResult::pass();
        }

        let closes_exposure = match context.current_position.is_sign_positive() {
            true => order.side == crate::models::Side::Sell,
            false => order.side == crate::models::Side::Buy,
        };
        if closes_exposure && !context.current_position.is_zero() {
            return ValidationResult::pass();
        }

        ValidationResult::reject(format!(
            "daily PnL {total_pnl} breaches max_daily_loss {}",
            self.max_daily_loss
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, Side, TimeInForce, UserId};
    use rust_decimal_macros::dec;

    fn intent(side: Side) -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".into(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: dec!(1),
            price: Some(dec!(100)),
            stop_price: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn rejects_risk_adding_order_past_loss_limit() {
        let validator = DailyLossValidator::new(1, dec!(1000));
        let ctx = RiskContext {
            current_position: dec!(10),
            current_price: Some(dec!(100)),
            recent_volatility: Decimal::ZERO,
            daily_realized_pnl: dec!(-1200),
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        };
        let result = validator.validate(&intent(Side::Buy), &ctx).await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }

    #[tokio::test]
    async fn allows_closing_order_past_loss_limit() {
        let validator = DailyLossValidator::new(1, dec!(1000));
        let ctx = RiskContext {
            current_position: dec!(10),
            current_price: Some(dec!(100)),
            recent_volatility: Decimal::ZERO,
            daily_realized_pnl: dec!(-1200),
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        };
        let result = validator.validate(&intent(Side::Sell), &ctx).await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Pass);
    }
}
