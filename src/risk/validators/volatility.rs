use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::OrderIntent;
use crate::risk::validator::{RiskContext, RiskValidator, ValidationResult};

/// Rejects when `vol × qty × price × risk_multiplier` exceeds
/// `max_vol × qty × price` — i.e. when the recent volatility estimate,
/// scaled by the configured multiplier, is itself above the configured
/// ceiling.
pub struct VolatilityValidator {
    priority: i32,
    pub max_vol: Decimal,
    pub risk_multiplier: Decimal,
}

impl VolatilityValidator {
    pub fn new(priority: i32, max_vol: Decimal, risk_multiplier: Decimal) -> Self {
        Self {
            priority,
            max_vol,
            risk_multiplier,
        }
    }
}

#[async_trait]
impl RiskValidator for VolatilityValidator {
    fn name(&self) -> &str {
        "volatility"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, order: &OrderIntent, context: &RiskContext) -> ValidationResult {
        let Some(price) = order.price.or(context.current_price) else {
            return ValidationResult::pass();
        };

        let risk_weighted_vol = context.recent_volatility * order.quantity * price * self.risk_multiplier;
        let ceiling = self.max_vol * order.quantity * price;

        if risk_weighted_vol > ceiling {
            return ValidationResult::reject(format!(
                "risk-weighted volatility {risk_weighted_vol} exceeds ceiling {ceiling}"
            ));
        }

        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, Side, TimeInForce, UserId};
    use rust_decimal_macros::dec;

    fn intent() -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".into(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: dec!(10),
            price: Some(dec!(100)),
            stop_price: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn rejects_when_volatility_too_high() {
        let validator = VolatilityValidator::new(1, dec!(0.01), dec!(1));
        let ctx = RiskContext {
            current_position: Decimal::ZERO,
            current_price: Some(dec!(100)),
            recent_volatility: dec!(0.5),
            daily_realized_pnl: Decimal::ZERO,
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        };
        let result = validator.validate(&intent(), &ctx).await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }

    #[tokio::test]
    async fn passes_when_volatility_within_bounds() {
        let validator = VolatilityValidator::new(1, dec!(1), dec!(1));
        let ctx = RiskContext {
            current_position: Decimal::ZERO,
            current_price: Some(dec!(100)),
            recent_volatility: dec!(0.01),
            daily_realized_pnl: Decimal::ZERO,
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        };
        let result = validator.validate(&intent(), &ctx).await;
        assert_eq!(result.outcome, crate::risk::validator::ValidationOutcome::Pass);
    }
}
