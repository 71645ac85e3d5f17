//! The chain runner: filters enabled validators, runs them in
//! ascending-priority order, and returns on the first non-pass
//! (spec.md §4.3).

use std::sync::Arc;

use crate::models::OrderIntent;

use super::registry::ValidatorRegistry;
use super::validator::{RiskContext, ValidationOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    Open,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("rejected by {validator}: {reason}")]
    Rejected { validator: String, reason: String },

    #[error("validator {validator} errored: {reason}")]
    ValidatorError { validator: String, reason: String },
}

pub struct RiskPipeline {
    registry: Arc<ValidatorRegistry>,
    fail_policy: FailPolicy,
}

impl RiskPipeline {
    pub fn new(registry: Arc<ValidatorRegistry>, fail_policy: FailPolicy) -> Self {
        Self { registry, fail_policy }
    }

    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.registry
    }

    /// Runs every enabled validator in ascending priority order against
    /// `order`, stopping at the first reject. `Error` is policy-driven:
    /// `fail_closed` (the default) treats it as a reject; a validator
    /// marked `fail_open` lets evaluation continue instead.
    pub async fn evaluate(&self, order: &OrderIntent, context: &RiskContext) -> Result<(), RiskError> {
        let snapshot = self.registry.snapshot();

        for validator in snapshot.iter().filter(|v| v.enabled()) {
            let result = validator.validate(order, context).await;
            match result.outcome {
                ValidationOutcome::Pass => continue,
                ValidationOutcome::Reject => {
                    return Err(RiskError::Rejected {
                        validator: validator.name().to_string(),
                        reason: result.reason.unwrap_or_else(|| "rejected".to_string()),
                    });
                }
                ValidationOutcome::Error => {
                    let effective_fail_open = validator.fail_open() || self.fail_policy == FailPolicy::Open;
                    if effective_fail_open {
                        tracing::warn!(
                            validator = validator.name(),
                            "validator errored, continuing under fail_open policy"
                        );
                        continue;
                    }
                    return Err(RiskError::ValidatorError {
                        validator: validator.name().to_string(),
                        reason: result.reason.unwrap_or_else(|| "risk system error".to_string()),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, Side, TimeInForce, UserId};
    use crate::risk::validator::{RiskValidator, ValidationResult};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    struct AlwaysReject(i32);
    #[async_trait]
    impl RiskValidator for AlwaysReject {
        fn name(&self) -> &str {
            "always_reject"
        }
        fn priority(&self) -> i32 {
            self.0
        }
        async fn validate(&self, _order: &OrderIntent, _ctx: &RiskContext) -> ValidationResult {
            ValidationResult::reject("nope")
        }
    }

    struct Spy {
        priority: i32,
        invoked: Arc<std::sync::atomic::AtomicBool>,
    }
    #[async_trait]
    impl RiskValidator for Spy {
        fn name(&self) -> &str {
            "spy"
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn validate(&self, _order: &OrderIntent, _ctx: &RiskContext) -> ValidationResult {
            self.invoked.store(true, std::sync::atomic::Ordering::SeqCst);
            ValidationResult::pass()
        }
    }

    fn intent() -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".into(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            order_type: crate::models::OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            quantity: Decimal::from(1),
            price: None,
            stop_price: None,
            expires_at: None,
        }
    }

    fn context() -> RiskContext {
        RiskContext {
            current_position: Decimal::ZERO,
            current_price: Some(Decimal::from(100)),
            recent_volatility: Decimal::ZERO,
            daily_realized_pnl: Decimal::ZERO,
            daily_unrealized_pnl: Decimal::ZERO,
            market_open: true,
        }
    }

    #[tokio::test]
    async fn reject_short_circuits_later_validators() {
        let invoked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let registry = Arc::new(ValidatorRegistry::new(vec![
            Arc::new(AlwaysReject(1)),
            Arc::new(Spy {
                priority: 2,
                invoked: invoked.clone(),
            }),
        ]));
        let pipeline = RiskPipeline::new(registry, FailPolicy::Closed);
        let result = pipeline.evaluate(&intent(), &context()).await;
        assert!(result.is_err());
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }
}
