//! The validator contract (spec.md §4.3): `(name, type, priority,
//! enabled, validate(order, context) → Pass | Reject | Error)`.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::OrderIntent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationOutcome {
    Pass,
    Reject,
    Error,
}

/// Read-only evaluation context shared by every validator in one
/// pipeline run. Built fresh per evaluation from the Risk Pipeline's
/// external collaborators (`PriceOracle`, `PositionProvider`).
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub current_position: Decimal,
    pub current_price: Option<Decimal>,
    pub recent_volatility: Decimal,
    pub daily_realized_pnl: Decimal,
    pub daily_unrealized_pnl: Decimal,
    pub market_open: bool,
}

/// Outcome of running one validator. `reason` is populated for
/// `Reject`/`Error`; `None` for `Pass`.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub outcome: ValidationOutcome,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            outcome: ValidationOutcome::Pass,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            outcome: ValidationOutcome::Reject,
            reason: Some(reason.into()),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            outcome: ValidationOutcome::Error,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait RiskValidator: Send + Sync {
    fn name(&self) -> &str;

    /// Ascending priority; lower runs first.
    fn priority(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    /// Validators explicitly marked non-critical may opt into
    /// `fail_open`: an internal `Error` from this validator is treated
    /// as `Pass` rather than the pipeline's default `fail_closed`.
    fn fail_open(&self) -> bool {
        false
    }

    async fn validate(&self, order: &OrderIntent, context: &RiskContext) -> ValidationResult;
}
