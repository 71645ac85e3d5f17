//! Built-in risk validators. Each is a small, independently testable
//! `RiskValidator` impl; wiring priorities and parameters together into
//! a `ValidatorRegistry` happens in composition (see `main`/`config`).

mod daily_loss;
mod duplicate;
mod order_size;
mod position_limit;
mod volatility;

pub use daily_loss::DailyLossValidator;
pub use duplicate::{DuplicateCache, DuplicateSuppressionValidator};
pub use order_size::OrderSizeValidator;
pub use position_limit::PositionLimitValidator;
pub use volatility::VolatilityValidator;
