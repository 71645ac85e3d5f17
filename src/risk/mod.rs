//! Pre-trade risk checks (spec.md §4.3): a pluggable, priority-ordered
//! chain of validators run against every order intent before it reaches
//! the Matching Engine.

pub mod pipeline;
pub mod registry;
pub mod validator;
pub mod validators;

pub use pipeline::{FailPolicy, RiskError, RiskPipeline};
pub use registry::ValidatorRegistry;
pub use validator::{RiskContext, RiskValidator, ValidationOutcome, ValidationResult};
pub use validators::{
    DailyLossValidator, DuplicateCache, DuplicateSuppressionValidator, OrderSizeValidator,
    PositionLimitValidator, VolatilityValidator,
};
