//! Hot-swappable validator snapshot (SPEC_FULL.md §B.2). `reload`
//! swaps the live `Arc<Vec<_>>` under a lock without interrupting an
//! evaluation already holding the previous snapshot — no dynamic code
//! loading across process boundaries is required (spec.md §9).

use std::sync::Arc;

use parking_lot::RwLock;

use super::validator::RiskValidator;

pub struct ValidatorRegistry {
    snapshot: RwLock<Arc<Vec<Arc<dyn RiskValidator>>>>,
}

impl ValidatorRegistry {
    pub fn new(validators: Vec<Arc<dyn RiskValidator>>) -> Self {
        let mut sorted = validators;
        sorted.sort_by_key(|v| v.priority());
        Self {
            snapshot: RwLock::new(Arc::new(sorted)),
        }
    }

    /// Cheap clone of the current `Arc`; callers use this snapshot for
    /// the whole duration of one evaluation so a concurrent `reload`
    /// cannot change the validator set mid-run.
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn RiskValidator>>> {
        self.snapshot.read().clone()
    }

    pub fn reload(&self, validators: Vec<Arc<dyn RiskValidator>>) {
        let mut sorted = validators;
        sorted.sort_by_key(|v| v.priority());
        *self.snapshot.write() = Arc::new(sorted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderIntent;
    use crate::risk::validator::{RiskContext, ValidationResult};
    use async_trait::async_trait;

    struct Marker(&'static str, i32);

    #[async_trait]
    impl RiskValidator for Marker {
        fn name(&self) -> &str {
            self.0
        }
        fn priority(&self) -> i32 {
            self.1
        }
        async fn validate(&self, _order: &OrderIntent, _ctx: &RiskContext) -> ValidationResult {
            ValidationResult::pass()
        }
    }

    #[test]
    fn snapshot_taken_before_reload_is_unaffected_by_it() {
        let registry = ValidatorRegistry::new(vec![Arc::new(Marker("a", 1))]);
        let in_flight = registry.snapshot();
        registry.reload(vec![Arc::new(Marker("b", 1))]);
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].name(), "a");
        assert_eq!(registry.snapshot()[0].name(), "b");
    }

    #[test]
    fn reload_keeps_validators_sorted_by_priority() {
        let registry = ValidatorRegistry::new(vec![Arc::new(Marker("high", 10)), Arc::new(Marker("low", 1))]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].name(), "low");
        assert_eq!(snapshot[1].name(), "high");
    }
}
