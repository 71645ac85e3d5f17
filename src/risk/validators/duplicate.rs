//! Duplicate Suppression: rejects if `(user_id, client_order_id)` has
//! already been resolved within a bounded recent-window cache.
//!
//! SPEC_FULL.md §C resolves the open question about the suppression
//! window: bounded per-user entry count plus a 24h TTL sweep, rather
//! than the unbounded cache the source carried. The same cache backs
//! `OrderLifecycleManager::create`'s direct `ClientOrderIdExists` gate
//! (SPEC_FULL.md §B.4) so both call sites agree on what "duplicate"
//! means.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::{OrderIntent, UserId};
use crate::risk::validator::{RiskContext, RiskValidator, ValidationResult};

#[derive(Debug)]
pub struct DuplicateCache {
    seen: DashMap<(UserId, String), Instant>,
    max_entries_per_user: usize,
    ttl: Duration,
}

impl DuplicateCache {
    pub fn new(max_entries_per_user: usize, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            seen: DashMap::new(),
            max_entries_per_user,
            ttl,
        })
    }

    pub fn contains(&self, user_id: &UserId, client_order_id: &str) -> bool {
        self.seen.contains_key(&(user_id.clone(), client_order_id.to_string()))
    }

    /// Records the id as seen. If the user is already at capacity, the
    /// oldest entry for that user is evicted first.
    pub fn record(&self, user_id: &UserId, client_order_id: &str) {
        let per_user_count = self
            .seen
            .iter()
            .filter(|entry| entry.key().0 == *user_id)
            .count();

        if per_user_count >= self.max_entries_per_user {
            if let Some(oldest_key) = self
                .seen
                .iter()
                .filter(|entry| entry.key().0 == *user_id)
                .min_by_key(|entry| *entry.value())
                .map(|entry| entry.key().clone())
            {
                self.seen.remove(&oldest_key);
            }
        }

        self.seen.insert((user_id.clone(), client_order_id.to_string()), Instant::now());
    }

    /// Removes every entry older than the configured TTL. Intended to
    /// be called periodically by a background sweep task.
    pub fn sweep(&self) {
        let cutoff = Instant::now().checked_sub(self.ttl).unwrap_or_else(Instant::now);
        self.seen.retain(|_, inserted_at| *inserted_at > cutoff);
    }
}

pub struct DuplicateSuppressionValidator {
    priority: i32,
    cache: Arc<DuplicateCache>,
}

impl DuplicateSuppressionValidator {
    pub fn new(priority: i32, cache: Arc<DuplicateCache>) -> Self {
        Self { priority, cache }
    }
}

#[async_trait]
impl RiskValidator for DuplicateSuppressionValidator {
    fn name(&self) -> &str {
        "duplicate_suppression"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn validate(&self, order: &OrderIntent, _context: &RiskContext) -> ValidationResult {
        if self.cache.contains(&order.user_id, &order.client_order_id) {
            return ValidationResult::reject(format!(
                "client_order_id {} already resolved for this user",
                order.client_order_id
            ));
        }
        ValidationResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, Side, TimeInForce};

    fn intent(client_order_id: &str) -> OrderIntent {
        OrderIntent {
            client_order_id: client_order_id.to_string(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".into(),
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            quantity: rust_decimal::Decimal::from(1),
            price: None,
            stop_price: None,
            expires_at: None,
        }
    }

    fn context() -> RiskContext {
        RiskContext {
            current_position: rust_decimal::Decimal::ZERO,
            current_price: None,
            recent_volatility: rust_decimal::Decimal::ZERO,
            daily_realized_pnl: rust_decimal::Decimal::ZERO,
            daily_unrealized_pnl: rust_decimal::Decimal::ZERO,
            market_open: true,
        }
    }

    #[tokio::test]
    async fn second_submission_of_same_client_order_id_is_rejected() {
        let cache = DuplicateCache::new(100, Duration::from_secs(86_400));
        let validator = DuplicateSuppressionValidator::new(1, cache.clone());

        let first = validator.validate(&intent("c1"), &context()).await;
        assert_eq!(first.outcome, crate::risk::validator::ValidationOutcome::Pass);
        cache.record(&UserId::from("u1"), "c1");

        let second = validator.validate(&intent("c1"), &context()).await;
        assert_eq!(second.outcome, crate::risk::validator::ValidationOutcome::Reject);
    }

    #[test]
    fn sweep_evicts_entries_past_ttl() {
        let cache = DuplicateCache::new(100, Duration::from_millis(1));
        cache.record(&UserId::from("u1"), "c1");
        std::thread::sleep(Duration::from_millis(10));
        cache.sweep();
        assert!(!cache.contains(&UserId::from("u1"), "c1"));
    }

    #[test]
    fn capacity_eviction_drops_oldest_entry_first() {
        let cache = DuplicateCache::new(1, Duration::from_secs(86_400));
        cache.record(&UserId::from("u1"), "c1");
        cache.record(&UserId::from("u1"), "c2");
        assert!(!cache.contains(&UserId::from("u1"), "c1"));
        assert!(cache.contains(&UserId::from("u1"), "c2"));
    }
}
