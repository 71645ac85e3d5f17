//! Order Lifecycle Manager (spec.md §4.2): the single writer-path
//! owner of every `Order` record. Intents arrive through `create`,
//! flow through field validation → risk pipeline → matching engine,
//! and are applied to the in-memory registry in write batches
//! (`lifecycle::batch`) so the registry lock is taken once per batch
//! rather than once per order.

pub mod batch;
pub mod expiry;
pub mod validation;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use crate::market_data::{PositionProvider, PriceOracle};
use crate::matching::{MatchingEngine, MatchingError};
use crate::models::{
    Order, OrderFilter, OrderId, OrderIntent, OrderStatus, OrderType, SequenceGenerator, UpdateOrderPatch, UserId,
};
use crate::risk::{DuplicateCache, RiskContext, RiskError, RiskPipeline};
use crate::shutdown::ShutdownToken;

use batch::{BatchApplier, BatchConfig, BatchProcessor, LifecycleOp};
use expiry::{ExpiryHandler, ExpiryScheduler};
use validation::SymbolLimits;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("client_order_id '{0}' already used by this user")]
    ClientOrderIdExists(String),

    #[error("cannot transition order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("market for {0} is closed")]
    MarketClosed(String),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Matching(#[from] MatchingError),

    #[error("batch channel is full or the worker pool has shut down")]
    BatchChannelFull,

    #[error("persistence error: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub batch: BatchConfig,
    pub default_symbol_limits: SymbolLimits,
    pub max_orders_per_user: usize,
    pub duplicate_window: Duration,
    /// Grace period a terminal order stays in the in-memory registry
    /// before the eviction sweep drops it (SPEC_FULL.md §B.1).
    pub eviction_grace: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            default_symbol_limits: SymbolLimits::default(),
            max_orders_per_user: 10_000,
            duplicate_window: Duration::from_secs(86_400),
            eviction_grace: Duration::from_secs(300),
        }
    }
}

/// Emitted to the distribution bus after every successful registry
/// mutation: the up-to-date order plus whatever trades the mutation
/// produced (empty for everything but a matched `create`).
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub order: Order,
    pub trades: Vec<crate::models::Trade>,
}

/// In-memory order book of record. Guarded by a single `RwLock` taken
/// once per applied batch, never once per order.
struct Registry {
    orders: HashMap<OrderId, Order>,
}

impl Registry {
    fn new() -> Self {
        Self { orders: HashMap::new() }
    }

    /// Drops terminal orders that have outlived `grace` since their last
    /// update, returning how many were evicted.
    fn evict_terminal(&mut self, grace: Duration) -> usize {
        let now = Utc::now();
        let before = self.orders.len();
        self.orders.retain(|_, order| {
            if !order.status.is_terminal() {
                return true;
            }
            match (now - order.updated_at).to_std() {
                Ok(age) => age < grace,
                Err(_) => true,
            }
        });
        before - self.orders.len()
    }
}

struct Inner {
    registry: RwLock<Registry>,
    sequence: SequenceGenerator,
    matching: Arc<MatchingEngine>,
    risk: Arc<RiskPipeline>,
    price_oracle: Arc<dyn PriceOracle>,
    position_provider: Arc<dyn PositionProvider>,
    expiry: Arc<ExpiryScheduler>,
    duplicate_cache: Arc<DuplicateCache>,
    config: LifecycleConfig,
    event_tx: tokio::sync::broadcast::Sender<OrderEvent>,
}

impl Inner {
    async fn risk_context(&self, intent: &OrderIntent) -> RiskContext {
        let current_price = self.price_oracle.last_price(&intent.symbol).await;
        let recent_volatility = self.price_oracle.recent_volatility(&intent.symbol).await;
        let market_open = self.price_oracle.is_market_open(&intent.symbol).await;
        let current_position = self.position_provider.position(&intent.account_id, &intent.symbol).await;
        let (daily_realized_pnl, daily_unrealized_pnl) = self.position_provider.daily_pnl(&intent.account_id).await;

        RiskContext {
            current_position,
            current_price,
            recent_volatility,
            daily_realized_pnl,
            daily_unrealized_pnl,
            market_open,
        }
    }

    fn symbol_limits(&self, _symbol: &str) -> SymbolLimits {
        self.config.default_symbol_limits.clone()
    }

    async fn do_create(&self, intent: OrderIntent) -> Result<Order, LifecycleError> {
        validation::validate_intent(&intent, &self.symbol_limits(&intent.symbol))
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;

        if self.duplicate_cache.contains(&intent.user_id, &intent.client_order_id) {
            return Err(LifecycleError::ClientOrderIdExists(intent.client_order_id.clone()));
        }

        let context = self.risk_context(&intent).await;

        // spec.md §4.2.1 "market hours honored for MARKET orders per
        // symbol schedule" — gated ahead of the risk chain, not as a
        // validator, since it's a hard market-state fact rather than a
        // per-account risk judgment.
        if intent.order_type == OrderType::Market && !context.market_open {
            return Err(LifecycleError::MarketClosed(intent.symbol.clone()));
        }

        self.risk.evaluate(&intent, &context).await?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            client_order_id: intent.client_order_id,
            user_id: intent.user_id,
            account_id: intent.account_id,
            symbol: intent.symbol,
            side: intent.side,
            order_type: intent.order_type,
            time_in_force: intent.time_in_force,
            quantity: intent.quantity,
            filled_quantity: rust_decimal::Decimal::ZERO,
            price: intent.price,
            stop_price: intent.stop_price,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
            expires_at: intent.expires_at,
            sequence: self.sequence.next(),
        };

        let (outcome, trades) = self.matching.submit_order(&order)?;

        let mut final_order = order;
        final_order.status = outcome.status;
        final_order.filled_quantity = outcome.filled_quantity;
        final_order.updated_at = Utc::now();

        if let Some(expires_at) = final_order.expires_at {
            if !final_order.status.is_terminal() {
                self.expiry.schedule(final_order.id, expires_at);
            }
        }

        self.duplicate_cache.record(&final_order.user_id, &final_order.client_order_id);

        {
            let mut registry = self.registry.write();
            registry.orders.insert(final_order.id, final_order.clone());
        }

        let _ = self.event_tx.send(OrderEvent {
            order: final_order.clone(),
            trades,
        });

        Ok(final_order)
    }

    async fn do_update(&self, order_id: OrderId, patch: UpdateOrderPatch) -> Result<Order, LifecycleError> {
        let mut order = {
            let registry = self.registry.read();
            registry
                .orders
                .get(&order_id)
                .cloned()
                .ok_or(LifecycleError::OrderNotFound(order_id))?
        };

        // spec.md §4.2: update is permitted only in {NEW, PENDING}. Both
        // carry filled_quantity == 0 (PENDING is resting-unfilled; NEW
        // is never stored past `do_create` resolving it). Allowing
        // PARTIALLY_FILLED here would mean cancel-and-replace silently
        // discards a real fill.
        if !matches!(order.status, OrderStatus::New | OrderStatus::Pending) {
            return Err(LifecycleError::InvalidStatusTransition {
                from: order.status,
                to: order.status,
            });
        }

        if let Some(quantity) = patch.quantity {
            if quantity < order.filled_quantity {
                return Err(LifecycleError::Validation(format!(
                    "quantity {} must not drop below filled quantity {}",
                    quantity, order.filled_quantity
                )));
            }
        }

        if !self.matching.cancel_order(&order.symbol, order_id) {
            return Err(LifecycleError::OrderNotFound(order_id));
        }

        if let Some(quantity) = patch.quantity {
            order.quantity = quantity;
        }
        if let Some(price) = patch.price {
            order.price = Some(price);
        }
        if let Some(stop_price) = patch.stop_price {
            order.stop_price = Some(stop_price);
        }
        if let Some(expires_at) = patch.expires_at {
            order.expires_at = Some(expires_at);
        }
        order.sequence = self.sequence.next();

        let (outcome, trades) = self.matching.submit_order(&order)?;

        if outcome.status != order.status && !order.status.can_transition_to(outcome.status) {
            tracing::error!(
                order_id = %order_id,
                from = %order.status,
                to = %outcome.status,
                "matching engine produced a transition the §4.2.2 table disallows"
            );
            return Err(LifecycleError::InvalidStatusTransition {
                from: order.status,
                to: outcome.status,
            });
        }

        order.status = outcome.status;
        order.filled_quantity = outcome.filled_quantity;
        order.updated_at = Utc::now();

        {
            let mut registry = self.registry.write();
            registry.orders.insert(order.id, order.clone());
        }

        let _ = self.event_tx.send(OrderEvent {
            order: order.clone(),
            trades,
        });

        Ok(order)
    }

    async fn do_cancel(&self, order_id: OrderId, reason: String) -> Result<Order, LifecycleError> {
        let mut order = {
            let registry = self.registry.read();
            registry
                .orders
                .get(&order_id)
                .cloned()
                .ok_or(LifecycleError::OrderNotFound(order_id))?
        };

        if order.status.is_terminal() {
            return Err(LifecycleError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        if !self.matching.cancel_order(&order.symbol, order_id) {
            return Err(LifecycleError::OrderNotFound(order_id));
        }

        tracing::info!(order_id = %order_id, reason, "order cancelled");
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();

        {
            let mut registry = self.registry.write();
            registry.orders.insert(order.id, order.clone());
        }

        let _ = self.event_tx.send(OrderEvent {
            order: order.clone(),
            trades: Vec::new(),
        });

        Ok(order)
    }
}

#[async_trait::async_trait]
impl BatchApplier for Inner {
    async fn apply_batch(&self, ops: Vec<LifecycleOp>) {
        for op in ops {
            match op {
                LifecycleOp::Create { intent, respond } => {
                    let result = self.do_create(intent).await;
                    let _ = respond.send(result);
                }
                LifecycleOp::Update { order_id, patch, respond } => {
                    let result = self.do_update(order_id, patch).await;
                    let _ = respond.send(result);
                }
                LifecycleOp::Cancel { order_id, reason, respond } => {
                    let result = self.do_cancel(order_id, reason).await;
                    let _ = respond.send(result);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ExpiryHandler for Inner {
    async fn on_expire(&self, order_id: OrderId) {
        let still_live = {
            let registry = self.registry.read();
            registry.orders.get(&order_id).map(|o| !o.status.is_terminal()).unwrap_or(false)
        };
        if !still_live {
            return;
        }
        if let Err(err) = self.do_cancel(order_id, "expired".to_string()).await {
            tracing::warn!(order_id = %order_id, error = %err, "failed to expire order");
        }
    }
}

/// Public entry point for the write path. One instance per process,
/// shared behind an `Arc` with the transport layer.
pub struct OrderLifecycleManager {
    inner: Arc<Inner>,
    processor: BatchProcessor,
}

impl OrderLifecycleManager {
    /// `duplicate_cache` is shared with whatever `DuplicateSuppressionValidator`
    /// the caller wires into the risk chain, so both call sites agree on
    /// which `(user_id, client_order_id)` pairs have already resolved
    /// (SPEC_FULL.md §B.4).
    pub fn new(
        config: LifecycleConfig,
        matching: Arc<MatchingEngine>,
        risk: Arc<RiskPipeline>,
        price_oracle: Arc<dyn PriceOracle>,
        position_provider: Arc<dyn PositionProvider>,
        duplicate_cache: Arc<DuplicateCache>,
        shutdown: ShutdownToken,
    ) -> Arc<Self> {
        let (event_tx, _) = tokio::sync::broadcast::channel(4096);
        let inner = Arc::new(Inner {
            registry: RwLock::new(Registry::new()),
            sequence: SequenceGenerator::new(),
            matching,
            risk,
            price_oracle,
            position_provider,
            expiry: ExpiryScheduler::new(),
            duplicate_cache: duplicate_cache.clone(),
            config: config.clone(),
            event_tx,
        });

        inner.expiry.spawn_lane(inner.clone(), shutdown.clone());
        let processor = BatchProcessor::spawn(config.batch, inner.clone(), shutdown.clone());
        spawn_duplicate_cache_sweeper(duplicate_cache, shutdown.clone());
        spawn_eviction_sweeper(inner.clone(), shutdown);

        Arc::new(Self { inner, processor })
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<OrderEvent> {
        self.inner.event_tx.subscribe()
    }

    pub async fn create(&self, intent: OrderIntent) -> Result<Order, LifecycleError> {
        let (respond, rx) = tokio::sync::oneshot::channel();
        self.processor
            .submit(LifecycleOp::Create { intent, respond })
            .await
            .map_err(|_| LifecycleError::BatchChannelFull)?;
        rx.await.map_err(|_| LifecycleError::BatchChannelFull)?
    }

    pub async fn update(&self, order_id: OrderId, patch: UpdateOrderPatch) -> Result<Order, LifecycleError> {
        let (respond, rx) = tokio::sync::oneshot::channel();
        self.processor
            .submit(LifecycleOp::Update { order_id, patch, respond })
            .await
            .map_err(|_| LifecycleError::BatchChannelFull)?;
        rx.await.map_err(|_| LifecycleError::BatchChannelFull)?
    }

    pub async fn cancel(&self, order_id: OrderId, reason: impl Into<String>) -> Result<Order, LifecycleError> {
        let (respond, rx) = tokio::sync::oneshot::channel();
        self.processor
            .submit(LifecycleOp::Cancel {
                order_id,
                reason: reason.into(),
                respond,
            })
            .await
            .map_err(|_| LifecycleError::BatchChannelFull)?;
        rx.await.map_err(|_| LifecycleError::BatchChannelFull)?
    }

    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.inner.registry.read().orders.get(&order_id).cloned()
    }

    pub fn list(&self, filter: &OrderFilter) -> Vec<Order> {
        let registry = self.inner.registry.read();
        let mut matched: Vec<Order> = registry
            .orders
            .values()
            .filter(|o| filter.user_id.as_ref().map_or(true, |u| &o.user_id == u))
            .filter(|o| filter.account_id.as_ref().map_or(true, |a| &o.account_id == a))
            .filter(|o| filter.symbol.as_ref().map_or(true, |s| &o.symbol == s))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        matched.sort_by_key(|o| o.sequence);
        if let Some(limit) = filter.limit {
            matched.truncate(limit as usize);
        }
        matched
    }
}

/// Background task sweeping TTL-expired entries out of the duplicate
/// suppression cache every hour, per SPEC_FULL.md §C.
fn spawn_duplicate_cache_sweeper(cache: Arc<DuplicateCache>, shutdown: ShutdownToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(3600)) => cache.sweep(),
            }
        }
    });
}

/// Background task evicting terminal orders from the in-memory
/// registry once they've sat past the configured grace period
/// (SPEC_FULL.md §B.1). Runs twice as often as the grace period so a
/// newly-terminal order is never held much longer than configured.
fn spawn_eviction_sweeper(inner: Arc<Inner>, shutdown: ShutdownToken) {
    let interval = (inner.config.eviction_grace / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let evicted = inner.registry.write().evict_terminal(inner.config.eviction_grace);
                    for _ in 0..evicted {
                        crate::metrics::record_order_evicted();
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{NullPositionProvider, StaticPriceOracle};
    use crate::models::{AccountId, OrderType, Side, TimeInForce};
    use crate::risk::{FailPolicy, ValidatorRegistry};
    use rust_decimal_macros::dec;

    fn manager() -> Arc<OrderLifecycleManager> {
        manager_with_oracle(Arc::new(StaticPriceOracle))
    }

    fn manager_with_oracle(price_oracle: Arc<dyn crate::market_data::PriceOracle>) -> Arc<OrderLifecycleManager> {
        let matching = Arc::new(MatchingEngine::new());
        let registry = Arc::new(ValidatorRegistry::new(Vec::new()));
        let risk = Arc::new(RiskPipeline::new(registry, FailPolicy::Closed));
        OrderLifecycleManager::new(
            LifecycleConfig::default(),
            matching,
            risk,
            price_oracle,
            Arc::new(NullPositionProvider),
            DuplicateCache::new(10_000, Duration::from_secs(86_400)),
            ShutdownToken::new(),
        )
    }

    struct ClosedMarketOracle;

    #[async_trait::async_trait]
    impl crate::market_data::PriceOracle for ClosedMarketOracle {
        async fn last_price(&self, _symbol: &str) -> Option<rust_decimal::Decimal> {
            None
        }
        async fn recent_volatility(&self, _symbol: &str) -> rust_decimal::Decimal {
            rust_decimal::Decimal::ZERO
        }
        async fn is_market_open(&self, _symbol: &str) -> bool {
            false
        }
    }

    fn intent(client_order_id: &str) -> OrderIntent {
        OrderIntent {
            client_order_id: client_order_id.to_string(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: dec!(10),
            price: Some(dec!(150.00)),
            stop_price: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn create_resolves_to_pending_for_an_uncrossed_limit_order() {
        let manager = manager();
        let order = manager.create(intent("c1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(manager.get(order.id).unwrap().id, order.id);
    }

    #[tokio::test]
    async fn market_order_rejected_while_market_is_closed() {
        let manager = manager_with_oracle(Arc::new(ClosedMarketOracle));
        let mut market_intent = intent("c1");
        market_intent.order_type = OrderType::Market;
        market_intent.price = None;
        market_intent.time_in_force = TimeInForce::Ioc;
        let result = manager.create(market_intent).await;
        assert!(matches!(result, Err(LifecycleError::MarketClosed(_))));
    }

    #[tokio::test]
    async fn limit_order_unaffected_by_closed_market() {
        let manager = manager_with_oracle(Arc::new(ClosedMarketOracle));
        let order = manager.create(intent("c1")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_client_order_id_is_rejected() {
        let manager = manager();
        manager.create(intent("dup")).await.unwrap();
        let result = manager.create(intent("dup")).await;
        assert!(matches!(result, Err(LifecycleError::ClientOrderIdExists(_))));
    }

    #[tokio::test]
    async fn update_rejected_for_partially_filled_order() {
        let manager = manager();

        let mut resting_intent = intent("sell1");
        resting_intent.side = Side::Sell;
        resting_intent.quantity = dec!(10);
        let resting = manager.create(resting_intent).await.unwrap();

        let mut crossing_intent = intent("buy1");
        crossing_intent.quantity = dec!(4);
        manager.create(crossing_intent).await.unwrap();

        let resting_after_fill = manager.get(resting.id).unwrap();
        assert_eq!(resting_after_fill.status, OrderStatus::PartiallyFilled);

        let result = manager
            .update(
                resting.id,
                UpdateOrderPatch {
                    quantity: Some(dec!(20)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidStatusTransition { .. })));
        // the partial fill must survive the rejected update untouched
        assert_eq!(manager.get(resting.id).unwrap().filled_quantity, dec!(4));
    }

    #[tokio::test]
    async fn update_resting_order_quantity_succeeds() {
        let manager = manager();
        let resting = manager.create(intent("c1")).await.unwrap();
        let updated = manager
            .update(
                resting.id,
                UpdateOrderPatch {
                    quantity: Some(dec!(20)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, dec!(20));
        assert_eq!(updated.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_transitions_resting_order_to_cancelled() {
        let manager = manager();
        let order = manager.create(intent("c1")).await.unwrap();
        let cancelled = manager.cancel(order.id, "user requested").await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn listing_honors_status_filter() {
        let manager = manager();
        manager.create(intent("c1")).await.unwrap();
        manager.create(intent("c2")).await.unwrap();
        let cancelled = manager.cancel(manager.list(&OrderFilter::default())[0].id, "x").await.unwrap();
        let filter = OrderFilter {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        let results = manager.list(&filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, cancelled.id);
    }
}
