//! Bounded-channel batch processor for write-side order operations
//! (spec.md §4.2.3): N worker lanes each drain up to `batch_size`
//! operations, or whatever arrived within `batch_timeout`, and apply
//! the whole group under one acquisition of the registry lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};

use crate::models::{Order, OrderId, OrderIntent, UpdateOrderPatch};
use crate::shutdown::ShutdownToken;

use super::LifecycleError;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub worker_count: usize,
    pub channel_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_timeout: Duration::from_millis(100),
            worker_count: 4,
            channel_capacity: 1000,
        }
    }
}

type Responder = oneshot::Sender<Result<Order, LifecycleError>>;

pub enum LifecycleOp {
    Create {
        intent: OrderIntent,
        respond: Responder,
    },
    Update {
        order_id: OrderId,
        patch: UpdateOrderPatch,
        respond: Responder,
    },
    Cancel {
        order_id: OrderId,
        reason: String,
        respond: Responder,
    },
}

impl LifecycleOp {
    fn fail(self, err: LifecycleError) {
        let responder = match self {
            LifecycleOp::Create { respond, .. } => respond,
            LifecycleOp::Update { respond, .. } => respond,
            LifecycleOp::Cancel { respond, .. } => respond,
        };
        let _ = responder.send(Err(err));
    }
}

/// Applies one drained batch. Implemented by the lifecycle manager's
/// inner state so the processor itself stays free of registry/engine
/// details.
#[async_trait::async_trait]
pub trait BatchApplier: Send + Sync {
    async fn apply_batch(&self, ops: Vec<LifecycleOp>);
}

pub struct BatchProcessor {
    tx: mpsc::Sender<LifecycleOp>,
}

impl BatchProcessor {
    pub fn spawn(config: BatchConfig, applier: Arc<dyn BatchApplier>, shutdown: ShutdownToken) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let rx = Arc::new(AsyncMutex::new(rx));

        for lane in 0..config.worker_count.max(1) {
            let rx = rx.clone();
            let applier = applier.clone();
            let config = config.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(lane, rx, applier, config, shutdown).await;
            });
        }

        Self { tx }
    }

    pub async fn submit(&self, op: LifecycleOp) -> Result<Order, LifecycleError> {
        let (respond_tx, respond_rx) = oneshot::channel();
        let wrapped = match op {
            LifecycleOp::Create { intent, .. } => LifecycleOp::Create { intent, respond: respond_tx },
            LifecycleOp::Update { order_id, patch, .. } => LifecycleOp::Update {
                order_id,
                patch,
                respond: respond_tx,
            },
            LifecycleOp::Cancel { order_id, reason, .. } => LifecycleOp::Cancel {
                order_id,
                reason,
                respond: respond_tx,
            },
        };
        self.tx
            .try_send(wrapped)
            .map_err(|_| LifecycleError::BatchChannelFull)?;
        respond_rx.await.map_err(|_| LifecycleError::BatchChannelFull)?
    }
}

async fn worker_loop(
    _lane: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<LifecycleOp>>>,
    applier: Arc<dyn BatchApplier>,
    config: BatchConfig,
    shutdown: ShutdownToken,
) {
    loop {
        if shutdown.is_triggered() {
            break;
        }

        let mut batch = Vec::with_capacity(config.batch_size);
        {
            let mut guard = rx.lock().await;
            let first = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                op = guard.recv() => op,
            };
            let Some(first) = first else {
                break;
            };
            batch.push(first);

            let deadline = tokio::time::Instant::now() + config.batch_timeout;
            while batch.len() < config.batch_size {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, guard.recv()).await {
                    Ok(Some(op)) => batch.push(op),
                    Ok(None) | Err(_) => break,
                }
            }
        }

        if !batch.is_empty() {
            applier.apply_batch(batch).await;
        }
    }

    // Drain whatever is left so in-flight callers get a definitive answer
    // instead of a dropped channel, per spec.md §5's drain-on-shutdown rule.
    let mut guard = rx.lock().await;
    let mut leftover = Vec::new();
    while let Ok(op) = guard.try_recv() {
        leftover.push(op);
    }
    drop(guard);
    for op in leftover {
        op.fail(LifecycleError::BatchChannelFull);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderType, Side, TimeInForce, UserId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingApplier {
        applied: AtomicUsize,
    }

    #[async_trait]
    impl BatchApplier for CountingApplier {
        async fn apply_batch(&self, ops: Vec<LifecycleOp>) {
            for op in ops {
                self.applied.fetch_add(1, Ordering::SeqCst);
                if let LifecycleOp::Create { intent, respond } = op {
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
                        filled_quantity: Default::default(),
                        price: intent.price,
                        stop_price: intent.stop_price,
                        status: crate::models::OrderStatus::New,
                        created_at: chrono::Utc::now(),
                        updated_at: chrono::Utc::now(),
                        expires_at: intent.expires_at,
                        sequence: 1,
                    };
                    let _ = respond.send(Ok(order));
                }
            }
        }
    }

    fn intent() -> OrderIntent {
        OrderIntent {
            client_order_id: "c1".to_string(),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            quantity: rust_decimal::Decimal::from(1),
            price: None,
            stop_price: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn submitted_create_is_applied_and_answered() {
        let applier = Arc::new(CountingApplier {
            applied: AtomicUsize::new(0),
        });
        let shutdown = ShutdownToken::new();
        let processor = BatchProcessor::spawn(BatchConfig::default(), applier.clone(), shutdown.clone());

        let (tx, rx) = oneshot::channel();
        processor
            .tx
            .send(LifecycleOp::Create { intent: intent(), respond: tx })
            .await
            .unwrap();
        let order = rx.await.unwrap().unwrap();
        assert_eq!(order.client_order_id, "c1");
        assert_eq!(applier.applied.load(Ordering::SeqCst), 1);
        shutdown.trigger();
    }
}
