//! Expiration timers, coalesced into a single per-lane min-heap
//! (spec.md §4.2.4). On fire, an eligible order transitions to
//! `EXPIRED`; anything already terminal is a no-op.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::models::OrderId;
use crate::shutdown::ShutdownToken;

#[derive(Debug, PartialEq, Eq)]
struct Timer {
    at: DateTime<Utc>,
    order_id: OrderId,
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at)
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Callback invoked when a timer fires; owned by whoever schedules the
/// timer (the lifecycle manager), which decides whether the order is
/// still eligible for expiry.
#[async_trait::async_trait]
pub trait ExpiryHandler: Send + Sync {
    async fn on_expire(&self, order_id: OrderId);
}

pub struct ExpiryScheduler {
    heap: Mutex<BinaryHeap<Reverse<Timer>>>,
    notify: Notify,
}

impl ExpiryScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
        })
    }

    pub fn schedule(&self, order_id: OrderId, at: DateTime<Utc>) {
        self.heap.lock().push(Reverse(Timer { at, order_id }));
        self.notify.notify_one();
    }

    pub fn spawn_lane(self: &Arc<Self>, handler: Arc<dyn ExpiryHandler>, shutdown: ShutdownToken) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                let next_due = scheduler.heap.lock().peek().map(|Reverse(t)| t.at);

                let sleep_fut = match next_due {
                    Some(at) => {
                        let now = Utc::now();
                        let delay = (at - now).to_std().unwrap_or(std::time::Duration::ZERO);
                        tokio::time::sleep(delay)
                    }
                    None => tokio::time::sleep(std::time::Duration::from_secs(3600)),
                };

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = scheduler.notify.notified() => continue,
                    _ = sleep_fut => {
                        let due = {
                            let mut heap = scheduler.heap.lock();
                            match heap.peek() {
                                Some(Reverse(t)) if t.at <= Utc::now() => heap.pop().map(|Reverse(t)| t.order_id),
                                _ => None,
                            }
                        };
                        if let Some(order_id) = due {
                            handler.on_expire(order_id).await;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingHandler {
        fired: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ExpiryHandler for CountingHandler {
        async fn on_expire(&self, _order_id: OrderId) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn timer_fires_after_its_deadline() {
        let scheduler = ExpiryScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let shutdown = ShutdownToken::new();
        scheduler.spawn_lane(Arc::new(CountingHandler { fired: fired.clone() }), shutdown.clone());

        scheduler.schedule(OrderId::new(), Utc::now() + chrono::Duration::milliseconds(50));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        shutdown.trigger();
    }
}
