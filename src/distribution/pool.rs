//! Connection pool (spec.md §3 "Ownership summary", §4.4): the
//! exclusive owner of [`Connection`] records. Publishing enumerates
//! the subscription index under its read lock, serializes the payload
//! once per codec, and enqueues to each matching connection without
//! ever awaiting a slow one (spec.md §4.4 "Backpressure").

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::Principal;
use crate::shutdown::ShutdownToken;

use super::codec::Codec;
use super::connection::{Connection, ConnectionId};
use super::envelope::{Envelope, MessageType};
use super::subscription::{Channel, SubscriptionIndex};
use super::BusError;

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub send_buffer: usize,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub max_message_bytes: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            send_buffer: 256,
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            max_message_bytes: 1_048_576,
        }
    }
}

/// Aggregate counters behind the `GET /internal/bus/stats` snapshot
/// (spec.md §4.4 "Instrumentation"; SPEC_FULL.md §B.3).
#[derive(Debug, Default)]
pub struct BusStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    slow_consumers_disconnected: AtomicU64,
    last_reset_unix: AtomicI64,
}

impl BusStats {
    fn new() -> Self {
        Self {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            slow_consumers_disconnected: AtomicU64::new(0),
            last_reset_unix: AtomicI64::new(Utc::now().timestamp()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BusStatsSnapshot {
    pub connections_total: usize,
    pub connections_by_channel: HashMap<Channel, usize>,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub slow_consumers_disconnected: u64,
    pub last_reset_unix: i64,
}

/// Optional role filter accompanying a publish: the connection's
/// principal must have at least one of the listed roles to receive
/// the payload (spec.md §4.4 "Authentication").
pub struct RoleFilter<'a>(pub &'a [&'a str]);

impl RoleFilter<'_> {
    fn admits(&self, principal: &Principal) -> bool {
        self.0.is_empty() || self.0.iter().any(|role| principal.has_role(role))
    }
}

pub struct ConnectionPool {
    connections: DashMap<ConnectionId, Connection>,
    codecs: DashMap<ConnectionId, Codec>,
    subscriptions: SubscriptionIndex,
    stats: BusStats,
    config: BusConfig,
}

impl ConnectionPool {
    pub fn new(config: BusConfig) -> Arc<Self> {
        Arc::new(Self {
            connections: DashMap::new(),
            codecs: DashMap::new(),
            subscriptions: SubscriptionIndex::new(),
            stats: BusStats::new(),
            config,
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn register(&self, connection: Connection, codec: Codec) -> ConnectionId {
        let id = connection.id;
        self.codecs.insert(id, codec);
        self.connections.insert(id, connection);
        id
    }

    pub fn remove(&self, id: ConnectionId) {
        self.subscriptions.remove_connection(id);
        self.codecs.remove(&id);
        if let Some((_, connection)) = self.connections.remove(&id) {
            connection.close();
        }
    }

    pub fn subscribe(&self, id: ConnectionId, channel: Channel, symbol: Option<&str>) {
        self.subscriptions.subscribe(id, channel, symbol);
    }

    pub fn unsubscribe(&self, id: ConnectionId, channel: Channel, symbol: Option<&str>) {
        self.subscriptions.unsubscribe(id, channel, symbol);
    }

    pub fn record_received(&self, id: ConnectionId) {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
        if let Some(connection) = self.connections.get(&id) {
            connection.stats.record_received();
        }
    }

    pub fn touch_pong(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.get(&id) {
            connection.stats.touch_pong();
        }
    }

    /// Sends `envelope` directly to one connection, bypassing the
    /// subscription index — used for `subscribed`/`unsubscribed`/`pong`
    /// replies and per-connection errors.
    pub fn send_to(&self, id: ConnectionId, envelope: &Envelope) -> Result<(), BusError> {
        let codec = self.codecs.get(&id).map(|c| *c).ok_or(BusError::ConnectionNotFound(id))?;
        let connection = self.connections.get(&id).ok_or(BusError::ConnectionNotFound(id))?;
        let message = codec.encode(envelope)?;
        if connection.try_send(message).is_err() {
            drop(connection);
            self.disconnect_slow(id);
            return Err(BusError::SendQueueFull);
        }
        connection.stats.record_sent();
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Fans `envelope` out to every subscriber of `(channel, symbol)`,
    /// optionally narrowed by `filter`. Serializes once per codec in
    /// use, never blocks on a single slow connection (spec.md §4.4).
    pub fn publish(&self, channel: Channel, symbol: Option<&str>, envelope: &Envelope, filter: Option<&RoleFilter>) {
        let subscribers = self.subscriptions.subscribers(channel, symbol);
        if subscribers.is_empty() {
            return;
        }

        let mut json_frame: Option<axum::extract::ws::Message> = None;
        let mut binary_frame: Option<axum::extract::ws::Message> = None;
        let mut slow = Vec::new();

        for id in subscribers {
            let Some(connection) = self.connections.get(&id) else { continue };
            if let Some(filter) = filter {
                if !filter.admits(&connection.principal) {
                    continue;
                }
            }
            let Some(codec) = self.codecs.get(&id).map(|c| *c) else { continue };

            let cached = match codec {
                Codec::Json => &mut json_frame,
                Codec::Binary => &mut binary_frame,
            };
            if cached.is_none() {
                match codec.encode(envelope) {
                    Ok(message) => *cached = Some(message),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to encode publish payload");
                        continue;
                    }
                }
            }
            let message = cached.clone().expect("just populated above");

            if connection.try_send(message).is_err() {
                slow.push(id);
                continue;
            }
            connection.stats.record_sent();
            self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        }

        for id in slow {
            self.disconnect_slow(id);
        }
    }

    fn disconnect_slow(&self, id: ConnectionId) {
        tracing::warn!(connection_id = %id, "disconnecting slow consumer");
        self.stats.slow_consumers_disconnected.fetch_add(1, Ordering::Relaxed);
        self.remove(id);
    }

    /// Connections whose last pong is older than `pong_timeout` — the
    /// heartbeat lane closes these (spec.md §4.4 "Heartbeats").
    pub fn stale_connections(&self) -> Vec<ConnectionId> {
        let timeout_secs = self.config.pong_timeout.as_secs() as i64;
        self.connections
            .iter()
            .filter(|entry| entry.stats.seconds_since_pong() > timeout_secs)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Test-only: backdate a connection's last-pong clock so staleness
    /// can be exercised without sleeping past `pong_timeout`.
    #[cfg(test)]
    pub fn age_pong_for_test(&self, id: ConnectionId, seconds_ago: i64) {
        if let Some(connection) = self.connections.get(&id) {
            connection
                .stats
                .last_pong_unix
                .store(Utc::now().timestamp() - seconds_ago, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> BusStatsSnapshot {
        let mut connections_by_channel = HashMap::new();
        for channel in [Channel::MarketData, Channel::OrderBook, Channel::Trades, Channel::Orders] {
            connections_by_channel.insert(channel, self.subscriptions.connection_count(channel));
        }
        BusStatsSnapshot {
            connections_total: self.connections.len(),
            connections_by_channel,
            messages_sent: self.stats.messages_sent.load(Ordering::Relaxed),
            messages_received: self.stats.messages_received.load(Ordering::Relaxed),
            slow_consumers_disconnected: self.stats.slow_consumers_disconnected.load(Ordering::Relaxed),
            last_reset_unix: self.stats.last_reset_unix.load(Ordering::Relaxed),
        }
    }

    /// Background heartbeat lane: pings every connection on an
    /// interval and evicts anyone stale (spec.md §4.4 "Heartbeats").
    pub fn spawn_heartbeat_lane(self: &Arc<Self>, shutdown: ShutdownToken) {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(pool.config.ping_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let now = Utc::now().timestamp();
                        for id in pool.stale_connections() {
                            pool.disconnect_slow(id);
                        }
                        let heartbeat = Envelope::new(MessageType::Heartbeat, now).with_data(
                            super::envelope::Payload::Heartbeat(super::envelope::HeartbeatPayload { server_time: now }),
                        );
                        for id in pool.connection_ids() {
                            let _ = pool.send_to(id, &heartbeat);
                        }
                    }
                }
            }
        });
    }
}
