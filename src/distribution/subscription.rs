//! Subscription index (spec.md §4.4): `channel → set<connection>`,
//! `symbol → set<connection>`, and `(channel, symbol) → set<connection>`
//! kept coherent under one reader-writer lock. `publish` holds the read
//! lock; `subscribe`/`unsubscribe` hold the write lock (spec.md §5
//! "Locking discipline").

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::connection::ConnectionId;

/// Channels a connection may subscribe to. `Orders` and `Balances`-style
/// private channels are filtered by principal at publish time (spec.md
/// §4.4 "Authentication"); `MarketData`/`Trades`/`OrderBook` are public,
/// scoped by symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    MarketData,
    OrderBook,
    Trades,
    Orders,
}

/// Key into the `(channel, symbol)` index. `symbol: None` subscribes to
/// every symbol on that channel (e.g. the private `Orders` channel,
/// which has no symbol dimension for a given user).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SymbolKey(Channel, Option<String>);

#[derive(Default)]
struct Index {
    by_channel: HashMap<Channel, HashSet<ConnectionId>>,
    by_channel_symbol: HashMap<SymbolKey, HashSet<ConnectionId>>,
}

/// `channel → set<connection>` plus the narrower `(channel, symbol)`
/// index used by `publish` to avoid scanning every subscriber of a
/// high-volume channel like `Trades`.
pub struct SubscriptionIndex {
    index: RwLock<Index>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
        }
    }

    pub fn subscribe(&self, connection_id: ConnectionId, channel: Channel, symbol: Option<&str>) {
        let mut index = self.index.write();
        index.by_channel.entry(channel).or_default().insert(connection_id);
        let key = SymbolKey(channel, symbol.map(str::to_string));
        index.by_channel_symbol.entry(key).or_default().insert(connection_id);
    }

    pub fn unsubscribe(&self, connection_id: ConnectionId, channel: Channel, symbol: Option<&str>) {
        let mut index = self.index.write();
        if let Some(set) = index.by_channel.get_mut(&channel) {
            set.remove(&connection_id);
        }
        let key = SymbolKey(channel, symbol.map(str::to_string));
        if let Some(set) = index.by_channel_symbol.get_mut(&key) {
            set.remove(&connection_id);
        }
    }

    /// Remove every subscription a connection holds, on disconnect.
    pub fn remove_connection(&self, connection_id: ConnectionId) {
        let mut index = self.index.write();
        for set in index.by_channel.values_mut() {
            set.remove(&connection_id);
        }
        for set in index.by_channel_symbol.values_mut() {
            set.remove(&connection_id);
        }
    }

    /// Subscribers of `channel` scoped to `symbol`, unioned with
    /// subscribers of `channel` with no symbol filter (they want
    /// everything on the channel).
    pub fn subscribers(&self, channel: Channel, symbol: Option<&str>) -> HashSet<ConnectionId> {
        let index = self.index.read();
        let mut result = HashSet::new();
        if let Some(symbol) = symbol {
            if let Some(set) = index.by_channel_symbol.get(&SymbolKey(channel, Some(symbol.to_string()))) {
                result.extend(set.iter().copied());
            }
        }
        if let Some(set) = index.by_channel_symbol.get(&SymbolKey(channel, None)) {
            result.extend(set.iter().copied());
        }
        result
    }

    pub fn connection_count(&self, channel: Channel) -> usize {
        self.index.read().by_channel.get(&channel).map_or(0, HashSet::len)
    }
}

impl Default for SubscriptionIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_unsubscribe_restores_prior_subscription_set() {
        let index = SubscriptionIndex::new();
        let conn = ConnectionId::new();
        index.subscribe(conn, Channel::Trades, Some("AAPL"));
        assert_eq!(index.subscribers(Channel::Trades, Some("AAPL")).len(), 1);
        index.unsubscribe(conn, Channel::Trades, Some("AAPL"));
        assert!(index.subscribers(Channel::Trades, Some("AAPL")).is_empty());
    }

    #[test]
    fn wildcard_symbol_subscription_receives_every_symbol() {
        let index = SubscriptionIndex::new();
        let conn = ConnectionId::new();
        index.subscribe(conn, Channel::Trades, None);
        assert!(index.subscribers(Channel::Trades, Some("AAPL")).contains(&conn));
        assert!(index.subscribers(Channel::Trades, Some("MSFT")).contains(&conn));
    }

    #[test]
    fn remove_connection_clears_every_subscription() {
        let index = SubscriptionIndex::new();
        let conn = ConnectionId::new();
        index.subscribe(conn, Channel::Trades, Some("AAPL"));
        index.subscribe(conn, Channel::OrderBook, Some("AAPL"));
        index.remove_connection(conn);
        assert!(index.subscribers(Channel::Trades, Some("AAPL")).is_empty());
        assert!(index.subscribers(Channel::OrderBook, Some("AAPL")).is_empty());
    }
}
