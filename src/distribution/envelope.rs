//! The wire envelope (spec.md §4.4 "Wire framing"): the same logical
//! fields — `type`, `channel`, `symbol`, `data`, `timestamp` — carried
//! by both the JSON text codec and the length-prefixed binary codec.
//!
//! Canonical wire casing (SPEC_FULL.md §C): `lowerCamelCase` for the
//! envelope `type` field, matching the teacher's `#[serde(rename_all =
//! ...)]` idiom used on `Order`/`Trade`'s own `SCREAMING_SNAKE_CASE`
//! status fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderId, Side, Trade};

use super::subscription::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Subscribe,
    Unsubscribe,
    Ping,
    Pong,
    Heartbeat,
    Subscribed,
    Unsubscribed,
    Error,
    MarketData,
    Order,
    Trade,
    OrderBook,
}

/// Inbound control messages a client may send (spec.md §6.1).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe {
        channel: Channel,
        #[serde(default)]
        symbol: Option<String>,
    },
    Unsubscribe {
        channel: Channel,
        #[serde(default)]
        symbol: Option<String>,
    },
    Ping {
        timestamp: i64,
    },
    /// Only honored if the connection was not already authenticated on
    /// upgrade (spec.md §6.1).
    Auth {
        token: String,
    },
}

/// One price/size row in an aggregated depth payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataPayload {
    pub symbol: String,
    pub last_price: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookPayload {
    pub symbol: String,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub sequence: u64,
}

impl From<&crate::matching::OrderbookSnapshot> for OrderBookPayload {
    fn from(snapshot: &crate::matching::OrderbookSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            bids: snapshot.bids.iter().map(|l| DepthLevel { price: l.price, quantity: l.quantity }).collect(),
            asks: snapshot.asks.iter().map(|l| DepthLevel { price: l.price, quantity: l.quantity }).collect(),
            sequence: snapshot.sequence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPayload {
    pub order_id: OrderId,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub status: String,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
}

impl From<&Order> for OrderPayload {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            client_order_id: order.client_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            status: order.status.to_string(),
            filled_quantity: order.filled_quantity,
            remaining_quantity: order.remaining_quantity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePayload {
    pub trade_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker_side: Side,
}

impl From<&Trade> for TradePayload {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id.to_string(),
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            taker_side: trade.taker_side,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    pub channel: Channel,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Tagged union of every server-push payload shape. Externally tagged
/// by variant name (bincode-friendly: no self-describing format is
/// required to round-trip it, unlike `#[serde(untagged)]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    MarketData(MarketDataPayload),
    OrderBook(OrderBookPayload),
    Order(OrderPayload),
    Trade(TradePayload),
    Subscription(SubscriptionPayload),
    Heartbeat(HeartbeatPayload),
    Error(ErrorPayload),
}

/// The outbound envelope every server-to-client frame is wrapped in,
/// regardless of codec (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    pub timestamp: i64,
}

impl Envelope {
    pub fn new(message_type: MessageType, timestamp: i64) -> Self {
        Self {
            message_type,
            channel: None,
            symbol: None,
            data: None,
            timestamp,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, timestamp: i64) -> Self {
        Self::new(MessageType::Error, timestamp).with_data(Payload::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        }))
    }
}
