//! Shared types for the matching engine: the scaled-decimal price key,
//! a book-resident order record, and the outcome of a match pass.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{OrderId, OrderStatus, OrderType, Side, TimeInForce};

/// A price represented as a scaled integer so that book ordering never
/// depends on floating-point comparison. The scale (fractional digits)
/// is symbol-configured; `PriceLevel` itself is scale-agnostic and
/// trusts the caller to convert consistently within one book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel(i128);

impl PriceLevel {
    pub fn from_decimal(price: Decimal, scale: u32) -> Self {
        let scaled = (price * Decimal::from(10u64.pow(scale))).round();
        let value = scaled.mantissa() / 10i128.pow(scaled.scale());
        PriceLevel(value)
    }

    pub fn to_decimal(self, scale: u32) -> Decimal {
        Decimal::from_i128_with_scale(self.0, scale)
    }

    pub fn raw(self) -> i128 {
        self.0
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A resting order inside a single price-level FIFO queue. Deliberately
/// slim: the book only needs enough to match and to report back into
/// the order registry, not the full `Order` record.
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Decimal,
    pub stop_price: Option<Decimal>,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub sequence: u64,
}

/// An incoming order as seen by `Orderbook::submit`. Like `RestingOrder`
/// but additionally carries whatever of the order is needed to run the
/// matching algorithm without reaching back into the registry.
#[derive(Debug, Clone)]
pub struct IncomingOrder {
    pub id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub quantity: Decimal,
    pub sequence: u64,
}

/// The residual disposition of an incoming order once `submit` returns:
/// whether it now rests in the book, and at what status.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub rested: bool,
}

/// One aggregated price level in a depth snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Top-of-book / depth read, per symbol. Produced by a non-blocking
/// read of the book's two sides.
#[derive(Debug, Clone, Serialize)]
pub struct OrderbookSnapshot {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub last_trade_price: Option<Decimal>,
    pub sequence: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("no liquidity available to fill order")]
    NoLiquidity,

    #[error("book invariant breach for {symbol}: {detail}")]
    InvariantBreach { symbol: String, detail: String },

    #[error("symbol {0} is quarantined after an invariant breach")]
    Quarantined(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_roundtrips_through_scaled_integer() {
        let price = dec!(150.2500);
        let level = PriceLevel::from_decimal(price, 4);
        assert_eq!(level.to_decimal(4), price);
    }

    #[test]
    fn price_level_orders_numerically() {
        let low = PriceLevel::from_decimal(dec!(100.00), 4);
        let high = PriceLevel::from_decimal(dec!(200.00), 4);
        assert!(low < high);
    }
}
