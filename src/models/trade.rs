use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{OrderId, TradeId};
use super::order::Side;

/// A single execution print. Immutable once created: trades are never
/// amended, only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub taker_side: Side,
    pub executed_at: DateTime<Utc>,
    pub sequence: u64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        taker_side: Side,
        sequence: u64,
    ) -> Self {
        Self {
            id: TradeId::new(),
            symbol: symbol.into(),
            price,
            quantity,
            buy_order_id,
            sell_order_id,
            taker_side,
            executed_at: Utc::now(),
            sequence,
        }
    }

    /// The order on the opposite side of `taker_side` — the maker for this print.
    pub fn maker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.sell_order_id,
            Side::Sell => self.buy_order_id,
        }
    }

    pub fn taker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.buy_order_id,
            Side::Sell => self.sell_order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn maker_and_taker_are_distinct_for_a_buy_taker() {
        let buy = OrderId::new();
        let sell = OrderId::new();
        let trade = Trade::new("AAPL", dec!(150.00), dec!(100), buy, sell, Side::Buy, 1);
        assert_eq!(trade.taker_order_id(), buy);
        assert_eq!(trade.maker_order_id(), sell);
    }
}
