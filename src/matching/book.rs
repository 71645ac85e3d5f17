//! Per-symbol limit order book: price/time-priority matching over two
//! sides, each an ordered map of price level to FIFO queue of resting
//! orders, plus an auxiliary index for O(log n) cancellation.
//!
//! Mirrors the locking shape the teacher uses for its orderbook: each
//! side behind its own `RwLock`, with a `DashMap` auxiliary index kept
//! coherent under the side locks.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::RwLock;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::warn;

use crate::models::{OrderId, OrderType, Side, TimeInForce, Trade};

use super::types::{BookLevel, IncomingOrder, MatchingError, OrderbookSnapshot, PriceLevel, RestingOrder};

/// One independent limit order book. Exclusively owned by the Matching
/// Engine; it accepts and returns orders by value.
pub struct Orderbook {
    symbol: String,
    price_scale: u32,
    bids: RwLock<BTreeMap<PriceLevel, VecDeque<RestingOrder>>>,
    asks: RwLock<BTreeMap<PriceLevel, VecDeque<RestingOrder>>>,
    order_index: DashMap<OrderId, (Side, PriceLevel)>,
    last_trade_price: RwLock<Option<Decimal>>,
    quarantined: AtomicBool,
}

/// Outcome of feeding one incoming order through the book.
pub struct SubmitResult {
    pub trades: Vec<Trade>,
    pub filled_quantity: Decimal,
    pub rested: bool,
}

impl Orderbook {
    pub fn new(symbol: impl Into<String>, price_scale: u32) -> Self {
        Self {
            symbol: symbol.into(),
            price_scale,
            bids: RwLock::new(BTreeMap::new()),
            asks: RwLock::new(BTreeMap::new()),
            order_index: DashMap::new(),
            last_trade_price: RwLock::new(None),
            quarantined: AtomicBool::new(false),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantined.load(AtomicOrdering::Acquire)
    }

    fn quarantine(&self, detail: &str) {
        warn!(symbol = %self.symbol, detail, "orderbook invariant breach, quarantining symbol");
        self.quarantined.store(true, AtomicOrdering::Release);
    }

    pub fn last_trade_price(&self) -> Option<Decimal> {
        *self.last_trade_price.read().unwrap()
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids
            .read()
            .unwrap()
            .keys()
            .next_back()
            .map(|p| p.to_decimal(self.price_scale))
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks
            .read()
            .unwrap()
            .keys()
            .next()
            .map(|p| p.to_decimal(self.price_scale))
    }

    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    pub fn has_order(&self, id: OrderId) -> bool {
        self.order_index.contains_key(&id)
    }

    /// Available resting quantity at prices that would satisfy a BUY at
    /// `limit_price` (ask side, ascending) or a SELL at `limit_price`
    /// (bid side, descending), used by the FOK liquidity pre-check.
    fn available_liquidity(&self, side: Side, limit_price: Option<Decimal>) -> Decimal {
        let mut total = Decimal::ZERO;
        match side {
            Side::Buy => {
                let asks = self.asks.read().unwrap();
                for (level, queue) in asks.iter() {
                    if let Some(limit) = limit_price {
                        if level.to_decimal(self.price_scale) > limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|o| o.remaining_quantity).sum::<Decimal>();
                }
            }
            Side::Sell => {
                let bids = self.bids.read().unwrap();
                for (level, queue) in bids.iter().rev() {
                    if let Some(limit) = limit_price {
                        if level.to_decimal(self.price_scale) < limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|o| o.remaining_quantity).sum::<Decimal>();
                }
            }
        }
        total
    }

    /// Feed one incoming order through the book. Caller (the Matching
    /// Engine) supplies the already-assigned `sequence` so trades carry
    /// the engine's monotonic per-symbol ordering.
    pub fn submit(
        &self,
        incoming: IncomingOrder,
        mut next_sequence: impl FnMut() -> u64,
    ) -> Result<SubmitResult, MatchingError> {
        if self.is_quarantined() {
            return Err(MatchingError::Quarantined(self.symbol.clone()));
        }

        if incoming.quantity <= Decimal::ZERO {
            return Err(MatchingError::InvalidOrder("quantity must be positive".into()));
        }

        // FOK pre-check: verify liquidity at eligible prices covers the
        // whole incoming quantity before mutating the book at all.
        if incoming.time_in_force == TimeInForce::Fok {
            let available = self.available_liquidity(incoming.side, incoming.price);
            if available < incoming.quantity {
                return Ok(SubmitResult {
                    trades: Vec::new(),
                    filled_quantity: Decimal::ZERO,
                    rested: false,
                });
            }
        }

        let mut trades = Vec::new();
        let mut residual = incoming.quantity;

        match incoming.side {
            Side::Buy => self.match_against_asks(&incoming, &mut residual, &mut trades, &mut next_sequence),
            Side::Sell => self.match_against_bids(&incoming, &mut residual, &mut trades, &mut next_sequence),
        }

        let filled_quantity = incoming.quantity - residual;

        if let Some(last) = trades.last() {
            *self.last_trade_price.write().unwrap() = Some(last.price);
        }

        let rested = residual > Decimal::ZERO && self.should_rest(&incoming);
        if rested {
            self.rest(&incoming, residual);
        }

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                self.quarantine("best_bid >= best_ask after matching settled");
                return Err(MatchingError::InvariantBreach {
                    symbol: self.symbol.clone(),
                    detail: format!("crossed book: bid {bid} >= ask {ask}"),
                });
            }
        }

        Ok(SubmitResult {
            trades,
            filled_quantity,
            rested,
        })
    }

    fn should_rest(&self, incoming: &IncomingOrder) -> bool {
        matches!(incoming.time_in_force, TimeInForce::Gtc | TimeInForce::Day)
            && matches!(incoming.order_type, OrderType::Limit)
    }

    fn rest(&self, incoming: &IncomingOrder, remaining_quantity: Decimal) {
        let price = incoming.price.expect("resting order must carry a limit price");
        let level = PriceLevel::from_decimal(price, self.price_scale);
        let entry = RestingOrder {
            id: incoming.id,
            side: incoming.side,
            order_type: incoming.order_type,
            time_in_force: incoming.time_in_force,
            price,
            stop_price: incoming.stop_price,
            original_quantity: incoming.quantity,
            remaining_quantity,
            sequence: incoming.sequence,
        };
        let side_map = match incoming.side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        side_map.write().unwrap().entry(level).or_default().push_back(entry);
        self.order_index.insert(incoming.id, (incoming.side, level));
    }

    fn match_against_asks(
        &self,
        incoming: &IncomingOrder,
        residual: &mut Decimal,
        trades: &mut Vec<Trade>,
        next_sequence: &mut impl FnMut() -> u64,
    ) {
        let mut asks = self.asks.write().unwrap();
        let mut drained_levels = Vec::new();

        for (&level, queue) in asks.iter_mut() {
            if *residual <= Decimal::ZERO {
                break;
            }
            let ask_price = level.to_decimal(self.price_scale);
            if incoming.order_type != OrderType::Market {
                let limit = incoming.price.expect("limit order must carry a price");
                if ask_price > limit {
                    break;
                }
            }

            while *residual > Decimal::ZERO {
                let Some(resting) = queue.front_mut() else { break };
                let fill_qty = (*residual).min(resting.remaining_quantity);

                let trade = Trade::new(
                    &self.symbol,
                    ask_price,
                    fill_qty,
                    incoming.id,
                    resting.id,
                    Side::Buy,
                    next_sequence(),
                );
                trades.push(trade);

                *residual -= fill_qty;
                resting.remaining_quantity -= fill_qty;

                if resting.remaining_quantity <= Decimal::ZERO {
                    let filled = queue.pop_front().expect("front just matched");
                    self.order_index.remove(&filled.id);
                }
            }

            if queue.is_empty() {
                drained_levels.push(level);
            }
        }

        for level in drained_levels {
            asks.remove(&level);
        }
    }

    fn match_against_bids(
        &self,
        incoming: &IncomingOrder,
        residual: &mut Decimal,
        trades: &mut Vec<Trade>,
        next_sequence: &mut impl FnMut() -> u64,
    ) {
        let mut bids = self.bids.write().unwrap();
        let mut drained_levels = Vec::new();

        for (&level, queue) in bids.iter_mut().rev() {
            if *residual <= Decimal::ZERO {
                break;
            }
            let bid_price = level.to_decimal(self.price_scale);
            if incoming.order_type != OrderType::Market {
                let limit = incoming.price.expect("limit order must carry a price");
                if bid_price < limit {
                    break;
                }
            }

            while *residual > Decimal::ZERO {
                let Some(resting) = queue.front_mut() else { break };
                let fill_qty = (*residual).min(resting.remaining_quantity);

                let trade = Trade::new(
                    &self.symbol,
                    bid_price,
                    fill_qty,
                    resting.id,
                    incoming.id,
                    Side::Sell,
                    next_sequence(),
                );
                trades.push(trade);

                *residual -= fill_qty;
                resting.remaining_quantity -= fill_qty;

                if resting.remaining_quantity <= Decimal::ZERO {
                    let filled = queue.pop_front().expect("front just matched");
                    self.order_index.remove(&filled.id);
                }
            }

            if queue.is_empty() {
                drained_levels.push(level);
            }
        }

        for level in drained_levels {
            bids.remove(&level);
        }
    }

    /// Remove a resting order. Returns `true` if it was found and
    /// removed, `false` if unknown or already matched away.
    pub fn cancel(&self, order_id: OrderId) -> bool {
        let Some((_, (side, level))) = self.order_index.remove(&order_id) else {
            return false;
        };
        let side_map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let mut guard = side_map.write().unwrap();
        let Some(queue) = guard.get_mut(&level) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|o| o.id != order_id);
        let removed = queue.len() != before;
        if queue.is_empty() {
            guard.remove(&level);
        }
        removed
    }

    pub fn get_resting(&self, order_id: OrderId) -> Option<RestingOrder> {
        let (side, level) = *self.order_index.get(&order_id)?;
        let side_map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        side_map
            .read()
            .unwrap()
            .get(&level)?
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    pub fn snapshot(&self, depth: usize, sequence: u64) -> OrderbookSnapshot {
        let bids = self.bids.read().unwrap();
        let asks = self.asks.read().unwrap();

        let bid_levels = bids
            .iter()
            .rev()
            .take(depth)
            .map(|(level, queue)| BookLevel {
                price: level.to_decimal(self.price_scale),
                quantity: queue.iter().map(|o| o.remaining_quantity).sum(),
            })
            .collect();

        let ask_levels = asks
            .iter()
            .take(depth)
            .map(|(level, queue)| BookLevel {
                price: level.to_decimal(self.price_scale),
                quantity: queue.iter().map(|o| o.remaining_quantity).sum(),
            })
            .collect();

        OrderbookSnapshot {
            symbol: self.symbol.clone(),
            bids: bid_levels,
            asks: ask_levels,
            last_trade_price: self.last_trade_price(),
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn seq_counter() -> impl FnMut() -> u64 {
        let counter = AtomicU64::new(1);
        move || counter.fetch_add(1, Ordering::Relaxed)
    }

    fn limit(id: OrderId, side: Side, price: Decimal, qty: Decimal, sequence: u64) -> IncomingOrder {
        IncomingOrder {
            id,
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(price),
            stop_price: None,
            quantity: qty,
            sequence,
        }
    }

    #[test]
    fn simple_cross_produces_one_trade_and_empties_book() {
        let book = Orderbook::new("AAPL", 4);
        let sell_id = OrderId::new();
        let buy_id = OrderId::new();

        let r1 = book
            .submit(limit(sell_id, Side::Sell, dec!(150.00), dec!(100), 1), seq_counter())
            .unwrap();
        assert!(r1.trades.is_empty());
        assert!(r1.rested);

        let r2 = book
            .submit(limit(buy_id, Side::Buy, dec!(150.00), dec!(100), 2), seq_counter())
            .unwrap();
        assert_eq!(r2.trades.len(), 1);
        assert_eq!(r2.trades[0].price, dec!(150.00));
        assert_eq!(r2.trades[0].quantity, dec!(100));
        assert!(!r2.rested);
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn price_time_priority_fills_earliest_level_first() {
        let book = Orderbook::new("AAPL", 4);
        let first = OrderId::new();
        let second = OrderId::new();
        let taker = OrderId::new();

        book.submit(limit(first, Side::Sell, dec!(150.00), dec!(50), 1), seq_counter())
            .unwrap();
        book.submit(limit(second, Side::Sell, dec!(150.00), dec!(50), 2), seq_counter())
            .unwrap();

        let market = IncomingOrder {
            id: taker,
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            price: None,
            stop_price: None,
            quantity: dec!(75),
            sequence: 3,
        };
        let result = book.submit(market, seq_counter()).unwrap();
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].maker_order_id(), first);
        assert_eq!(result.trades[0].quantity, dec!(50));
        assert_eq!(result.trades[1].maker_order_id(), second);
        assert_eq!(result.trades[1].quantity, dec!(25));

        let remaining = book.get_resting(second).unwrap();
        assert_eq!(remaining.remaining_quantity, dec!(25));
    }

    #[test]
    fn fok_rejects_without_trades_when_liquidity_insufficient() {
        let book = Orderbook::new("AAPL", 4);
        book.submit(limit(OrderId::new(), Side::Sell, dec!(150.00), dec!(40), 1), seq_counter())
            .unwrap();
        book.submit(limit(OrderId::new(), Side::Sell, dec!(151.00), dec!(30), 2), seq_counter())
            .unwrap();

        let fok = IncomingOrder {
            id: OrderId::new(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Fok,
            price: Some(dec!(151.00)),
            stop_price: None,
            quantity: dec!(100),
            sequence: 3,
        };
        let result = book.submit(fok, seq_counter()).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.filled_quantity, Decimal::ZERO);
        assert_eq!(book.order_count(), 2);
    }

    #[test]
    fn cancel_removes_resting_order() {
        let book = Orderbook::new("AAPL", 4);
        let id = OrderId::new();
        book.submit(limit(id, Side::Buy, dec!(100.00), dec!(10), 1), seq_counter())
            .unwrap();
        assert!(book.cancel(id));
        assert!(!book.cancel(id));
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn snapshot_aggregates_quantity_per_level() {
        let book = Orderbook::new("AAPL", 4);
        book.submit(limit(OrderId::new(), Side::Buy, dec!(100.00), dec!(10), 1), seq_counter())
            .unwrap();
        book.submit(limit(OrderId::new(), Side::Buy, dec!(100.00), dec!(5), 2), seq_counter())
            .unwrap();
        let snap = book.snapshot(10, 1);
        assert_eq!(snap.bids.len(), 1);
        assert_eq!(snap.bids[0].quantity, dec!(15));
    }
}
