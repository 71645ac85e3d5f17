//! The Matching Engine: one `Orderbook` + one `StopBook` per symbol,
//! wired together with the promotion loop that turns triggered stops
//! back into ordinary submissions.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::instrument;

use crate::models::{Order, OrderStatus, OrderType, Side, Trade};

use super::book::Orderbook;
use super::stops::StopBook;
use super::types::{IncomingOrder, MatchOutcome, MatchingError, OrderbookSnapshot, RestingOrder};

/// Per-symbol scaled-decimal configuration (spec.md §4.1 "Numeric semantics").
#[derive(Debug, Clone, Copy)]
pub struct SymbolScale {
    pub price_scale: u32,
    pub quantity_scale: u32,
}

impl Default for SymbolScale {
    fn default() -> Self {
        Self {
            price_scale: 4,
            quantity_scale: 8,
        }
    }
}

struct SymbolBooks {
    orderbook: Orderbook,
    stops: StopBook,
    sequence: crate::models::SequenceGenerator,
    scale: SymbolScale,
}

/// Owns every per-symbol book. Auto-creates a book on first submit for
/// an unknown symbol, per spec.md §4.1 ("Fails with `UnknownSymbol`
/// never").
pub struct MatchingEngine {
    symbols: DashMap<String, Arc<SymbolBooks>>,
    default_scale: SymbolScale,
    trade_tx: broadcast::Sender<Trade>,
    book_update_tx: broadcast::Sender<OrderbookSnapshot>,
}

#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub symbol_count: usize,
    pub total_resting_orders: usize,
    pub total_pending_stops: usize,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::with_scale(SymbolScale::default())
    }

    pub fn with_scale(default_scale: SymbolScale) -> Self {
        let (trade_tx, _) = broadcast::channel(4096);
        let (book_update_tx, _) = broadcast::channel(1024);
        Self {
            symbols: DashMap::new(),
            default_scale,
            trade_tx,
            book_update_tx,
        }
    }

    /// Pre-create books for a known set of tradable symbols. Symbols
    /// not in this list are still auto-created on first submit.
    pub fn with_symbols(symbols: impl IntoIterator<Item = String>) -> Self {
        Self::with_scale_and_symbols(SymbolScale::default(), symbols)
    }

    /// As [`Self::with_symbols`] but with an explicit default scale for
    /// symbols auto-created later.
    pub fn with_scale_and_symbols(default_scale: SymbolScale, symbols: impl IntoIterator<Item = String>) -> Self {
        let engine = Self::with_scale(default_scale);
        for symbol in symbols {
            engine.get_or_create(&symbol);
        }
        engine
    }

    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.trade_tx.subscribe()
    }

    pub fn subscribe_book_updates(&self) -> broadcast::Receiver<OrderbookSnapshot> {
        self.book_update_tx.subscribe()
    }

    fn get_or_create(&self, symbol: &str) -> Arc<SymbolBooks> {
        if let Some(existing) = self.symbols.get(symbol) {
            return existing.clone();
        }
        let scale = self.default_scale;
        let entry = Arc::new(SymbolBooks {
            orderbook: Orderbook::new(symbol, scale.price_scale),
            stops: StopBook::new(scale.price_scale),
            sequence: crate::models::SequenceGenerator::new(),
            scale,
        });
        self.symbols.insert(symbol.to_string(), entry.clone());
        entry
    }

    pub fn stats(&self) -> EngineStats {
        let mut stats = EngineStats {
            symbol_count: self.symbols.len(),
            ..Default::default()
        };
        for entry in self.symbols.iter() {
            stats.total_resting_orders += entry.orderbook.order_count();
            stats.total_pending_stops += entry.stops.len();
        }
        stats
    }

    /// Submit an order. Returns the trades produced (across the
    /// original submission and any cascading stop promotions) plus the
    /// final residual status for the *originally submitted* order.
    #[instrument(skip(self, order), fields(order_id = %order.id, symbol = %order.symbol))]
    pub fn submit_order(&self, order: &Order) -> Result<(MatchOutcome, Vec<Trade>), MatchingError> {
        let books = self.get_or_create(&order.symbol);

        if order.order_type.is_stop() {
            let stop_price = order
                .stop_price
                .ok_or_else(|| MatchingError::InvalidOrder("stop order missing stop_price".into()))?;
            let resting = RestingOrder {
                id: order.id,
                side: order.side,
                order_type: order.order_type,
                time_in_force: order.time_in_force,
                price: order.price.unwrap_or(Decimal::ZERO),
                stop_price: Some(stop_price),
                original_quantity: order.quantity,
                remaining_quantity: order.quantity,
                sequence: order.sequence,
            };
            books.stops.insert(resting);
            return Ok((
                MatchOutcome {
                    status: OrderStatus::Pending,
                    filled_quantity: Decimal::ZERO,
                    rested: false,
                },
                Vec::new(),
            ));
        }

        let incoming = IncomingOrder {
            id: order.id,
            side: order.side,
            order_type: order.order_type,
            time_in_force: order.time_in_force,
            price: order.price,
            stop_price: order.stop_price,
            quantity: order.quantity,
            sequence: order.sequence,
        };

        let result = books.orderbook.submit(incoming, || books.sequence.next())?;
        let outcome = Self::resolve_status(order.order_type, order.time_in_force, result.filled_quantity, result.rested);

        let mut all_trades = result.trades;
        if let Some(last_trade) = all_trades.last().map(|t| t.price) {
            self.promote_triggered_stops(&order.symbol, &books, last_trade, &mut all_trades)?;
        }

        for trade in &all_trades {
            let _ = self.trade_tx.send(trade.clone());
        }
        let sequence = books.sequence.current();
        let _ = self.book_update_tx.send(books.orderbook.snapshot(20, sequence));

        Ok((outcome, all_trades))
    }

    /// Cascade: after a trade prints, any stop orders triggered by the
    /// new last-trade price are promoted to LIMIT/MARKET and resubmitted
    /// in submission-sequence order; each promotion may itself trigger a
    /// trade that triggers further stops.
    fn promote_triggered_stops(
        &self,
        symbol: &str,
        books: &SymbolBooks,
        mut last_trade_price: Decimal,
        trades: &mut Vec<Trade>,
    ) -> Result<(), MatchingError> {
        loop {
            let triggered = books.stops.take_triggered(last_trade_price);
            if triggered.is_empty() {
                return Ok(());
            }
            for stop in triggered {
                let promoted_type = match stop.order_type {
                    OrderType::StopLimit => OrderType::Limit,
                    OrderType::StopMarket => OrderType::Market,
                    other => other,
                };
                let incoming = IncomingOrder {
                    id: stop.id,
                    side: stop.side,
                    order_type: promoted_type,
                    time_in_force: stop.time_in_force,
                    price: if promoted_type == OrderType::Limit {
                        Some(stop.price)
                    } else {
                        None
                    },
                    stop_price: None,
                    quantity: stop.remaining_quantity,
                    sequence: stop.sequence,
                };
                tracing::info!(order_id = %stop.id, symbol, "stop order triggered, promoting");
                let result = books.orderbook.submit(incoming, || books.sequence.next())?;
                if let Some(price) = result.trades.last().map(|t| t.price) {
                    last_trade_price = price;
                }
                trades.extend(result.trades);
            }
        }
    }

    fn resolve_status(
        order_type: OrderType,
        time_in_force: crate::models::TimeInForce,
        filled_quantity: Decimal,
        rested: bool,
    ) -> MatchOutcome {
        use crate::models::TimeInForce as Tif;

        let status = match (rested, filled_quantity > Decimal::ZERO) {
            (true, false) => OrderStatus::Pending,
            (true, true) => OrderStatus::PartiallyFilled,
            (false, true) => OrderStatus::Filled,
            (false, false) => match (order_type, time_in_force) {
                (OrderType::Market, _) | (_, Tif::Fok) => OrderStatus::Rejected,
                _ => OrderStatus::Cancelled,
            },
        };
        MatchOutcome {
            status,
            filled_quantity,
            rested,
        }
    }

    pub fn cancel_order(&self, symbol: &str, order_id: crate::models::OrderId) -> bool {
        let Some(books) = self.symbols.get(symbol) else {
            return false;
        };
        if books.stops.has_order(order_id) {
            return books.stops.cancel(order_id);
        }
        books.orderbook.cancel(order_id)
    }

    pub fn get_orderbook(&self, symbol: &str, depth: usize) -> Option<OrderbookSnapshot> {
        let books = self.symbols.get(symbol)?;
        let sequence = books.sequence.current();
        Some(books.orderbook.snapshot(depth, sequence))
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountId, OrderId, TimeInForce, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn order(
        side: Side,
        order_type: OrderType,
        tif: TimeInForce,
        price: Option<Decimal>,
        stop_price: Option<Decimal>,
        qty: Decimal,
        sequence: u64,
    ) -> Order {
        Order {
            id: OrderId::new(),
            client_order_id: format!("c-{sequence}"),
            user_id: UserId::from("u1"),
            account_id: AccountId::from("a1"),
            symbol: "AAPL".to_string(),
            side,
            order_type,
            time_in_force: tif,
            quantity: qty,
            filled_quantity: Decimal::ZERO,
            price,
            stop_price,
            status: OrderStatus::New,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
            sequence,
        }
    }

    #[test]
    fn market_order_against_empty_book_is_rejected() {
        let engine = MatchingEngine::new();
        let o = order(Side::Buy, OrderType::Market, TimeInForce::Ioc, None, None, dec!(10), 1);
        let (outcome, trades) = engine.submit_order(&o).unwrap();
        assert_eq!(outcome.status, OrderStatus::Rejected);
        assert!(trades.is_empty());
    }

    #[test]
    fn resting_limit_order_with_no_fill_is_pending() {
        let engine = MatchingEngine::new();
        let o = order(Side::Buy, OrderType::Limit, TimeInForce::Gtc, Some(dec!(100.00)), None, dec!(10), 1);
        let (outcome, _) = engine.submit_order(&o).unwrap();
        assert_eq!(outcome.status, OrderStatus::Pending);
        assert!(outcome.rested);
    }

    #[test]
    fn stop_market_order_promotes_on_trigger() {
        let engine = MatchingEngine::new();

        let resting_sell = order(Side::Sell, OrderType::Limit, TimeInForce::Gtc, Some(dec!(100.00)), None, dec!(50), 1);
        engine.submit_order(&resting_sell).unwrap();

        let stop = order(Side::Buy, OrderType::StopMarket, TimeInForce::Gtc, None, Some(dec!(100.00)), dec!(10), 2);
        let (stop_outcome, _) = engine.submit_order(&stop).unwrap();
        assert_eq!(stop_outcome.status, OrderStatus::Pending);

        // Trade at 100.00 trips the buy stop's trigger (last-trade >= stop_price).
        let taker = order(Side::Buy, OrderType::Limit, TimeInForce::Ioc, Some(dec!(100.00)), None, dec!(20), 3);
        let (_, trades) = engine.submit_order(&taker).unwrap();

        // the taker's own fill plus the promoted stop's fill against the remaining resting sell
        assert_eq!(trades.len(), 2);
        assert!(!engine.cancel_order("AAPL", stop.id));
    }
}
