//! Trigger set for STOP_LIMIT / STOP_MARKET orders. Held outside the
//! book entirely until the instrument's last-trade price touches the
//! stop price (SPEC_FULL.md §C resolves the trigger reference as
//! last-trade, not mid or bid/ask), at which point the order is
//! promoted into an ordinary LIMIT/MARKET submission.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::models::{OrderId, Side};

use super::types::{PriceLevel, RestingOrder};

pub struct StopBook {
    price_scale: u32,
    // Buy stops trigger when the last trade price rises to meet or
    // exceed the stop price: keyed ascending, triggered set is the
    // prefix `stop_price <= last_trade`.
    buy_stops: RwLock<BTreeMap<PriceLevel, VecDeque<RestingOrder>>>,
    // Sell stops trigger when the last trade price falls to meet or
    // go below the stop price: triggered set is the suffix
    // `stop_price >= last_trade`.
    sell_stops: RwLock<BTreeMap<PriceLevel, VecDeque<RestingOrder>>>,
    index: DashMap<OrderId, (Side, PriceLevel)>,
}

impl StopBook {
    pub fn new(price_scale: u32) -> Self {
        Self {
            price_scale,
            buy_stops: RwLock::new(BTreeMap::new()),
            sell_stops: RwLock::new(BTreeMap::new()),
            index: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn insert(&self, order: RestingOrder) {
        let stop_price = order.stop_price.expect("stop order must carry a stop price");
        let level = PriceLevel::from_decimal(stop_price, self.price_scale);
        let side = order.side;
        let side_map = match side {
            Side::Buy => &self.buy_stops,
            Side::Sell => &self.sell_stops,
        };
        side_map.write().unwrap().entry(level).or_default().push_back(order.clone());
        self.index.insert(order.id, (side, level));
    }

    pub fn cancel(&self, order_id: OrderId) -> bool {
        let Some((_, (side, level))) = self.index.remove(&order_id) else {
            return false;
        };
        let side_map = match side {
            Side::Buy => &self.buy_stops,
            Side::Sell => &self.sell_stops,
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

    pub fn has_order(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Remove and return every stop order triggered by `last_trade_price`,
    /// ordered by submission `sequence` ascending (deterministic
    /// promotion order per spec.md §4.1).
    pub fn take_triggered(&self, last_trade_price: Decimal) -> Vec<RestingOrder> {
        let mut triggered = Vec::new();

        {
            let mut buy = self.buy_stops.write().unwrap();
            let boundary = PriceLevel::from_decimal(
                last_trade_price + smallest_unit(self.price_scale),
                self.price_scale,
            );
            let remaining = buy.split_off(&boundary);
            for (_, queue) in buy.iter() {
                for order in queue {
                    triggered.push(order.clone());
                    self.index.remove(&order.id);
                }
            }
            *buy = remaining;
        }

        {
            let mut sell = self.sell_stops.write().unwrap();
            let triggered_part = sell.split_off(&PriceLevel::from_decimal(last_trade_price, self.price_scale));
            for (_, queue) in triggered_part.iter() {
                for order in queue {
                    triggered.push(order.clone());
                    self.index.remove(&order.id);
                }
            }
        }

        triggered.sort_by_key(|o| o.sequence);
        triggered
    }
}

fn smallest_unit(scale: u32) -> Decimal {
    Decimal::new(1, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, TimeInForce};
    use rust_decimal_macros::dec;

    fn stop_order(side: Side, stop_price: Decimal, sequence: u64) -> RestingOrder {
        RestingOrder {
            id: OrderId::new(),
            side,
            order_type: OrderType::StopMarket,
            time_in_force: TimeInForce::Gtc,
            price: stop_price,
            stop_price: Some(stop_price),
            original_quantity: dec!(10),
            remaining_quantity: dec!(10),
            sequence,
        }
    }

    #[test]
    fn buy_stop_triggers_when_last_trade_reaches_stop_price() {
        let stops = StopBook::new(4);
        stops.insert(stop_order(Side::Buy, dec!(100.00), 1));
        assert!(stops.take_triggered(dec!(99.00)).is_empty());
        let triggered = stops.take_triggered(dec!(100.00));
        assert_eq!(triggered.len(), 1);
        assert_eq!(stops.len(), 0);
    }

    #[test]
    fn sell_stop_triggers_when_last_trade_falls_to_stop_price() {
        let stops = StopBook::new(4);
        stops.insert(stop_order(Side::Sell, dec!(100.00), 1));
        assert!(stops.take_triggered(dec!(101.00)).is_empty());
        let triggered = stops.take_triggered(dec!(100.00));
        assert_eq!(triggered.len(), 1);
    }

    #[test]
    fn triggered_stops_promote_in_submission_sequence_order() {
        let stops = StopBook::new(4);
        stops.insert(stop_order(Side::Buy, dec!(100.00), 5));
        stops.insert(stop_order(Side::Buy, dec!(99.00), 2));
        let triggered = stops.take_triggered(dec!(100.00));
        assert_eq!(triggered[0].sequence, 2);
        assert_eq!(triggered[1].sequence, 5);
    }
}
