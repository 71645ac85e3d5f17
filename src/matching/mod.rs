//! Matching Engine: one independent price/time-priority limit order
//! book per symbol, plus the STOP_* trigger set that promotes into it.
//!
//! ```text
//! OrderLifecycleManager
//!   └→ MatchingEngine::submit_order
//!        ├→ Orderbook (per symbol, price/time priority)
//!        └→ StopBook (per symbol, trigger-price keyed)
//! ```

pub mod book;
#[cfg(test)]
mod book_proptest;
pub mod engine;
pub mod stops;
pub mod types;

pub use book::Orderbook;
pub use engine::{EngineStats, MatchingEngine, SymbolScale};
pub use stops::StopBook;
pub use types::{BookLevel, IncomingOrder, MatchOutcome, MatchingError, OrderbookSnapshot, PriceLevel, RestingOrder};
