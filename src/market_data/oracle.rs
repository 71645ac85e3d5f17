//! `PriceOracle` and `PositionProvider`: the two external collaborators
//! the Risk Pipeline reads from. Both are named only for the interface
//! the core exposes/consumes (spec.md §1 "Out of scope"); account
//! management and the real market-data feed live outside this crate.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::AccountId;

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn last_price(&self, symbol: &str) -> Option<Decimal>;

    /// A dimensionless recent-volatility estimate for the symbol, used
    /// by the Volatility validator's `vol × qty × price × multiplier`
    /// check.
    async fn recent_volatility(&self, symbol: &str) -> Decimal;

    async fn is_market_open(&self, symbol: &str) -> bool;
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Signed current position (positive = long, negative = short).
    async fn position(&self, account_id: &AccountId, symbol: &str) -> Decimal;

    /// `(realized, unrealized)` PnL for the account, for the Daily Loss
    /// validator.
    async fn daily_pnl(&self, account_id: &AccountId) -> (Decimal, Decimal);
}

/// Default oracle used when no external feed is wired up: last price
/// and volatility are always unknown/zero and markets are always open.
/// Exists so the engine and risk pipeline can be exercised end-to-end
/// in tests and local runs without a real market-data feed.
#[derive(Debug, Default)]
pub struct StaticPriceOracle;

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn last_price(&self, _symbol: &str) -> Option<Decimal> {
        None
    }

    async fn recent_volatility(&self, _symbol: &str) -> Decimal {
        Decimal::ZERO
    }

    async fn is_market_open(&self, _symbol: &str) -> bool {
        true
    }
}

/// Default position provider with no open positions and no PnL,
/// paired with `StaticPriceOracle` for the same reason.
#[derive(Debug, Default)]
pub struct NullPositionProvider;

#[async_trait]
impl PositionProvider for NullPositionProvider {
    async fn position(&self, _account_id: &AccountId, _symbol: &str) -> Decimal {
        Decimal::ZERO
    }

    async fn daily_pnl(&self, _account_id: &AccountId) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }
}
