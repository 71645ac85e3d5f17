//! Persistence (spec.md §7): durable storage of orders and trades,
//! off the hot matching path. Every write here runs on a background
//! task spawned by the caller — the lifecycle manager's write path
//! never awaits a database round trip.

pub mod postgres;

use async_trait::async_trait;

use crate::models::{Order, OrderId, Trade};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn upsert(&self, order: &Order) -> Result<(), PersistenceError>;
    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, PersistenceError>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert(&self, trade: &Trade) -> Result<(), PersistenceError>;
    async fn insert_batch(&self, trades: &[Trade]) -> Result<(), PersistenceError>;
}

pub use postgres::PostgresStore;
