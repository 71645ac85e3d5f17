//! Postgres-backed `OrderStore`/`TradeStore`, grounded in the
//! matching orchestrator's `persist_trade`/`persist_order` queries:
//! plain `sqlx::query` with bound parameters (no compile-time query
//! checking, since this deployment has no live database at build time).

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{Order, OrderId, Trade};

use super::{OrderStore, PersistenceError, TradeStore};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn upsert(&self, order: &Order) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, client_order_id, user_id, account_id, symbol, side, order_type,
                time_in_force, quantity, filled_quantity, price, stop_price, status,
                created_at, updated_at, expires_at, sequence
            )
            VALUES (
                $1, $2, $3, $4, $5, $6::order_side, $7::order_type,
                $8::time_in_force, $9, $10, $11, $12, $13::order_status,
                $14, $15, $16, $17
            )
            ON CONFLICT (id) DO UPDATE SET
                status = $13::order_status,
                filled_quantity = $10,
                price = $11,
                stop_price = $12,
                updated_at = $15
            "#,
        )
        .bind(order.id.0)
        .bind(&order.client_order_id)
        .bind(&order.user_id.0)
        .bind(&order.account_id.0)
        .bind(&order.symbol)
        .bind(order.side)
        .bind(order.order_type)
        .bind(order.time_in_force)
        .bind(order.quantity)
        .bind(order.filled_quantity)
        .bind(order.price)
        .bind(order.stop_price)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.expires_at)
        .bind(order.sequence as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, PersistenceError> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }
}

#[async_trait]
impl TradeStore for PostgresStore {
    async fn insert(&self, trade: &Trade) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO trades (id, symbol, price, quantity, buy_order_id, sell_order_id, taker_side, executed_at, sequence)
            VALUES ($1, $2, $3, $4, $5, $6, $7::order_side, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(trade.id.0)
        .bind(&trade.symbol)
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.buy_order_id.0)
        .bind(trade.sell_order_id.0)
        .bind(trade.taker_side)
        .bind(trade.executed_at)
        .bind(trade.sequence as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_batch(&self, trades: &[Trade]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO trades (id, symbol, price, quantity, buy_order_id, sell_order_id, taker_side, executed_at, sequence)
                VALUES ($1, $2, $3, $4, $5, $6, $7::order_side, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(trade.id.0)
            .bind(&trade.symbol)
            .bind(trade.price)
            .bind(trade.quantity)
            .bind(trade.buy_order_id.0)
            .bind(trade.sell_order_id.0)
            .bind(trade.taker_side)
            .bind(trade.executed_at)
            .bind(trade.sequence as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
