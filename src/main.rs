use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod distribution;
mod error;
mod lifecycle;
mod market_data;
mod matching;
mod metrics;
mod models;
mod persistence;
mod risk;
mod shutdown;
mod utils;

use crate::auth::{JwtVerifier, TokenVerifier};
use crate::config::AppConfig;
use crate::distribution::{Channel, ConnectionPool, Envelope, MessageType, Payload};
use crate::lifecycle::OrderLifecycleManager;
use crate::market_data::{NullPositionProvider, PositionProvider, PriceOracle, StaticPriceOracle};
use crate::matching::MatchingEngine;
use crate::persistence::{OrderStore, PostgresStore, TradeStore};
use crate::risk::{
    DailyLossValidator, DuplicateCache, DuplicateSuppressionValidator, OrderSizeValidator,
    PositionLimitValidator, RiskPipeline, VolatilityValidator, ValidatorRegistry,
};
use crate::shutdown::ShutdownToken;

pub struct AppState {
    pub config: AppConfig,
    pub matching: Arc<MatchingEngine>,
    pub risk: Arc<RiskPipeline>,
    pub lifecycle: Arc<OrderLifecycleManager>,
    pub connection_pool: Arc<ConnectionPool>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub order_store: Arc<dyn OrderStore>,
    pub trade_store: Arc<dyn TradeStore>,
    pub shutdown: ShutdownToken,
    pub metrics_handle: PrometheusHandle,
}

/// Builds the chained risk pipeline from the pack's bundled validators,
/// priority-ordered cheapest-first so a fail-fast rejection short
/// circuits before the expensive checks run.
fn build_risk_pipeline(duplicate_cache: Arc<DuplicateCache>) -> Arc<RiskPipeline> {
    let validators: Vec<Arc<dyn risk::RiskValidator>> = vec![
        Arc::new(DuplicateSuppressionValidator::new(0, duplicate_cache)),
        Arc::new(OrderSizeValidator::new(
            10,
            rust_decimal::Decimal::new(1, 8),
            rust_decimal::Decimal::from(1_000_000),
            rust_decimal::Decimal::from(50_000_000),
        )),
        Arc::new(PositionLimitValidator::new(
            20,
            rust_decimal::Decimal::from(1_000_000),
            rust_decimal::Decimal::from(1_000_000),
            rust_decimal::Decimal::from(2_000_000),
        )),
        Arc::new(DailyLossValidator::new(30, rust_decimal::Decimal::from(100_000))),
        Arc::new(VolatilityValidator::new(
            40,
            rust_decimal::Decimal::new(20, 2),
            rust_decimal::Decimal::new(15, 1),
        )),
    ];
    let registry = Arc::new(ValidatorRegistry::new(validators));
    Arc::new(RiskPipeline::new(registry, risk::FailPolicy::Closed))
}

/// Bridges the matching engine's trade/book broadcasts and the
/// lifecycle manager's order events onto the Distribution Bus and
/// persistence, so the write path never blocks on either concern.
fn spawn_event_bridges(
    matching: Arc<MatchingEngine>,
    lifecycle: Arc<OrderLifecycleManager>,
    pool: Arc<ConnectionPool>,
    order_store: Arc<dyn OrderStore>,
    trade_store: Arc<dyn TradeStore>,
    shutdown: ShutdownToken,
) {
    {
        let mut trades = matching.subscribe_trades();
        let pool = pool.clone();
        let trade_store = trade_store.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    trade = trades.recv() => {
                        let trade = match trade {
                            Ok(trade) => trade,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(skipped = n, "trade broadcast receiver lagged");
                                continue;
                            }
                        };
                        if let Err(err) = trade_store.insert(&trade).await {
                            tracing::error!(error = %err, trade_id = %trade.id, "failed to persist trade");
                        }
                        let envelope = Envelope::new(MessageType::Trade, chrono::Utc::now().timestamp())
                            .with_channel(Channel::Trades)
                            .with_symbol(trade.symbol.clone())
                            .with_data(Payload::Trade((&trade).into()));
                        pool.publish(Channel::Trades, Some(&trade.symbol), &envelope, None);
                        let volume = rust_decimal::prelude::ToPrimitive::to_f64(&(trade.quantity * trade.price)).unwrap_or(0.0);
                        crate::metrics::record_trade_executed(&trade.symbol, volume);
                    }
                }
            }
        });
    }

    {
        let mut books = matching.subscribe_book_updates();
        let pool = pool.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    snapshot = books.recv() => {
                        let snapshot = match snapshot {
                            Ok(snapshot) => snapshot,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(skipped = n, "book update broadcast receiver lagged");
                                continue;
                            }
                        };
                        let envelope = Envelope::new(MessageType::OrderBook, chrono::Utc::now().timestamp())
                            .with_channel(Channel::OrderBook)
                            .with_symbol(snapshot.symbol.clone())
                            .with_data(Payload::OrderBook((&snapshot).into()));
                        pool.publish(Channel::OrderBook, Some(&snapshot.symbol), &envelope, None);
                    }
                }
            }
        });
    }

    {
        let mut events = lifecycle.subscribe_events();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => {
                        let event = match event {
                            Ok(event) => event,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!(skipped = n, "order event broadcast receiver lagged");
                                continue;
                            }
                        };
                        if let Err(err) = order_store.upsert(&event.order).await {
                            tracing::error!(error = %err, order_id = %event.order.id, "failed to persist order");
                        }
                        if !event.trades.is_empty() {
                            if let Err(err) = trade_store.insert_batch(&event.trades).await {
                                tracing::error!(error = %err, "failed to persist trade batch");
                            }
                        }
                        let envelope = Envelope::new(MessageType::Order, chrono::Utc::now().timestamp())
                            .with_channel(Channel::Orders)
                            .with_symbol(event.order.symbol.clone())
                            .with_data(Payload::Order((&event.order).into()));
                        pool.publish(Channel::Orders, Some(&event.order.symbol), &envelope, None);
                    }
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trading_execution_platform=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting trading execution platform v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.environment, "configuration loaded");

    let metrics_handle = crate::metrics::init_metrics();

    let db_pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    tracing::info!("database connection pool established");

    let store = Arc::new(PostgresStore::new(db_pool));
    let order_store: Arc<dyn OrderStore> = store.clone();
    let trade_store: Arc<dyn TradeStore> = store;

    let shutdown = ShutdownToken::new();

    let trading_pairs = config.get_trading_pairs();
    let matching = Arc::new(MatchingEngine::with_scale_and_symbols(
        config.matching.default_scale(),
        trading_pairs.clone(),
    ));
    tracing::info!(symbols = ?trading_pairs, "matching engine initialized");

    let duplicate_cache = DuplicateCache::new(config.lifecycle.max_orders_per_user, std::time::Duration::from_secs(86_400));
    let risk = build_risk_pipeline(duplicate_cache.clone());

    let price_oracle: Arc<dyn PriceOracle> = Arc::new(StaticPriceOracle);
    let position_provider: Arc<dyn PositionProvider> = Arc::new(NullPositionProvider);

    let lifecycle = OrderLifecycleManager::new(
        config.lifecycle.to_lifecycle_config(),
        matching.clone(),
        risk.clone(),
        price_oracle,
        position_provider,
        duplicate_cache,
        shutdown.child(),
    );

    let connection_pool = ConnectionPool::new(config.ws.to_bus_config());
    connection_pool.spawn_heartbeat_lane(shutdown.child());

    spawn_event_bridges(
        matching.clone(),
        lifecycle.clone(),
        connection_pool.clone(),
        order_store.clone(),
        trade_store.clone(),
        shutdown.child(),
    );

    let token_verifier: Arc<dyn TokenVerifier> = Arc::new(JwtVerifier::new(&config.jwt_secret, config.jwt_expiry_seconds));

    let state = Arc::new(AppState {
        config,
        matching,
        risk,
        lifecycle,
        connection_pool,
        token_verifier,
        order_store,
        trade_store,
        shutdown: shutdown.clone(),
        metrics_handle,
    });

    let rpc_app = Router::new()
        .merge(api::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::middleware::auth_middleware))
        .route("/health", get(health_check))
        .route("/metrics", get(serve_metrics))
        .layer(middleware::from_fn(api::middleware::metrics_middleware))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let ws_app = Router::new()
        .merge(distribution::routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let rpc_addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.rpc_port));
    let ws_addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.ws_port));

    tracing::info!(%rpc_addr, "rpc server listening");
    tracing::info!(%ws_addr, "distribution bus listening");

    let rpc_listener = tokio::net::TcpListener::bind(rpc_addr).await?;
    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await?;

    let rpc_server = axum::serve(rpc_listener, rpc_app.into_make_service_with_connect_info::<SocketAddr>());
    let ws_server = axum::serve(ws_listener, ws_app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = rpc_server => { result?; }
        result = ws_server => { result?; }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            shutdown.trigger();
        }
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn serve_metrics(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
