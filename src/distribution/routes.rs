//! WebSocket upgrade route (spec.md §6.1 `GET /ws`) and the
//! read-only bus stats endpoint (SPEC_FULL.md §B.3).

use std::sync::Arc;

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::utils::response::AppError;
use crate::AppState;

use super::codec::Codec;
use super::handler::handle_socket;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/internal/bus/stats", get(bus_stats))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let token = query
        .token
        .ok_or_else(|| AppError::unauthorized("missing bearer credential"))?;

    let principal = state
        .token_verifier
        .verify(&token)
        .await
        .map_err(|e| AppError::unauthorized(&e.to_string()))?;

    let binary = ws.selected_protocol().map(|p| p == "binary").unwrap_or(false);
    let codec = if binary { Codec::Binary } else { Codec::Json };

    let pool = state.connection_pool.clone();
    let shutdown = state.shutdown.clone();

    Ok(ws
        .protocols(["binary", "json"])
        .on_upgrade(move |socket| handle_socket(socket, pool, principal, Some(remote_addr), codec, shutdown)))
}

async fn bus_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.connection_pool.snapshot()))
}
