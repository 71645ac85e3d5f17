//! REST surface for the transport-agnostic RPC operations (spec.md
//! §6.2). Order event streaming is served over the Distribution Bus's
//! private `orders` channel rather than a REST long-poll.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::{PlatformError, Severity};
use crate::models::{CreateOrderRequest, OrderFilter, OrderId, OrderStatus, UpdateOrderPatch};
use crate::utils::response::{ApiResponse, AppError};
use crate::AppState;

use super::rpc::{self, CancelOrderRequest, GetOrderRequest};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(get_orders))
        .route("/orders/:order_id", get(get_order).patch(update_order).delete(cancel_order))
}

fn platform_error_to_app_error(err: PlatformError) -> AppError {
    let status = match err.severity() {
        Severity::Validation => StatusCode::BAD_REQUEST,
        Severity::Business => StatusCode::CONFLICT,
        Severity::Transient => StatusCode::SERVICE_UNAVAILABLE,
        Severity::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError::new(status, err.code().as_str(), &err.to_string())
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    principal: axum::Extension<Principal>,
    Json(mut request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.user_id = principal.0.user_id.clone();
    let order = rpc::create_order(&state.lifecycle, request)
        .await
        .map_err(platform_error_to_app_error)?;
    Ok(Json(ApiResponse::success(order)))
}

async fn get_order(State(state): State<Arc<AppState>>, Path(order_id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let order = rpc::get_order(&state.lifecycle, GetOrderRequest { order_id: OrderId(order_id) })
        .ok_or_else(|| AppError::not_found("order not found"))?;
    Ok(Json(ApiResponse::success(order)))
}

async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(patch): Json<UpdateOrderPatch>,
) -> Result<impl IntoResponse, AppError> {
    let order = rpc::update_order(&state.lifecycle, OrderId(order_id), patch)
        .await
        .map_err(platform_error_to_app_error)?;
    Ok(Json(ApiResponse::success(order)))
}

async fn cancel_order(State(state): State<Arc<AppState>>, Path(order_id): Path<Uuid>) -> Result<impl IntoResponse, AppError> {
    let order = rpc::cancel_order(
        &state.lifecycle,
        CancelOrderRequest {
            order_id: OrderId(order_id),
            reason: "user requested".to_string(),
        },
    )
    .await
    .map_err(platform_error_to_app_error)?;
    Ok(Json(ApiResponse::success(order)))
}

#[derive(Debug, serde::Deserialize)]
pub struct OrderListQuery {
    pub symbol: Option<String>,
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
}

async fn get_orders(
    State(state): State<Arc<AppState>>,
    principal: axum::Extension<Principal>,
    Query(query): Query<OrderListQuery>,
) -> impl IntoResponse {
    let filter = OrderFilter {
        user_id: Some(principal.0.user_id.clone()),
        account_id: None,
        symbol: query.symbol,
        status: query.status,
        limit: query.limit,
    };
    let list = rpc::get_orders(&state.lifecycle, &filter);
    Json(ApiResponse::success(list.orders))
}
