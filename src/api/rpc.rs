//! Transport-agnostic RPC operations (spec.md §6.2): `CreateOrder`,
//! `GetOrder`, `CancelOrder`, `GetOrders`, `StreamOrders`. Thin wrappers
//! over `OrderLifecycleManager` so both the REST routes and any future
//! transport share one call path and one error mapping.

use std::sync::Arc;

use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::PlatformError;
use crate::lifecycle::OrderLifecycleManager;
use crate::models::{CreateOrderRequest, OrderFilter, OrderId, OrderResponse, UpdateOrderPatch};

pub struct GetOrderRequest {
    pub order_id: OrderId,
}

pub struct CancelOrderRequest {
    pub order_id: OrderId,
    pub reason: String,
}

pub struct OrderList {
    pub orders: Vec<OrderResponse>,
}

pub async fn create_order(
    manager: &Arc<OrderLifecycleManager>,
    request: CreateOrderRequest,
) -> Result<OrderResponse, PlatformError> {
    let order = manager.create(request).await.map_err(PlatformError::from)?;
    Ok(order.into())
}

pub async fn update_order(
    manager: &Arc<OrderLifecycleManager>,
    order_id: OrderId,
    patch: UpdateOrderPatch,
) -> Result<OrderResponse, PlatformError> {
    let order = manager.update(order_id, patch).await.map_err(PlatformError::from)?;
    Ok(order.into())
}

pub fn get_order(manager: &Arc<OrderLifecycleManager>, request: GetOrderRequest) -> Option<OrderResponse> {
    manager.get(request.order_id).map(Into::into)
}

pub async fn cancel_order(
    manager: &Arc<OrderLifecycleManager>,
    request: CancelOrderRequest,
) -> Result<OrderResponse, PlatformError> {
    let order = manager
        .cancel(request.order_id, request.reason)
        .await
        .map_err(PlatformError::from)?;
    Ok(order.into())
}

pub fn get_orders(manager: &Arc<OrderLifecycleManager>, filter: &OrderFilter) -> OrderList {
    OrderList {
        orders: manager.list(filter).into_iter().map(Into::into).collect(),
    }
}

/// Live feed of order events for `filter`'s user, re-derived from the
/// lifecycle manager's broadcast channel (spec.md §6.2 `StreamOrders`).
pub fn stream_orders(
    manager: &Arc<OrderLifecycleManager>,
    filter: OrderFilter,
) -> impl Stream<Item = OrderResponse> {
    let receiver = manager.subscribe_events();
    BroadcastStream::new(receiver).filter_map(move |event| {
        let event = event.ok()?;
        let matches = filter.user_id.as_ref().map_or(true, |u| &event.order.user_id == u)
            && filter.account_id.as_ref().map_or(true, |a| &event.order.account_id == a)
            && filter.symbol.as_ref().map_or(true, |s| &event.order.symbol == s)
            && filter.status.map_or(true, |s| event.order.status == s);
        matches.then(|| event.order.into())
    })
}
