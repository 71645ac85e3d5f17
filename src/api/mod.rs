//! HTTP/RPC transport (spec.md §6.2): thin axum handlers translating
//! wire requests into `OrderLifecycleManager` calls and `PlatformError`
//! into the wire `ApiResponse`/`ApiError` shape.

pub mod middleware;
pub mod routes;
pub mod rpc;

pub use routes::router;
