//! Root error taxonomy (SPEC_FULL.md §A.2): subsystem errors are
//! `thiserror`-derived on their own; `PlatformError` wraps them with a
//! `Severity` and a stable wire `ErrorCode` (spec.md §6.3) so transport
//! adapters translate without re-interpreting what went wrong.

use crate::distribution::BusError;
use crate::lifecycle::LifecycleError;
use crate::matching::MatchingError;
use crate::persistence::PersistenceError;
use crate::risk::RiskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller's request was malformed or violates a business rule. No
    /// retry without changing the request.
    Validation,
    /// Request was well-formed but rejected by a business rule (risk
    /// limit, market closed). No retry without changing state.
    Business,
    /// Infrastructure hiccup; retrying the same request may succeed.
    Transient,
    /// Invariant breach or unrecoverable internal state.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    OrderNotFound,
    InvalidOrder,
    InvalidRequest,
    OrderExists,
    ClientOrderIdExists,
    OrderNotActive,
    OrderExpired,
    InvalidPrice,
    InvalidSymbol,
    InvalidSide,
    InvalidType,
    InvalidTimeInForce,
    RiskLimitExceeded,
    PositionLimitExceeded,
    MarketClosed,
    RateLimitExceeded,
    ServiceUnavailable,
    BatchChannelFull,
    Unauthorized,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::InvalidOrder => "INVALID_ORDER",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::OrderExists => "ORDER_EXISTS",
            ErrorCode::ClientOrderIdExists => "CLIENT_ORDER_ID_EXISTS",
            ErrorCode::OrderNotActive => "ORDER_NOT_ACTIVE",
            ErrorCode::OrderExpired => "ORDER_EXPIRED",
            ErrorCode::InvalidPrice => "INVALID_PRICE",
            ErrorCode::InvalidSymbol => "INVALID_SYMBOL",
            ErrorCode::InvalidSide => "INVALID_SIDE",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::InvalidTimeInForce => "INVALID_TIME_IN_FORCE",
            ErrorCode::RiskLimitExceeded => "RISK_LIMIT_EXCEEDED",
            ErrorCode::PositionLimitExceeded => "POSITION_LIMIT_EXCEEDED",
            ErrorCode::MarketClosed => "MARKET_CLOSED",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::BatchChannelFull => "BATCH_CHANNEL_FULL",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl PlatformError {
    pub fn severity(&self) -> Severity {
        match self {
            PlatformError::Matching(e) => match e {
                MatchingError::InvalidOrder(_) => Severity::Validation,
                MatchingError::UnknownSymbol(_) | MatchingError::OrderNotFound(_) => Severity::Business,
                MatchingError::NoLiquidity => Severity::Business,
                MatchingError::InvariantBreach { .. } | MatchingError::Quarantined(_) => Severity::Fatal,
            },
            PlatformError::Lifecycle(e) => match e {
                LifecycleError::Validation(_) => Severity::Validation,
                LifecycleError::OrderNotFound(_)
                | LifecycleError::ClientOrderIdExists(_)
                | LifecycleError::InvalidStatusTransition { .. }
                | LifecycleError::MarketClosed(_) => Severity::Business,
                LifecycleError::Risk(_) => Severity::Business,
                LifecycleError::Matching(_) => Severity::Business,
                LifecycleError::BatchChannelFull => Severity::Transient,
                LifecycleError::Persistence(_) => Severity::Transient,
            },
            PlatformError::Risk(_) => Severity::Business,
            PlatformError::Bus(_) => Severity::Transient,
            PlatformError::Persistence(_) => Severity::Transient,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PlatformError::Matching(e) => match e {
                MatchingError::UnknownSymbol(_) => ErrorCode::InvalidSymbol,
                MatchingError::OrderNotFound(_) => ErrorCode::OrderNotFound,
                MatchingError::InvalidOrder(_) => ErrorCode::InvalidOrder,
                MatchingError::NoLiquidity => ErrorCode::InvalidOrder,
                MatchingError::InvariantBreach { .. } | MatchingError::Quarantined(_) => ErrorCode::ServiceUnavailable,
            },
            PlatformError::Lifecycle(e) => match e {
                LifecycleError::Validation(_) => ErrorCode::InvalidRequest,
                LifecycleError::OrderNotFound(_) => ErrorCode::OrderNotFound,
                LifecycleError::ClientOrderIdExists(_) => ErrorCode::ClientOrderIdExists,
                LifecycleError::InvalidStatusTransition { .. } => ErrorCode::OrderNotActive,
                LifecycleError::MarketClosed(_) => ErrorCode::MarketClosed,
                LifecycleError::Risk(_) => ErrorCode::RiskLimitExceeded,
                LifecycleError::Matching(_) => ErrorCode::InvalidOrder,
                LifecycleError::BatchChannelFull => ErrorCode::BatchChannelFull,
                LifecycleError::Persistence(_) => ErrorCode::ServiceUnavailable,
            },
            PlatformError::Risk(_) => ErrorCode::RiskLimitExceeded,
            PlatformError::Bus(_) => ErrorCode::ServiceUnavailable,
            PlatformError::Persistence(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_exists_maps_to_its_own_wire_code() {
        let err = PlatformError::Lifecycle(LifecycleError::ClientOrderIdExists("c1".into()));
        assert_eq!(err.code().as_str(), "CLIENT_ORDER_ID_EXISTS");
        assert_eq!(err.severity(), Severity::Business);
    }

    #[test]
    fn invariant_breach_is_fatal() {
        let err = PlatformError::Matching(MatchingError::InvariantBreach {
            symbol: "AAPL".into(),
            detail: "crossed book".into(),
        });
        assert_eq!(err.severity(), Severity::Fatal);
    }
}
