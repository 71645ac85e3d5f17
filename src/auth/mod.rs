//! `TokenVerifier` (spec.md §1 "Out of scope" / §4.4 "Authentication"):
//! verifies a bearer credential and returns a principal. Named only for
//! the interface the Distribution Bus and REST transport consume — the
//! identity/account system behind it lives outside this crate.

pub mod jwt;
pub mod middleware;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::UserId;

/// The authenticated identity bound to a connection for its lifetime
/// (spec.md §3 "Connection": "a connection owns exactly one
/// authenticated principal for its lifetime").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: HashSet<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,
    #[error("invalid or expired token: {0}")]
    InvalidToken(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

pub use jwt::JwtVerifier;
