//! JWT-backed `TokenVerifier`, grounded on the teacher's `JwtManager`
//! (`jsonwebtoken` encode/decode of a `Claims` struct), retargeted from
//! a wallet-address subject to a `Principal` with role claims.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::models::UserId;

use super::{AuthError, Principal, TokenVerifier};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: i64,
}

impl JwtVerifier {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds: expiry_seconds as i64,
        }
    }

    pub fn issue(&self, user_id: &UserId, roles: Vec<String>) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.0.clone(),
            roles,
            exp: (now + Duration::seconds(self.expiry_seconds)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data: TokenData<Claims> =
            decode(token, &self.decoding_key, &Validation::default()).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Principal {
            user_id: UserId(data.claims.sub),
            roles: data.claims.roles.into_iter().collect::<HashSet<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_verifies_back_to_the_same_principal() {
        let verifier = JwtVerifier::new("test-secret", 3600);
        let user_id = UserId::from("u1");
        let token = verifier.issue(&user_id, vec!["trader".to_string()]).unwrap();

        let principal = verifier.verify(&token).await.unwrap();
        assert_eq!(principal.user_id, user_id);
        assert!(principal.has_role("trader"));
    }

    #[tokio::test]
    async fn garbage_token_fails_verification() {
        let verifier = JwtVerifier::new("test-secret", 3600);
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }
}
