//! Signed bearer tokens.
//!
//! Tokens embed the principal id and an expiry, signed with a symmetric
//! secret. Verification checks the signature and the expiry; resolving
//! the id to a live account is the caller's job.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UserError};

/// Claims carried by an issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Issues and verifies signed bearer tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expire_days: i64,
}

impl TokenService {
    pub fn new(secret: &str, expire_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expire_days,
        }
    }

    /// Sign a token for the given principal id
    pub fn issue(&self, principal_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.expire_days)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| UserError::Configuration(format!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry, returning the embedded principal id
    pub fn verify(&self, token: &str) -> Result<String> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|_| UserError::InvalidToken)
    }

    /// Token lifetime in days, for cookie expiry
    pub fn expire_days(&self) -> i64 {
        self.expire_days
    }
}
