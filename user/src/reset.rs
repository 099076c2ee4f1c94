//! Password reset tokens.
//!
//! The plain token goes into the reset email; only its SHA-256 digest is
//! stored, so a leaked users table does not expose live reset links.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

/// How long a reset token stays valid
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// A freshly generated reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// The value mailed to the user
    pub plain: String,
    /// The digest stored on the account
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

/// Generate a reset token together with its storage digest
pub fn generate_reset_token() -> ResetToken {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill(&mut bytes);
    let plain = hex::encode(bytes);

    ResetToken {
        hashed: hash_token(&plain),
        expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        plain,
    }
}

/// Digest a plain token the way it is stored
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
