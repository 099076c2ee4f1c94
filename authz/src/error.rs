//! Error types for the authorization system.
//!
//! # Security Note
//! Deny errors carry enough context for server-side logs; the HTTP boundary
//! is expected to translate them into minimal external messages.

use thiserror::Error;

/// Errors that can occur during authorization checks.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The principal's role is not in the route's allowed set.
    #[error("Role '{role}' is not authorized to access this route")]
    RoleDenied { role: String },

    /// The principal neither owns the target entity nor holds the admin role.
    #[error("User {principal} is not authorized to modify this resource")]
    NotOwner { principal: String },

    /// A role string from storage or a request did not parse.
    #[error("Unknown role: {0}")]
    InvalidRole(String),
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::RoleDenied {
            role: "user".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Role 'user' is not authorized to access this route"
        );

        let err = AuthzError::NotOwner {
            principal: "01H8XG".to_string(),
        };
        assert!(err.to_string().contains("01H8XG"));

        let err = AuthzError::InvalidRole("root".to_string());
        assert_eq!(err.to_string(), "Unknown role: root");
    }
}
