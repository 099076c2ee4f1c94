//! Core authorization types.
//!
//! # Security Note
//! Principals must be derived from verified credentials only. Never construct
//! a principal from untrusted request data.

use crate::{AuthzError, Result};
use serde::{Deserialize, Serialize};

/// Role attached to every account.
///
/// Roles are stored as their lowercase wire strings. Admin can never be
/// chosen at self-registration; it is assigned through the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Publisher,
    Admin,
}

impl Role {
    /// The wire representation stored in the role column
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
        }
    }

    /// Roles an account may choose for itself at registration
    pub fn self_assignable(&self) -> bool {
        matches!(self, Role::User | Role::Publisher)
    }
}

impl std::str::FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "publisher" => Ok(Role::Publisher),
            "admin" => Ok(Role::Admin),
            other => Err(AuthzError::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated identity making a request.
///
/// Constructed per-request from credential verification, immutable for the
/// request's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The unique identifier for this principal (ULID)
    pub id: String,

    /// The role the principal's account carries
    pub role: Role,
}

impl Principal {
    /// Creates a new Principal with the given id and role.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Check whether this principal holds the admin role
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Publisher, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn test_role_rejects_unknown() {
        assert!(Role::from_str("superuser").is_err());
        assert!(Role::from_str("Admin").is_err());
        assert!(Role::from_str("").is_err());
    }

    #[test]
    fn test_self_assignable_roles() {
        assert!(Role::User.self_assignable());
        assert!(Role::Publisher.self_assignable());
        assert!(!Role::Admin.self_assignable());
    }

    #[test]
    fn test_principal_creation() {
        let principal = Principal::new("01H8XGJWBWBAQ4Z4M9D5K4Z3E1", Role::Publisher);
        assert_eq!(principal.id, "01H8XGJWBWBAQ4Z4M9D5K4Z3E1");
        assert_eq!(principal.role, Role::Publisher);
        assert!(!principal.is_admin());
        assert!(Principal::new("x", Role::Admin).is_admin());
    }

    #[test]
    fn test_role_serde_wire_form() {
        let json = serde_json::to_string(&Role::Publisher).unwrap();
        assert_eq!(json, "\"publisher\"");

        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }
}
