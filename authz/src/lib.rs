//! Role and ownership gates for the request pipeline.
//!
//! Both checks are pure decision functions over already-loaded data: the
//! role gate runs before a handler executes, the ownership gate runs after
//! the target entity is loaded and before any write is committed. Neither
//! touches storage, so a deny can never leave a partial mutation behind.

pub mod error;
pub mod policy;
pub mod types;

pub use error::{AuthzError, Result};
pub use policy::RoutePolicy;
pub use types::{Principal, Role};

/// Role check: allow iff the principal's role is in the allowed set.
///
/// An empty allowed set denies everyone, including admins; routes that want
/// admins through must list the role explicitly.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthzError::RoleDenied {
            role: principal.role.to_string(),
        })
    }
}

/// Ownership check: allow iff the principal is the entity's owner or holds
/// the admin role.
pub fn authorize_ownership(principal: &Principal, owner_id: &str) -> Result<()> {
    if principal.is_admin() || principal.id == owner_id {
        Ok(())
    } else {
        Err(AuthzError::NotOwner {
            principal: principal.id.clone(),
        })
    }
}
