use crate::{authorize, Principal, Result, Role};

/// Per-route authorization configuration.
///
/// Built once at router construction and handed to the role-gate middleware
/// constructor; there is no global route/role table.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    allowed: Vec<Role>,
}

impl RoutePolicy {
    /// Start an empty policy. An empty policy denies every role.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role to the allowed set
    pub fn allow(mut self, role: Role) -> Self {
        if !self.allowed.contains(&role) {
            self.allowed.push(role);
        }
        self
    }

    /// Policy for publishing routes: publishers and admins
    pub fn publishers() -> Self {
        Self::new().allow(Role::Publisher).allow(Role::Admin)
    }

    /// Policy for the admin console: admins only
    pub fn admin_only() -> Self {
        Self::new().allow(Role::Admin)
    }

    /// The allowed role set
    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed
    }

    /// Run the role check for a principal against this policy
    pub fn check(&self, principal: &Principal) -> Result<()> {
        authorize(principal, &self.allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_deduplicates() {
        let policy = RoutePolicy::new()
            .allow(Role::Admin)
            .allow(Role::Admin)
            .allow(Role::Publisher);
        assert_eq!(policy.allowed_roles(), &[Role::Admin, Role::Publisher]);
    }

    #[test]
    fn test_publishers_policy() {
        let policy = RoutePolicy::publishers();

        assert!(policy.check(&Principal::new("p1", Role::Publisher)).is_ok());
        assert!(policy.check(&Principal::new("a1", Role::Admin)).is_ok());
        assert!(policy.check(&Principal::new("u1", Role::User)).is_err());
    }

    #[test]
    fn test_admin_only_policy() {
        let policy = RoutePolicy::admin_only();

        assert!(policy.check(&Principal::new("a1", Role::Admin)).is_ok());
        assert!(policy.check(&Principal::new("p1", Role::Publisher)).is_err());
        assert!(policy.check(&Principal::new("u1", Role::User)).is_err());
    }

    #[test]
    fn test_empty_policy_denies_everyone() {
        let policy = RoutePolicy::new();

        for role in [Role::User, Role::Publisher, Role::Admin] {
            assert!(policy.check(&Principal::new("x", role)).is_err());
        }
    }
}
