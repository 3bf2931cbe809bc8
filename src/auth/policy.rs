//! Authorization policies
//!
//! A policy names the schemes a route accepts and the roles a caller must
//! prove. The policy engine combines a policy with an authentication outcome
//! into a single [`Verdict`]; authorization is never evaluated past an
//! authentication failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{AuthError, Principal};
use crate::config::ConfigError;

/// Well-known policy names from the payments API route contract.
pub mod policies {
    pub const CUSTOMER_ACCESS: &str = "CustomerAccess";
    pub const ADMIN_ACCESS: &str = "AdminAccess";
    pub const ADMIN_OR_CUSTOMER_ACCESS: &str = "AdminOrCustomerAccess";
}

/// A named access rule.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    /// Allowed schemes in declared order; authentication is attempted in
    /// this order and the first success wins.
    allowed_schemes: Vec<String>,
    required_roles: HashSet<String>,
    require_authenticated: bool,
}

impl Policy {
    pub fn new(name: impl Into<String>, allowed_schemes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            allowed_schemes,
            required_roles: HashSet::new(),
            require_authenticated: false,
        }
    }

    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.required_roles.insert(role.into());
        self
    }

    pub fn require_authenticated(mut self) -> Self {
        self.require_authenticated = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed_schemes(&self) -> &[String] {
        &self.allowed_schemes
    }

    pub fn required_roles(&self) -> &HashSet<String> {
        &self.required_roles
    }

    pub fn requires_authenticated(&self) -> bool {
        self.require_authenticated
    }

    /// Produce a verdict for an authentication outcome under this policy.
    pub fn evaluate(&self, outcome: Result<Principal, AuthError>) -> Verdict {
        let principal = match outcome {
            Ok(principal) => principal,
            Err(reason) => return Verdict::Deny(reason.into()),
        };

        if self.require_authenticated && principal.is_anonymous() {
            return Verdict::Deny(DenyReason::Unauthenticated);
        }

        if !self.required_roles.is_empty() && !principal.has_any_role(&self.required_roles) {
            return Verdict::Deny(DenyReason::RoleNotSatisfied);
        }

        if !self.allowed_schemes.iter().any(|s| s == principal.scheme()) {
            return Verdict::Deny(DenyReason::SchemeNotAllowed);
        }

        Verdict::Allow(principal)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    // Authentication-level: the caller never proved an identity.
    MissingCredential,
    InvalidCredential,
    ExpiredCredential,
    SchemeNotFound,

    // Authorization-level: an authenticated caller failed the policy.
    Unauthenticated,
    RoleNotSatisfied,
    SchemeNotAllowed,
}

impl From<AuthError> for DenyReason {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredential => DenyReason::MissingCredential,
            AuthError::InvalidCredential => DenyReason::InvalidCredential,
            AuthError::ExpiredCredential => DenyReason::ExpiredCredential,
            AuthError::SchemeNotFound => DenyReason::SchemeNotFound,
        }
    }
}

impl DenyReason {
    /// True for denials of the authentication layer (mapped to 401);
    /// authorization-layer denials map to 403.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            DenyReason::MissingCredential
                | DenyReason::InvalidCredential
                | DenyReason::ExpiredCredential
                | DenyReason::SchemeNotFound
        )
    }

    /// Stable machine-readable code for rejection responses.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "missing_credential",
            DenyReason::InvalidCredential => "invalid_credential",
            DenyReason::ExpiredCredential => "expired_credential",
            DenyReason::SchemeNotFound => "scheme_not_found",
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::RoleNotSatisfied => "role_not_satisfied",
            DenyReason::SchemeNotAllowed => "scheme_not_allowed",
        }
    }

    /// Coarse human-readable message. Never reveals which specific key or
    /// claim check failed.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::MissingCredential => "A credential is required",
            DenyReason::InvalidCredential => "Invalid credential",
            DenyReason::ExpiredCredential => "Credential expired",
            DenyReason::SchemeNotFound => "Unknown authentication scheme",
            DenyReason::Unauthenticated => "Authentication required",
            DenyReason::RoleNotSatisfied => "Required role not satisfied",
            DenyReason::SchemeNotAllowed => "Authentication scheme not allowed",
        }
    }
}

/// Final authorization decision for a request.
#[derive(Debug)]
pub enum Verdict {
    Allow(Principal),
    Deny(DenyReason),
}

/// Immutable set of named policies, built once at startup.
pub struct PolicySet {
    policies: HashMap<String, Arc<Policy>>,
}

impl PolicySet {
    pub fn new(policies: Vec<Policy>) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for policy in policies {
            let name = policy.name().to_string();
            if map.insert(name.clone(), Arc::new(policy)).is_some() {
                return Err(ConfigError::DuplicatePolicy(name));
            }
        }
        Ok(Self { policies: map })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Policy>> {
        self.policies.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values().map(Arc::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{roles, BEARER_SCHEME};

    fn admin_or_customer() -> Policy {
        Policy::new(
            policies::ADMIN_OR_CUSTOMER_ACCESS,
            vec![BEARER_SCHEME.to_string()],
        )
        .require_authenticated()
        .require_role(roles::ADMIN)
        .require_role(roles::CUSTOMER)
    }

    #[test]
    fn authentication_failure_short_circuits() {
        let verdict = admin_or_customer().evaluate(Err(AuthError::ExpiredCredential));
        assert!(matches!(verdict, Verdict::Deny(DenyReason::ExpiredCredential)));
    }

    #[test]
    fn any_required_role_suffices() {
        let customer = Principal::new(BEARER_SCHEME)
            .with_name("c1")
            .with_role(roles::CUSTOMER);
        assert!(matches!(
            admin_or_customer().evaluate(Ok(customer)),
            Verdict::Allow(_)
        ));

        let guest = Principal::new(BEARER_SCHEME).with_name("g1").with_role("Guest");
        assert!(matches!(
            admin_or_customer().evaluate(Ok(guest)),
            Verdict::Deny(DenyReason::RoleNotSatisfied)
        ));
    }

    #[test]
    fn anonymous_principal_fails_require_authenticated() {
        let policy = Policy::new("ApiKey-Billing", vec!["ApiKey-Billing".to_string()])
            .require_authenticated();

        let verdict = policy.evaluate(Ok(Principal::new("ApiKey-Billing")));
        assert!(matches!(verdict, Verdict::Deny(DenyReason::Unauthenticated)));
    }

    #[test]
    fn scheme_outside_policy_is_not_allowed() {
        let policy = Policy::new("ApiKey-Billing", vec!["ApiKey-Billing".to_string()]);

        let verdict = policy.evaluate(Ok(Principal::new("ApiKey-Reporting")));
        assert!(matches!(verdict, Verdict::Deny(DenyReason::SchemeNotAllowed)));
    }

    #[test]
    fn deny_reason_layer_split() {
        assert!(DenyReason::ExpiredCredential.is_authentication());
        assert!(DenyReason::SchemeNotFound.is_authentication());
        assert!(!DenyReason::RoleNotSatisfied.is_authentication());
        assert!(!DenyReason::SchemeNotAllowed.is_authentication());
        assert!(!DenyReason::Unauthenticated.is_authentication());
    }

    #[test]
    fn duplicate_policy_names_rejected() {
        let result = PolicySet::new(vec![
            Policy::new("AdminAccess", vec![BEARER_SCHEME.to_string()]),
            Policy::new("AdminAccess", vec![BEARER_SCHEME.to_string()]),
        ]);
        assert!(matches!(result, Err(ConfigError::DuplicatePolicy(name)) if name == "AdminAccess"));
    }
}
