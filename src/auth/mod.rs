//! Authentication and authorization for the payments API
//!
//! This module reduces each inbound request to either an authenticated
//! [`Principal`] with proven roles, or a precisely categorized rejection.
//!
//! # Credential Schemes
//!
//! - **Bearer tokens**: HMAC-validated tokens with configured issuer/audience
//!   and strict (zero clock skew) lifetime enforcement
//! - **API keys**: named groups of shared secrets, each group registered as
//!   its own scheme (`ApiKey-<group>`)
//!
//! # Authorization Model
//!
//! Named [`Policy`] definitions combine an ordered list of allowed schemes
//! with required roles. Role checks use OR-semantics: any one matching role
//! satisfies the policy.
//!
//! # Configuration
//!
//! The scheme registry and policy set are built once at startup from
//! [`AuthSettings`](crate::config::AuthSettings) and frozen; any
//! inconsistency (empty key group, missing signing key, policy referencing
//! an unregistered scheme) aborts startup.

mod api_key;
mod jwt;
mod middleware;
mod policy;
mod scheme;

pub use api_key::*;
pub use jwt::*;
pub use middleware::*;
pub use policy::*;
pub use scheme::*;

use std::collections::{HashMap, HashSet};

/// Closed vocabulary of claim kinds carried by a [`Principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    CustomerId,
    AdminId,
    SessionId,
    UserId,
    Role,
}

impl ClaimKind {
    /// Wire name of this claim as it appears in token payloads.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClaimKind::CustomerId => "Company_Customer_Id",
            ClaimKind::AdminId => "Company_Admin_Id",
            ClaimKind::SessionId => "Company_Session_Id",
            ClaimKind::UserId => "Company_User_Id",
            ClaimKind::Role => "roles",
        }
    }
}

/// Well-known role names.
pub mod roles {
    pub const ADMIN: &str = "Admin";
    pub const CUSTOMER: &str = "Customer";
}

/// Authenticated identity for the current request.
///
/// Built fresh per successful authentication and never mutated afterwards;
/// downstream handlers consume it read-only from request extensions.
#[derive(Debug, Clone)]
pub struct Principal {
    scheme: String,
    name: Option<String>,
    claims: HashMap<ClaimKind, String>,
    roles: HashSet<String>,
}

impl Principal {
    /// Create a principal authenticated by the named scheme, carrying no
    /// identity claims yet.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            name: None,
            claims: HashMap::new(),
            roles: HashSet::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_claim(mut self, kind: ClaimKind, value: impl Into<String>) -> Self {
        self.claims.insert(kind, value.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Name of the scheme that authenticated this principal.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Display name, if the credential carried one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn claim(&self, kind: ClaimKind) -> Option<&str> {
        self.claims.get(&kind).map(String::as_str)
    }

    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    /// True when the principal carries no identity claim at all.
    ///
    /// An API-key caller that omits the optional caller-identity header is
    /// valid but anonymous-within-scheme.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none() && self.claims.is_empty()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// OR-semantics role check: any one matching role suffices.
    pub fn has_any_role<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> bool {
        required.into_iter().any(|r| self.roles.contains(r))
    }
}

/// Authentication failure reason.
///
/// These are ordinary result values, never faults; the pipeline converts
/// them into rejection responses. The coarse categories deliberately do not
/// reveal which specific key or claim check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("credential expired")]
    ExpiredCredential,

    #[error("unknown authentication scheme")]
    SchemeNotFound,
}

/// Outcome of running an authenticator over a request.
pub type AuthResult = Result<Principal, AuthError>;
