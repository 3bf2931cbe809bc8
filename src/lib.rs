//! Payments Point
//!
//! Request-authentication and authorization layer fronting the payments
//! API. Multiple credential mechanisms are simultaneously valid: bearer
//! tokens for interactive and service callers, and independently configured
//! API-key schemes for machine clients.
//!
//! ## Modules
//!
//! - [`auth`] - Schemes, authenticators, policies, and the request pipeline
//! - [`config`] - Startup configuration with fail-fast validation
//! - [`server`] - HTTP bootstrap and route wiring

pub mod auth;
pub mod config;
pub mod server;

// Re-export commonly used types
pub use auth::{
    authorize, AuthError, AuthResult, ClaimKind, DenyReason, PipelineState, Policy, PolicySet,
    Principal, PrincipalExt, SchemeRegistry, Verdict,
};
pub use config::{AuthSettings, ConfigError};
