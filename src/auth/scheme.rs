//! Credential scheme registry
//!
//! The registry is the authoritative mapping of scheme name to validation
//! strategy. It is built once at startup through [`SchemeRegistryBuilder`],
//! then frozen: the built [`SchemeRegistry`] is read-only and can be shared
//! across concurrent request handlers without locking.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;

use super::{ApiKeyAuthenticator, AuthError, AuthResult, JwtAuthenticator};
use crate::config::ConfigError;

/// Name of the bearer-token scheme.
pub const BEARER_SCHEME: &str = "Bearer";

/// Prefix for API-key scheme names synthesized from group names.
pub const API_KEY_SCHEME_PREFIX: &str = "ApiKey-";

/// Synthesize the scheme name for an API-key group.
pub fn api_key_scheme_name(group: &str) -> String {
    format!("{API_KEY_SCHEME_PREFIX}{group}")
}

/// Kind of credential a scheme validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    Bearer,
    ApiKey,
}

/// A named credential mechanism and its validation strategy.
pub struct CredentialScheme {
    name: String,
    validator: SchemeValidator,
}

/// Validation strategy backing a scheme.
pub enum SchemeValidator {
    Bearer(Arc<JwtAuthenticator>),
    ApiKey(ApiKeyAuthenticator),
}

impl CredentialScheme {
    pub fn bearer(authenticator: Arc<JwtAuthenticator>) -> Self {
        Self {
            name: BEARER_SCHEME.to_string(),
            validator: SchemeValidator::Bearer(authenticator),
        }
    }

    pub fn api_key(authenticator: ApiKeyAuthenticator) -> Self {
        Self {
            name: authenticator.scheme_name().to_string(),
            validator: SchemeValidator::ApiKey(authenticator),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SchemeKind {
        match self.validator {
            SchemeValidator::Bearer(_) => SchemeKind::Bearer,
            SchemeValidator::ApiKey(_) => SchemeKind::ApiKey,
        }
    }

    /// Run this scheme's authenticator against the request headers.
    ///
    /// Pure, in-memory computation; no I/O and no suspension.
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult {
        match &self.validator {
            SchemeValidator::Bearer(jwt) => jwt.authenticate(headers),
            SchemeValidator::ApiKey(api_key) => api_key.authenticate(headers),
        }
    }
}

/// Builder for the frozen [`SchemeRegistry`].
#[derive(Default)]
pub struct SchemeRegistryBuilder {
    schemes: HashMap<String, CredentialScheme>,
}

impl SchemeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scheme, failing on a name collision.
    pub fn register(&mut self, scheme: CredentialScheme) -> Result<(), ConfigError> {
        let name = scheme.name().to_string();
        if self.schemes.contains_key(&name) {
            return Err(ConfigError::DuplicateScheme(name));
        }
        self.schemes.insert(name, scheme);
        Ok(())
    }

    /// Freeze the registry. No further writes are possible afterwards.
    pub fn build(self) -> SchemeRegistry {
        SchemeRegistry {
            schemes: self.schemes,
        }
    }
}

/// Immutable scheme table, built once at startup.
pub struct SchemeRegistry {
    schemes: HashMap<String, CredentialScheme>,
}

impl SchemeRegistry {
    /// Look up a scheme by name.
    pub fn resolve(&self, name: &str) -> Result<&CredentialScheme, AuthError> {
        self.schemes.get(name).ok_or(AuthError::SchemeNotFound)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    /// Registered scheme names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderConventions;

    fn billing_scheme() -> CredentialScheme {
        let authenticator = ApiKeyAuthenticator::new(
            api_key_scheme_name("Billing"),
            ["secret-1".to_string()],
            &HeaderConventions::default(),
        )
        .unwrap();
        CredentialScheme::api_key(authenticator)
    }

    #[test]
    fn scheme_name_convention() {
        assert_eq!(api_key_scheme_name("Billing"), "ApiKey-Billing");
        assert_eq!(api_key_scheme_name("AdminAccess"), "ApiKey-AdminAccess");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut builder = SchemeRegistryBuilder::new();
        builder.register(billing_scheme()).unwrap();

        let result = builder.register(billing_scheme());
        assert!(matches!(result, Err(ConfigError::DuplicateScheme(name)) if name == "ApiKey-Billing"));
    }

    #[test]
    fn resolve_unknown_scheme() {
        let registry = SchemeRegistryBuilder::new().build();
        assert!(matches!(
            registry.resolve("ApiKey-Billing"),
            Err(AuthError::SchemeNotFound)
        ));
    }

    #[test]
    fn resolve_registered_scheme() {
        let mut builder = SchemeRegistryBuilder::new();
        builder.register(billing_scheme()).unwrap();
        let registry = builder.build();

        let scheme = registry.resolve("ApiKey-Billing").unwrap();
        assert_eq!(scheme.kind(), SchemeKind::ApiKey);
        assert!(registry.contains("ApiKey-Billing"));
        assert_eq!(registry.len(), 1);
    }
}
