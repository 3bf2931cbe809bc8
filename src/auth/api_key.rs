//! API key authentication
//!
//! Validates a presented shared secret against one named group of configured
//! keys. Keys are compared after trimming surrounding whitespace; any match
//! in the group's set authenticates. A key from one group never matches
//! another group's scheme.

use std::collections::HashSet;

use axum::http::HeaderMap;

use super::{AuthError, AuthResult, ClaimKind, Principal};
use crate::config::{ConfigError, HeaderConventions};

/// Authenticator for one named API-key scheme.
pub struct ApiKeyAuthenticator {
    scheme_name: String,
    keys: HashSet<String>,
    key_header: String,
    user_id_header: String,
}

impl ApiKeyAuthenticator {
    /// Build the authenticator from a group's configured keys.
    ///
    /// Keys are trimmed up front; a group whose keys are all empty after
    /// trimming is a fatal configuration error.
    pub fn new(
        scheme_name: impl Into<String>,
        keys: impl IntoIterator<Item = String>,
        headers: &HeaderConventions,
    ) -> Result<Self, ConfigError> {
        let scheme_name = scheme_name.into();
        let keys: HashSet<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(ConfigError::EmptyKeyGroup(scheme_name));
        }

        Ok(Self {
            scheme_name,
            keys,
            key_header: headers.api_key_header.clone(),
            user_id_header: headers.user_id_header.clone(),
        })
    }

    pub fn scheme_name(&self) -> &str {
        &self.scheme_name
    }

    /// Validate the presented key(s) against this scheme's key set.
    ///
    /// No header at all is [`AuthError::MissingCredential`]; the key set is
    /// not consulted in that case. Otherwise every candidate value is
    /// trimmed and tested for membership, and any match succeeds.
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult {
        let mut candidates = headers
            .get_all(self.key_header.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .peekable();

        if candidates.peek().is_none() {
            return Err(AuthError::MissingCredential);
        }

        if !candidates.any(|candidate| self.keys.contains(candidate.trim())) {
            return Err(AuthError::InvalidCredential);
        }

        let mut principal = Principal::new(&self.scheme_name);

        // Optional caller identity. Its absence leaves the principal
        // anonymous-within-scheme, which is still a valid outcome.
        if let Some(user_id) = headers
            .get(self.user_id_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            principal = principal
                .with_name(user_id)
                .with_claim(ClaimKind::UserId, user_id);
        }

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn billing_authenticator() -> ApiKeyAuthenticator {
        ApiKeyAuthenticator::new(
            "ApiKey-Billing",
            ["bk-1111".to_string(), "bk-2222".to_string()],
            &HeaderConventions::default(),
        )
        .unwrap()
    }

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("ApiKey", HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn valid_key_authenticates() {
        let authenticator = billing_authenticator();
        let principal = authenticator.authenticate(&headers_with_key("bk-1111")).unwrap();

        assert_eq!(principal.scheme(), "ApiKey-Billing");
        assert!(principal.is_anonymous());
        assert!(principal.roles().is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let authenticator = billing_authenticator();
        assert!(authenticator.authenticate(&headers_with_key("  bk-2222  ")).is_ok());
    }

    #[test]
    fn configured_keys_are_trimmed_too() {
        let authenticator = ApiKeyAuthenticator::new(
            "ApiKey-Billing",
            ["  bk-3333 ".to_string()],
            &HeaderConventions::default(),
        )
        .unwrap();

        assert!(authenticator.authenticate(&headers_with_key("bk-3333")).is_ok());
    }

    #[test]
    fn unknown_key_is_invalid() {
        let authenticator = billing_authenticator();
        let result = authenticator.authenticate(&headers_with_key("rk-9999"));
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredential);
    }

    #[test]
    fn missing_header_is_missing_credential() {
        let authenticator = billing_authenticator();
        let result = authenticator.authenticate(&HeaderMap::new());
        assert_eq!(result.unwrap_err(), AuthError::MissingCredential);
    }

    #[test]
    fn any_candidate_may_match() {
        let authenticator = billing_authenticator();
        let mut headers = HeaderMap::new();
        headers.append("ApiKey", HeaderValue::from_static("wrong"));
        headers.append("ApiKey", HeaderValue::from_static("bk-1111"));

        assert!(authenticator.authenticate(&headers).is_ok());
    }

    #[test]
    fn caller_identity_header_populates_claims() {
        let authenticator = billing_authenticator();
        let mut headers = headers_with_key("bk-1111");
        headers.insert("UserId", HeaderValue::from_static(" billing-bot "));

        let principal = authenticator.authenticate(&headers).unwrap();
        assert_eq!(principal.name(), Some("billing-bot"));
        assert_eq!(principal.claim(ClaimKind::UserId), Some("billing-bot"));
        assert!(!principal.is_anonymous());
    }

    #[test]
    fn empty_group_is_a_configuration_error() {
        let result = ApiKeyAuthenticator::new(
            "ApiKey-Billing",
            ["   ".to_string()],
            &HeaderConventions::default(),
        );
        assert!(matches!(result, Err(ConfigError::EmptyKeyGroup(_))));
    }
}
