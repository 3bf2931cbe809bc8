//! Startup configuration for the authentication layer
//!
//! Configuration is bound with serde and validated in two phases: each
//! section is bound and locally validated first, then a global consistency
//! pass runs across the fully-built registry and policy set. Any
//! inconsistency rejects the whole configuration; the process never serves
//! traffic with an inconsistent security configuration.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::{
    api_key_scheme_name, roles, ApiKeyAuthenticator, CredentialScheme, JwtAuthenticator, Policy,
    PolicySet, SchemeRegistry, SchemeRegistryBuilder, BEARER_SCHEME,
};
use crate::auth::policies;

/// Fatal configuration error. Surfaced at startup only; the process does
/// not start with an invalid security configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate scheme: {0}")]
    DuplicateScheme(String),

    #[error("duplicate policy: {0}")]
    DuplicatePolicy(String),

    #[error("api key scheme {0} must have at least one non-empty key")]
    EmptyKeyGroup(String),

    #[error("jwt signing key must be present and non-empty")]
    MissingSigningKey,

    #[error("policy {0} must allow at least one scheme")]
    EmptyPolicy(String),

    #[error("policy {policy} references unregistered scheme {scheme}")]
    UnknownScheme { policy: String, scheme: String },
}

/// Token validation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    pub issuer: String,
    pub audience: String,
    /// HMAC signing key. Required and non-empty.
    pub key: String,
    #[serde(default = "default_true")]
    pub require_signature: bool,
}

/// A named group of shared secrets. Registered as scheme `ApiKey-<name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyGroup {
    pub name: String,
    pub keys: Vec<String>,
}

/// Configurable names of the inbound credential headers.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderConventions {
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

impl Default for HeaderConventions {
    fn default() -> Self {
        Self {
            api_key_header: default_api_key_header(),
            user_id_header: default_user_id_header(),
        }
    }
}

/// Declarative policy definition.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    /// Schemes in the order authentication should attempt them.
    pub allowed_schemes: Vec<String>,
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default)]
    pub require_authenticated: bool,
}

/// Root configuration document for the authentication layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt: JwtSettings,
    #[serde(default)]
    pub api_key_groups: Vec<ApiKeyGroup>,
    /// Declared policies. When empty, the stock payments policy set is
    /// synthesized from the registered schemes.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    #[serde(default)]
    pub headers: HeaderConventions,
}

impl AuthSettings {
    /// Parse a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate the configuration and freeze it into the registry and
    /// policy set shared by all request handlers.
    pub fn build(&self) -> Result<(SchemeRegistry, PolicySet), ConfigError> {
        // Phase one: bind and locally validate each section.
        let jwt = JwtAuthenticator::new(&self.jwt)?;

        let mut builder = SchemeRegistryBuilder::new();
        builder.register(CredentialScheme::bearer(Arc::new(jwt)))?;

        for group in &self.api_key_groups {
            let authenticator = ApiKeyAuthenticator::new(
                api_key_scheme_name(&group.name),
                group.keys.iter().cloned(),
                &self.headers,
            )?;
            builder.register(CredentialScheme::api_key(authenticator))?;
        }

        let registry = builder.build();

        let policy_configs = if self.policies.is_empty() {
            default_policies(&self.api_key_groups)
        } else {
            self.policies.clone()
        };

        let mut declared = Vec::with_capacity(policy_configs.len());
        for config in policy_configs {
            if config.allowed_schemes.is_empty() {
                return Err(ConfigError::EmptyPolicy(config.name));
            }
            let mut policy = Policy::new(config.name, config.allowed_schemes);
            for role in config.required_roles {
                policy = policy.require_role(role);
            }
            if config.require_authenticated {
                policy = policy.require_authenticated();
            }
            declared.push(policy);
        }
        let policy_set = PolicySet::new(declared)?;

        // Phase two: global consistency across registry and policies.
        // A dangling scheme reference rejects the configuration atomically.
        for policy in policy_set.iter() {
            for scheme in policy.allowed_schemes() {
                if !registry.contains(scheme) {
                    return Err(ConfigError::UnknownScheme {
                        policy: policy.name().to_string(),
                        scheme: scheme.clone(),
                    });
                }
            }
        }

        Ok((registry, policy_set))
    }
}

/// Stock policy set of the payments API: the three bearer role policies
/// plus one union policy per API-key group.
fn default_policies(groups: &[ApiKeyGroup]) -> Vec<PolicyConfig> {
    let mut configs = vec![
        PolicyConfig {
            name: policies::ADMIN_ACCESS.to_string(),
            allowed_schemes: vec![BEARER_SCHEME.to_string()],
            required_roles: vec![roles::ADMIN.to_string()],
            require_authenticated: true,
        },
        PolicyConfig {
            name: policies::CUSTOMER_ACCESS.to_string(),
            allowed_schemes: vec![BEARER_SCHEME.to_string()],
            required_roles: vec![roles::CUSTOMER.to_string()],
            require_authenticated: true,
        },
        PolicyConfig {
            name: policies::ADMIN_OR_CUSTOMER_ACCESS.to_string(),
            allowed_schemes: vec![BEARER_SCHEME.to_string()],
            required_roles: vec![roles::ADMIN.to_string(), roles::CUSTOMER.to_string()],
            require_authenticated: true,
        },
    ];

    for group in groups {
        let scheme = api_key_scheme_name(&group.name);
        configs.push(PolicyConfig {
            name: scheme.clone(),
            allowed_schemes: vec![BEARER_SCHEME.to_string(), scheme],
            required_roles: Vec::new(),
            // Key-based callers may omit the caller-identity header, so the
            // union policy does not insist on an identified principal.
            require_authenticated: false,
        });
    }

    configs
}

fn default_true() -> bool {
    true
}

fn default_api_key_header() -> String {
    "ApiKey".to_string()
}

fn default_user_id_header() -> String {
    "UserId".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> AuthSettings {
        AuthSettings::from_json(
            r#"{
                "jwt": {
                    "issuer": "payments-point",
                    "audience": "payments-api",
                    "key": "test-signing-key"
                },
                "api_key_groups": [
                    { "name": "Billing", "keys": ["bk-1111", "bk-2222"] },
                    { "name": "Reporting", "keys": ["rk-3333"] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_registry_and_default_policies() {
        let (registry, policies) = base_settings().build().unwrap();

        assert!(registry.contains(BEARER_SCHEME));
        assert!(registry.contains("ApiKey-Billing"));
        assert!(registry.contains("ApiKey-Reporting"));
        assert_eq!(registry.len(), 3);

        // Three bearer role policies plus one per group.
        assert_eq!(policies.len(), 5);
        let billing = policies.get("ApiKey-Billing").unwrap();
        assert_eq!(
            billing.allowed_schemes().to_vec(),
            vec!["Bearer".to_string(), "ApiKey-Billing".to_string()]
        );
        assert!(!billing.requires_authenticated());

        let admin = policies.get("AdminAccess").unwrap();
        assert!(admin.requires_authenticated());
        assert!(admin.required_roles().contains("Admin"));
    }

    #[test]
    fn empty_key_group_fails_startup() {
        let mut settings = base_settings();
        settings.api_key_groups.push(ApiKeyGroup {
            name: "Empty".to_string(),
            keys: vec!["   ".to_string()],
        });

        assert!(matches!(
            settings.build(),
            Err(ConfigError::EmptyKeyGroup(name)) if name == "ApiKey-Empty"
        ));
    }

    #[test]
    fn duplicate_group_name_fails_startup() {
        let mut settings = base_settings();
        settings.api_key_groups.push(ApiKeyGroup {
            name: "Billing".to_string(),
            keys: vec!["other".to_string()],
        });

        assert!(matches!(
            settings.build(),
            Err(ConfigError::DuplicateScheme(name)) if name == "ApiKey-Billing"
        ));
    }

    #[test]
    fn dangling_policy_scheme_fails_startup() {
        let mut settings = base_settings();
        settings.policies = vec![PolicyConfig {
            name: "Ghost".to_string(),
            allowed_schemes: vec!["ApiKey-DoesNotExist".to_string()],
            required_roles: vec![],
            require_authenticated: false,
        }];

        assert!(matches!(
            settings.build(),
            Err(ConfigError::UnknownScheme { policy, scheme })
                if policy == "Ghost" && scheme == "ApiKey-DoesNotExist"
        ));
    }

    #[test]
    fn missing_signing_key_fails_startup() {
        let mut settings = base_settings();
        settings.jwt.key = String::new();

        assert!(matches!(
            settings.build(),
            Err(ConfigError::MissingSigningKey)
        ));
    }

    #[test]
    fn policy_without_schemes_fails_startup() {
        let mut settings = base_settings();
        settings.policies = vec![PolicyConfig {
            name: "NoSchemes".to_string(),
            allowed_schemes: vec![],
            required_roles: vec![],
            require_authenticated: true,
        }];

        assert!(matches!(
            settings.build(),
            Err(ConfigError::EmptyPolicy(name)) if name == "NoSchemes"
        ));
    }

    #[test]
    fn declared_policies_replace_defaults() {
        let mut settings = base_settings();
        settings.policies = vec![PolicyConfig {
            name: "BillingOnly".to_string(),
            allowed_schemes: vec!["ApiKey-Billing".to_string()],
            required_roles: vec![],
            require_authenticated: false,
        }];

        let (_, policies) = settings.build().unwrap();
        assert_eq!(policies.len(), 1);
        assert!(policies.get("AdminAccess").is_none());
        assert!(policies.get("BillingOnly").is_some());
    }

    #[test]
    fn header_names_are_configurable() {
        let settings = AuthSettings::from_json(
            r#"{
                "jwt": { "issuer": "i", "audience": "a", "key": "k" },
                "headers": { "api_key_header": "X-Api-Key", "user_id_header": "X-User-Id" }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.headers.api_key_header, "X-Api-Key");
        assert_eq!(settings.headers.user_id_header, "X-User-Id");
    }
}
