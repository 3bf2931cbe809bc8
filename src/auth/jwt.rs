//! Bearer token authentication
//!
//! Validates the signature, issuer, audience, and lifetime of a presented
//! token. Lifetime is enforced with zero clock skew, and an expired token is
//! reported as [`AuthError::ExpiredCredential`] — distinct from every other
//! invalid-token outcome — so the pipeline can tell clients "retry with a
//! refreshed token" apart from "credential is fundamentally wrong".

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthResult, ClaimKind, Principal, BEARER_SCHEME};
use crate::config::{ConfigError, JwtSettings};

/// Token payload for the payments API.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (caller identity)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Granted roles
    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(
        default,
        rename = "Company_Customer_Id",
        skip_serializing_if = "Option::is_none"
    )]
    pub customer_id: Option<String>,

    #[serde(
        default,
        rename = "Company_Admin_Id",
        skip_serializing_if = "Option::is_none"
    )]
    pub admin_id: Option<String>,

    #[serde(
        default,
        rename = "Company_Session_Id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,

    #[serde(
        default,
        rename = "Company_User_Id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
}

/// Bearer token validator.
///
/// Validation only; token issuing belongs to the identity provider.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Build the validator from startup settings.
    ///
    /// An absent or empty signing key is a fatal configuration error.
    pub fn new(settings: &JwtSettings) -> Result<Self, ConfigError> {
        if settings.key.trim().is_empty() {
            return Err(ConfigError::MissingSigningKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Strict expiry: no grace window around `exp`.
        validation.leeway = 0;
        validation.set_issuer(&[&settings.issuer]);
        validation.set_audience(&[&settings.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        if !settings.require_signature {
            validation.insecure_disable_signature_validation();
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(settings.key.as_bytes()),
            validation,
        })
    }

    /// Validate the bearer token carried in the `Authorization` header.
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let data =
            decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AuthError::ExpiredCredential
                    }
                    _ => AuthError::InvalidCredential,
                }
            })?;

        Ok(principal_from_claims(data.claims))
    }
}

/// Map validated token claims onto a request principal.
///
/// Roles and claims come straight from the token; no lookup happens here.
fn principal_from_claims(claims: TokenClaims) -> Principal {
    let mut principal = Principal::new(BEARER_SCHEME).with_name(claims.sub);

    if let Some(customer_id) = claims.customer_id {
        principal = principal.with_claim(ClaimKind::CustomerId, customer_id);
    }
    if let Some(admin_id) = claims.admin_id {
        principal = principal.with_claim(ClaimKind::AdminId, admin_id);
    }
    if let Some(session_id) = claims.session_id {
        principal = principal.with_claim(ClaimKind::SessionId, session_id);
    }
    if let Some(user_id) = claims.user_id {
        principal = principal.with_claim(ClaimKind::UserId, user_id);
    }

    for role in claims.roles {
        principal = principal.with_role(role);
    }

    principal
}
