//! Request authentication pipeline for Axum
//!
//! Single entry point per inbound request: runs the authenticators allowed
//! by the route's policy, feeds the outcome to the policy engine, and either
//! attaches the [`Principal`] to the request or converts the denial into a
//! rejection response.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthResult, DenyReason, Policy, Principal, SchemeRegistry, Verdict};

/// Response header set exactly when a bearer token was rejected as expired.
/// Lets clients distinguish "refresh the token" from "credential is wrong".
pub const EXPIRED_TOKEN_HEADER: &str = "Token-Expired";

/// Principal extension inserted into allowed requests.
#[derive(Clone)]
pub struct PrincipalExt(pub Principal);

/// Pipeline configuration for one route group.
///
/// The policy is resolved by name while the router is built, so an unknown
/// policy name fails at startup, never at request time. Registry and policy
/// are frozen at startup; sharing them here is lock-free.
#[derive(Clone)]
pub struct PipelineState {
    pub registry: Arc<SchemeRegistry>,
    pub policy: Arc<Policy>,
}

/// Authentication pipeline middleware.
pub async fn authorize(
    State(state): State<PipelineState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = authenticate(&state.registry, &state.policy, request.headers());

    match state.policy.evaluate(outcome) {
        Verdict::Allow(principal) => {
            request.extensions_mut().insert(PrincipalExt(principal));
            next.run(request).await
        }
        Verdict::Deny(reason) => deny_response(reason),
    }
}

/// Try each of the policy's allowed schemes in declared order.
///
/// The first success is adopted. If every scheme fails, the failure reason
/// of the first attempted scheme is surfaced; later, possibly more specific
/// failures are deliberately discarded because downstream clients depend on
/// the current failure-reason semantics.
pub fn authenticate(registry: &SchemeRegistry, policy: &Policy, headers: &HeaderMap) -> AuthResult {
    let mut first_failure: Option<AuthError> = None;

    for name in policy.allowed_schemes() {
        let scheme = match registry.resolve(name) {
            Ok(scheme) => scheme,
            Err(e) => {
                first_failure.get_or_insert(e);
                continue;
            }
        };

        match scheme.authenticate(headers) {
            Ok(principal) => return Ok(principal),
            Err(e) => {
                first_failure.get_or_insert(e);
            }
        }
    }

    Err(first_failure.unwrap_or(AuthError::SchemeNotFound))
}

/// Convert a denial into a rejection response.
///
/// Authentication-layer denials map to 401, authorization-layer denials to
/// 403; the body carries only the coarse reason category.
fn deny_response(reason: DenyReason) -> Response {
    let status = if reason.is_authentication() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::FORBIDDEN
    };

    let mut response = (
        status,
        axum::Json(serde_json::json!({
            "error": reason.message(),
            "code": reason.code(),
        })),
    )
        .into_response();

    if reason == DenyReason::ExpiredCredential {
        response.headers_mut().insert(
            HeaderName::from_static("token-expired"),
            HeaderValue::from_static("true"),
        );
    }

    response
}
