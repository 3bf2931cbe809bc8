//! HTTP server bootstrap for Payments Point.
//!
//! This module wires together:
//! - configuration (fail-fast validation before any traffic is served)
//! - the frozen scheme registry and policy set
//! - the Axum router, with the authentication pipeline per route group

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::auth::{
    authorize, policies, PipelineState, PolicySet, PrincipalExt, SchemeRegistry,
    API_KEY_SCHEME_PREFIX,
};
use crate::config::AuthSettings;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Path to the JSON authentication configuration document.
    pub auth_config_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let auth_config_path = std::env::var("AUTH_CONFIG_PATH")
            .unwrap_or_else(|_| "auth.json".to_string())
            .into();

        Self {
            listen_addr,
            auth_config_path,
        }
    }
}

/// Start the HTTP server.
///
/// Any configuration error is fatal: the process exits before binding the
/// listener, so no request is ever served against an inconsistent security
/// configuration.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Payments Point v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();

    let raw = std::fs::read_to_string(&config.auth_config_path).with_context(|| {
        format!(
            "reading auth configuration from {}",
            config.auth_config_path.display()
        )
    })?;
    let settings = AuthSettings::from_json(&raw)?;

    let (registry, policy_set) = settings.build()?;
    info!(
        "Authentication configured: {} scheme(s), {} policy(ies)",
        registry.len(),
        policy_set.len()
    );

    let app = build_router(Arc::new(registry), Arc::new(policy_set))?;

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Payments Point is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Build the application router.
///
/// Policy names are resolved here, while the router is built; a route
/// referencing an unknown policy aborts startup rather than failing at
/// request time.
pub fn build_router(
    registry: Arc<SchemeRegistry>,
    policy_set: Arc<PolicySet>,
) -> anyhow::Result<Router> {
    let mut api = Router::new().merge(policy_routes(
        &registry,
        &policy_set,
        policies::ADMIN_OR_CUSTOMER_ACCESS,
        Router::new().route("/payments", get(list_payments)),
    )?);

    api = api.merge(policy_routes(
        &registry,
        &policy_set,
        policies::ADMIN_ACCESS,
        Router::new().route("/admin/payments", get(admin_payments)),
    )?);

    api = api.merge(policy_routes(
        &registry,
        &policy_set,
        policies::CUSTOMER_ACCESS,
        Router::new().route("/customer/payments", get(customer_payments)),
    )?);

    // One partner status route per API-key union policy.
    let partner_policies: Vec<String> = policy_set
        .iter()
        .filter(|p| p.name().starts_with(API_KEY_SCHEME_PREFIX))
        .map(|p| p.name().to_string())
        .collect();
    for name in partner_policies {
        let group = name.trim_start_matches(API_KEY_SCHEME_PREFIX);
        api = api.merge(policy_routes(
            &registry,
            &policy_set,
            &name,
            Router::new().route(&format!("/partner/{group}/status"), get(partner_status)),
        )?);
    }

    Ok(Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http()))
}

/// Wrap a route group in the authentication pipeline for the named policy.
fn policy_routes(
    registry: &Arc<SchemeRegistry>,
    policy_set: &Arc<PolicySet>,
    policy_name: &str,
    routes: Router,
) -> anyhow::Result<Router> {
    let policy = policy_set
        .get(policy_name)
        .ok_or_else(|| anyhow::anyhow!("route group references unknown policy {policy_name}"))?;

    let state = PipelineState {
        registry: registry.clone(),
        policy,
    };

    Ok(routes.route_layer(axum::middleware::from_fn_with_state(state, authorize)))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "payments-point",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_payments(
    Extension(PrincipalExt(principal)): Extension<PrincipalExt>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "payments": [],
        "caller": principal.name(),
        "roles": principal.roles().iter().collect::<Vec<_>>(),
    }))
}

async fn admin_payments(
    Extension(PrincipalExt(principal)): Extension<PrincipalExt>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "payments": [],
        "view": "admin",
        "caller": principal.name(),
    }))
}

async fn customer_payments(
    Extension(PrincipalExt(principal)): Extension<PrincipalExt>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "payments": [],
        "view": "customer",
        "caller": principal.name(),
    }))
}

async fn partner_status(
    Extension(PrincipalExt(principal)): Extension<PrincipalExt>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "scheme": principal.scheme(),
        "caller": principal.name(),
    }))
}
