//! # usher: privileged account provisioning
//!
//! `usher` is the admin gateway through which platform accounts are created. It exposes a single
//! privileged operation — `POST /admin/users` — that provisions a new account across two external
//! services that cannot be updated atomically: the **identity store** (credentials, token
//! verification, admin account API) and the **profile store** (application-level profile rows,
//! including the role used for authorization).
//!
//! ## Request Flow
//!
//! A provisioning request passes through five stages, strictly in order:
//!
//! 1. **Gate**: the route admits `POST` (and CORS preflight `OPTIONS`); anything else is a JSON
//!    405. The body decodes into the typed [`api::models::users::UserCreate`] schema.
//! 2. **Authorization**: the [`auth::RequiresAdmin`] extractor resolves the caller — bearer token
//!    verified against the identity store, role looked up in the profile store — and admits only
//!    administrators. Anything that prevents establishing the role fails closed.
//! 3. **The saga**: [`provisioning::Provisioner`] creates the identity record, then inserts the
//!    profile row keyed by the new id. If the profile insert fails, the identity record is deleted
//!    again, so a failed request leaves nothing behind.
//! 4. **Audit**: [`audit::Auditor`] appends an audit event for the successful creation. The append
//!    is best effort and never changes the response.
//! 5. **Response**: every outcome maps deterministically to a status and a JSON body through
//!    [`errors::Error`]; every response carries the configured CORS grant, and panics anywhere in
//!    the stack are converted into the catch-all 500.
//!
//! The stores are trait seams ([`stores::IdentityStore`], [`stores::ProfileStore`],
//! [`stores::AuditSink`]) with `reqwest` implementations, so the whole flow is testable against
//! in-memory doubles.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use usher::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = usher::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     usher::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod errors;
mod openapi;
pub mod provisioning;
pub mod stores;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::audit::Auditor;
use crate::config::CorsOrigin;
use crate::openapi::ApiDoc;
use crate::provisioning::Provisioner;
use crate::stores::{AuditSink, HttpAuditSink, HttpIdentityStore, HttpProfileStore, IdentityStore, ProfileStore};
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bon::Builder;
pub use config::Config;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::UserId;

/// Application state shared across all request handlers.
///
/// Holds the configuration and one handle per external store, built once at
/// startup. The store handles are trait objects so tests can substitute
/// in-memory doubles.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    /// The provisioning saga over this state's stores.
    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(self.identity.clone(), self.profiles.clone())
    }

    /// The audit recorder over this state's sink.
    pub fn auditor(&self) -> Auditor {
        Auditor::new(self.audit.clone())
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins are scheme://host[:port], without the URL's trailing slash
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut headers = Vec::new();
    for header in &cors.allow_headers {
        headers.push(header.parse::<HeaderName>()?);
    }

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .allow_credentials(cors.allow_credentials);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Convert a handler panic into the catch-all 500 so the caller still gets
/// exactly one JSON response (with the CORS grant, since the panic layer
/// sits inside the CORS layer).
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!("Handler panicked: {details}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({ "error": "Internal server error", "details": details })),
    )
        .into_response()
}

/// Build the application router with all endpoints and middleware.
///
/// The provisioning route carries a method fallback producing the JSON 405
/// and an `OPTIONS` handler for stray non-preflight requests; real CORS
/// preflights are answered by the CORS layer before routing. Layer order,
/// innermost out: panic catching, CORS, tracing — so panic responses still
/// carry the CORS grant.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/admin/users",
            post(api::handlers::users::create_user)
                .options(api::handlers::users::preflight)
                .fallback(api::handlers::users::method_not_allowed),
        )
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Ok(apply_middleware(router, cors_layer))
}

/// Middleware stack, innermost out: panic catching, CORS, tracing.
fn apply_middleware(router: Router, cors_layer: CorsLayer) -> Router {
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns the router and lifecycle.
///
/// 1. **Create**: [`Application::new`] builds the store clients from config
///    and assembles the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityStore> = Arc::new(HttpIdentityStore::new(&config.identity_store));
        let profiles: Arc<dyn ProfileStore> = Arc::new(HttpProfileStore::new(&config.profile_store));
        let audit: Arc<dyn AuditSink> = Arc::new(HttpAuditSink::new(&config.audit_sink));

        let state = AppState::builder()
            .config(config.clone())
            .identity(identity)
            .profiles(profiles)
            .audit(audit)
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Usher listening on http://{}", bind_addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
