//! inventory-api — REST API for the common inventory.
//!
//! Every route under the base path runs behind the authentication
//! middleware, which resolves the caller through the
//! [`AuthenticatorChain`] and stores the resulting `Identity` as a
//! request extension.
//!
//! Every request, health checks included, gets an `x-request-id` (kept when the
//! client sent one) that is echoed on the response and recorded on the
//! request's tracing span together with method, path and principal.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `{base}/resources?page=N&size=M` | List resources |
//! | POST | `{base}/resources` | Report a new resource |
//! | GET | `{base}/resources/{ref}` | Get a resource by id or hcrn |
//! | PUT | `{base}/resources/{ref}` | Report changes to a resource |
//! | DELETE | `{base}/resources/{ref}` | Delete a resource |
//! | GET | `{base}/workspaces?page=N&size=M` | List workspaces |
//! | POST | `{base}/workspaces` | Create a workspace |
//! | GET | `{base}/workspaces/{id}` | Get a workspace |
//! | PUT | `{base}/workspaces/{id}` | Rename or move a workspace |
//! | DELETE | `{base}/workspaces/{id}` | Delete a childless workspace |
//! | GET | `/livez` | Liveness (unauthenticated) |
//! | GET | `/readyz` | Readiness (unauthenticated) |

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::middleware;
use axum::routing::get;
use inventory_authn::AuthenticatorChain;
use inventory_core::config::ServerConfig;
use inventory_eventing::EventGateway;
use inventory_reconcile::ReconciliationEngine;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

pub use error::ApiError;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: ReconciliationEngine,
    pub chain: Arc<AuthenticatorChain>,
    pub gateway: Arc<EventGateway>,
    /// Base path without a trailing slash; empty when mounted at the root.
    pub base_path: Arc<str>,
    /// Upper bound on a single store call.
    pub request_timeout: Duration,
}

impl ApiState {
    pub fn new(
        engine: ReconciliationEngine,
        chain: AuthenticatorChain,
        gateway: EventGateway,
        server: &ServerConfig,
    ) -> Self {
        Self {
            engine,
            chain: Arc::new(chain),
            gateway: Arc::new(gateway),
            base_path: server.base_path.trim_end_matches('/').into(),
            request_timeout: Duration::from_secs(server.request_timeout_secs),
        }
    }

    /// Canonical location of a resource.
    pub fn href(&self, id: u64) -> String {
        format!("{}/resources/{id}", self.base_path)
    }

    pub fn workspace_href(&self, id: u64) -> String {
        format!("{}/workspaces/{id}", self.base_path)
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/resources/{reference}",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .route(
            "/workspaces",
            get(handlers::list_workspaces).post(handlers::create_workspace),
        )
        .route(
            "/workspaces/{id}",
            get(handlers::get_workspace)
                .put(handlers::update_workspace)
                .delete(handlers::delete_workspace),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .with_state(state.clone());

    let router = if state.base_path.is_empty() {
        Router::new().merge(api_routes)
    } else {
        Router::new().nest(&state.base_path, api_routes)
    };

    router
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz).with_state(state))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Span for one request. `principal` is filled in once authentication ran.
fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    tracing::info_span!(
        "request",
        request_id,
        method = %request.method(),
        path = %request.uri().path(),
        principal = Empty,
    )
}
