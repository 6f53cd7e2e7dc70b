//! Authentication middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use inventory_authn::{Credentials, Outcome, PSK_HEADER, PeerCertificate};
use inventory_reconcile::InventoryError;
use tracing::{Span, debug, info};

use crate::ApiState;
use crate::error::error_response;

/// Collect credential material from a request.
///
/// The peer certificate is expected as a [`PeerCertificate`] extension set
/// by whatever terminated TLS.
pub fn credentials_from(req: &Request) -> Credentials {
    let headers = req.headers();
    Credentials {
        peer_certificate: req.extensions().get::<PeerCertificate>().cloned(),
        pre_shared_key: headers
            .get(PSK_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        bearer_token: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(Credentials::bearer_from_authorization),
    }
}

/// Resolve the caller and attach the `Identity`, or answer 401.
pub async fn authenticate(State(state): State<ApiState>, mut req: Request, next: Next) -> Response {
    let credentials = credentials_from(&req);
    match state.chain.resolve(&credentials).await {
        Outcome::Allow(identity) => {
            debug!(
                principal = %identity.principal,
                guest = identity.is_guest,
                reporter = identity.is_reporter,
                "request authenticated"
            );
            Span::current().record("principal", identity.principal.as_str());
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Outcome::Deny | Outcome::Ignore => {
            info!(method = %req.method(), path = %req.uri().path(), "authentication denied");
            error_response(InventoryError::AuthenticationDenied)
        }
    }
}
