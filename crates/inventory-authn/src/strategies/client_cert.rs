//! Client certificate authentication.

use async_trait::async_trait;
use inventory_core::Identity;
use tracing::debug;

use crate::{Authenticator, AuthnError, Credentials, Outcome};

/// Admits callers whose client certificate the TLS layer verified.
///
/// Certificates are issued to reporters, so the identity is always marked
/// as a reporter. The subject organizations become the groups.
#[derive(Debug, Default)]
pub struct ClientCertAuthenticator;

impl ClientCertAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for ClientCertAuthenticator {
    fn name(&self) -> &'static str {
        "client-cert"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Outcome, AuthnError> {
        let Some(cert) = &credentials.peer_certificate else {
            return Ok(Outcome::Ignore);
        };
        if cert.common_name.trim().is_empty() {
            debug!("client certificate without a common name");
            return Ok(Outcome::Deny);
        }
        let identity = Identity::reporter(cert.common_name.clone())
            .with_groups(cert.organizations.iter().cloned());
        Ok(Outcome::Allow(identity))
    }
}
