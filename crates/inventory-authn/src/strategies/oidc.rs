//! Bearer token (OIDC access token) authentication.

use async_trait::async_trait;
use inventory_core::Identity;
use inventory_core::config::OidcConfig;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::debug;

use crate::{Authenticator, AuthnError, Credentials, Outcome};

/// Claims read from a verified token.
#[derive(Debug, Deserialize)]
struct Claims {
    preferred_username: Option<String>,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    /// Set on service accounts issued to reporters.
    #[serde(default)]
    reporter_type: Option<String>,
}

/// Verifies JWTs against a configured issuer, audience and signing key.
pub struct OidcAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl OidcAuthenticator {
    pub fn new(config: &OidcConfig) -> Result<Self, AuthnError> {
        let (key, algorithm) = match (&config.hs256_secret, &config.rs256_public_key_pem) {
            (Some(secret), None) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            (None, Some(pem)) => (
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| AuthnError::Config(format!("bad RS256 public key: {e}")))?,
                Algorithm::RS256,
            ),
            _ => {
                return Err(AuthnError::Config(
                    "oidc needs exactly one of hs256_secret or rs256_public_key_pem".to_string(),
                ));
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = config.leeway_secs;

        Ok(Self { key, validation })
    }
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    fn name(&self) -> &'static str {
        "oidc"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Outcome, AuthnError> {
        let Some(token) = credentials.bearer_token.as_deref() else {
            return Ok(Outcome::Ignore);
        };

        let claims = match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "bearer token rejected");
                return Ok(Outcome::Deny);
            }
        };

        let Some(principal) = claims.preferred_username.filter(|p| !p.is_empty()) else {
            debug!("bearer token without preferred_username");
            return Ok(Outcome::Deny);
        };

        let identity = Identity {
            tenant: claims.tenant.unwrap_or_default(),
            principal,
            groups: claims.groups.into_iter().collect(),
            is_reporter: claims.reporter_type.is_some(),
            is_guest: false,
            reporter_type: claims.reporter_type,
            href: None,
        };
        Ok(Outcome::Allow(identity))
    }
}
