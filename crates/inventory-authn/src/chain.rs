//! The identity resolution chain.

use std::sync::Arc;

use async_trait::async_trait;
use inventory_core::config::AuthnConfig;
use tracing::{debug, info, trace, warn};

use crate::strategies::{
    ClientCertAuthenticator, GuestAuthenticator, OidcAuthenticator, PreSharedKeyAuthenticator,
};
use crate::{Authenticator, AuthnError, Credentials, Outcome};

/// Ordered composite of authenticators. First non-`Ignore` answer wins.
///
/// The order is fixed when the chain is built. The terminal strategy is
/// kept apart so it can only ever run after every ordinary strategy
/// ignored the request.
#[derive(Clone)]
pub struct AuthenticatorChain {
    strategies: Vec<Arc<dyn Authenticator>>,
    terminal: Option<Arc<dyn Authenticator>>,
}

impl AuthenticatorChain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// Build the chain described by the `[authn]` config section.
    ///
    /// Order: client certificate, pre-shared key, OIDC, then guest as the
    /// terminal strategy when `allow_guest` is set.
    pub fn from_config(config: &AuthnConfig) -> Result<Self, AuthnError> {
        let mut builder = Self::builder();
        if config.client_cert {
            builder = builder.with(ClientCertAuthenticator::new());
        }
        if let Some(psk) = &config.psk {
            builder = builder.with(PreSharedKeyAuthenticator::from_config(psk)?);
        }
        if let Some(oidc) = &config.oidc {
            builder = builder.with(OidcAuthenticator::new(oidc)?);
        }
        if config.allow_guest {
            builder = builder.terminal(GuestAuthenticator::new());
        }
        let chain = builder.build();
        info!(strategies = ?chain.strategy_names(), "authenticator chain built");
        Ok(chain)
    }

    /// Strategy names in evaluation order, terminal last.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .chain(self.terminal.iter())
            .map(|s| s.name())
            .collect()
    }

    /// Resolve the caller. Only ever returns `Allow` or `Deny`.
    pub async fn resolve(&self, credentials: &Credentials) -> Outcome {
        for strategy in &self.strategies {
            match Self::consult(strategy.as_ref(), credentials).await {
                Outcome::Ignore => continue,
                decided => return decided,
            }
        }

        match &self.terminal {
            Some(terminal) => match Self::consult(terminal.as_ref(), credentials).await {
                Outcome::Ignore => {
                    debug!(strategy = terminal.name(), "terminal strategy ignored request");
                    Outcome::Deny
                }
                decided => decided,
            },
            None => {
                debug!("no strategy recognised the request and no terminal strategy configured");
                Outcome::Deny
            }
        }
    }

    async fn consult(strategy: &dyn Authenticator, credentials: &Credentials) -> Outcome {
        let name = strategy.name();
        match strategy.authenticate(credentials).await {
            Ok(Outcome::Ignore) => {
                trace!(strategy = name, "no applicable credentials");
                Outcome::Ignore
            }
            Ok(Outcome::Deny) => {
                info!(strategy = name, "credentials rejected");
                Outcome::Deny
            }
            Ok(Outcome::Allow(identity)) => {
                debug!(
                    strategy = name,
                    principal = %identity.principal,
                    guest = identity.is_guest,
                    "authenticated"
                );
                Outcome::Allow(identity)
            }
            Err(e) => {
                warn!(strategy = name, error = %e, "authenticator failed, denying request");
                Outcome::Deny
            }
        }
    }
}

/// A chain is itself an authenticator, so chains can be nested.
#[async_trait]
impl Authenticator for AuthenticatorChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Outcome, AuthnError> {
        Ok(self.resolve(credentials).await)
    }
}

#[derive(Default)]
pub struct ChainBuilder {
    strategies: Vec<Arc<dyn Authenticator>>,
    terminal: Option<Arc<dyn Authenticator>>,
}

impl ChainBuilder {
    /// Append a strategy after those already added.
    pub fn with(mut self, strategy: impl Authenticator + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Set the strategy consulted only when every other one ignored.
    pub fn terminal(mut self, strategy: impl Authenticator + 'static) -> Self {
        self.terminal = Some(Arc::new(strategy));
        self
    }

    pub fn build(self) -> AuthenticatorChain {
        AuthenticatorChain {
            strategies: self.strategies,
            terminal: self.terminal,
        }
    }
}
