//! Unauthenticated access.

use async_trait::async_trait;
use inventory_core::Identity;

use crate::{Authenticator, AuthnError, Credentials, Outcome};

/// Terminal strategy: admits anyone as a guest.
#[derive(Debug, Default)]
pub struct GuestAuthenticator;

impl GuestAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for GuestAuthenticator {
    fn name(&self) -> &'static str {
        "guest"
    }

    async fn authenticate(&self, _credentials: &Credentials) -> Result<Outcome, AuthnError> {
        Ok(Outcome::Allow(Identity::guest()))
    }
}
