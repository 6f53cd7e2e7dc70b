//! inventory-authn — decides who is making a request.
//!
//! An [`AuthenticatorChain`] holds a fixed, ordered list of
//! [`Authenticator`] strategies plus an optional terminal strategy. Each
//! strategy inspects the request's [`Credentials`] and answers with an
//! [`Outcome`]:
//!
//! | Outcome | Meaning | Chain behaviour |
//! |---|---|---|
//! | `Ignore` | no credential of this kind was presented | try the next strategy |
//! | `Deny` | credential recognised but rejected | stop, request denied |
//! | `Allow` | credential verified | stop, request admitted |
//!
//! A strategy that fails internally is treated as `Deny`. When every
//! strategy ignores, the terminal strategy (guest access) decides; with no
//! terminal strategy the request is denied.

pub mod chain;
pub mod credentials;
pub mod error;
pub mod strategies;

pub use chain::{AuthenticatorChain, ChainBuilder};
pub use credentials::{Credentials, PeerCertificate, PSK_HEADER};
pub use error::AuthnError;
pub use strategies::{
    ClientCertAuthenticator, GuestAuthenticator, OidcAuthenticator, PreSharedKeyAuthenticator,
};

use async_trait::async_trait;
use inventory_core::Identity;

/// The verdict of a single strategy or of the whole chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Ignore,
}

/// A decision, carrying the resolved identity when it is `Allow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allow(Identity),
    Deny,
    Ignore,
}

impl Outcome {
    pub fn decision(&self) -> Decision {
        match self {
            Outcome::Allow(_) => Decision::Allow,
            Outcome::Deny => Decision::Deny,
            Outcome::Ignore => Decision::Ignore,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Outcome::Allow(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Outcome::Allow(identity) => Some(identity),
            _ => None,
        }
    }
}

/// One way of verifying a caller.
///
/// Implementations must not mutate shared state: the chain calls them
/// concurrently from every request task.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspect the credentials. `Err` is treated as `Deny` by the chain.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Outcome, AuthnError>;
}
