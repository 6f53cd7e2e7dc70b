//! Authentication error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthnError {
    /// A strategy could not be built from its configuration.
    #[error("authenticator configuration error: {0}")]
    Config(String),

    /// Verification could not be completed (key material, key server, ...).
    #[error("verification failed: {0}")]
    Verification(String),
}
