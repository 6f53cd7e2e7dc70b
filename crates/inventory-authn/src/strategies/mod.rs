//! Concrete authenticator strategies.

mod client_cert;
mod guest;
mod oidc;
mod psk;

pub use client_cert::ClientCertAuthenticator;
pub use guest::GuestAuthenticator;
pub use oidc::OidcAuthenticator;
pub use psk::PreSharedKeyAuthenticator;
