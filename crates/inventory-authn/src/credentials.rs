//! Credential material extracted from a request.

use std::fmt;

/// Header carrying a pre-shared key.
pub const PSK_HEADER: &str = "x-inventory-psk";

/// Subject of a client certificate that the TLS terminator already
/// verified against the configured CA.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerCertificate {
    pub common_name: String,
    pub organizations: Vec<String>,
}

/// Everything a strategy may look at. Absent fields mean the caller did
/// not present that kind of credential.
#[derive(Clone, Default)]
pub struct Credentials {
    pub peer_certificate: Option<PeerCertificate>,
    pub pre_shared_key: Option<String>,
    pub bearer_token: Option<String>,
}

impl Credentials {
    pub fn with_peer_certificate(mut self, cert: PeerCertificate) -> Self {
        self.peer_certificate = Some(cert);
        self
    }

    pub fn with_pre_shared_key(mut self, key: impl Into<String>) -> Self {
        self.pre_shared_key = Some(key.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Parse an `Authorization` header value, accepting only the bearer scheme.
    pub fn bearer_from_authorization(value: &str) -> Option<String> {
        let (scheme, token) = value.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("peer_certificate", &self.peer_certificate)
            .field("pre_shared_key", &self.pre_shared_key.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
