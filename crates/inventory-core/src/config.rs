//! inventory.toml configuration parser.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Identity;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub authn: AuthnConfig,
    pub eventing: EventingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Prefix of every resource route, e.g. `/api/inventory/v1`.
    pub base_path: String,
    /// Deadline for store work done on behalf of one request.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 9080)),
            base_path: "/api/inventory/v1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// redb file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthnConfig {
    /// Accept client certificates presented to the TLS terminator.
    pub client_cert: bool,
    /// Admit unauthenticated callers as guests once every strategy ignored.
    pub allow_guest: bool,
    pub psk: Option<PskConfig>,
    pub oidc: Option<OidcConfig>,
}

impl Default for AuthnConfig {
    fn default() -> Self {
        Self {
            client_cert: true,
            allow_guest: false,
            psk: None,
            oidc: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PskConfig {
    /// TOML file with a `[keys.<key>]` table per pre-shared key.
    pub file: Option<PathBuf>,
    /// Inline keys, merged with (and overridden by) the file.
    pub keys: BTreeMap<String, Identity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    pub issuer: String,
    /// Expected `aud` claim.
    pub client_id: String,
    pub hs256_secret: Option<String>,
    pub rs256_public_key_pem: Option<String>,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventerKind {
    #[default]
    Stdout,
    Channel,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventingConfig {
    pub eventer: EventerKind,
    /// Upper bound on a single produce call.
    pub timeout_ms: u64,
    /// Buffer size of the in-process channel producer.
    pub channel_capacity: usize,
}

impl Default for EventingConfig {
    fn default() -> Self {
        Self {
            eventer: EventerKind::Stdout,
            timeout_ms: 2000,
            channel_capacity: 1024,
        }
    }
}

impl InventoryConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InventoryConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Vec<String> {
        let mut errs = Vec::new();

        let base = &self.server.base_path;
        if !base.starts_with('/') {
            errs.push(format!("server.base_path must start with '/': {base:?}"));
        }
        if base.len() > 1 && base.ends_with('/') {
            errs.push(format!("server.base_path must not end with '/': {base:?}"));
        }
        if self.server.request_timeout_secs == 0 {
            errs.push("server.request_timeout_secs must be > 0".to_string());
        }

        if let Some(psk) = &self.authn.psk {
            if psk.file.is_none() && psk.keys.is_empty() {
                errs.push("authn.psk requires a file or at least one inline key".to_string());
            }
            for (key, identity) in &psk.keys {
                if key.is_empty() {
                    errs.push("authn.psk.keys contains an empty key".to_string());
                }
                if identity.principal.is_empty() {
                    errs.push("authn.psk.keys entries need a principal".to_string());
                }
            }
        }

        if let Some(oidc) = &self.authn.oidc {
            if oidc.issuer.is_empty() {
                errs.push("authn.oidc.issuer must not be empty".to_string());
            }
            if oidc.client_id.is_empty() {
                errs.push("authn.oidc.client_id must not be empty".to_string());
            }
            match (&oidc.hs256_secret, &oidc.rs256_public_key_pem) {
                (Some(_), Some(_)) => errs.push(
                    "authn.oidc takes either hs256_secret or rs256_public_key_pem, not both"
                        .to_string(),
                ),
                (None, None) => errs.push(
                    "authn.oidc requires hs256_secret or rs256_public_key_pem".to_string(),
                ),
                _ => {}
            }
        }

        if self.eventing.timeout_ms == 0 {
            errs.push("eventing.timeout_ms must be > 0".to_string());
        }
        if self.eventing.eventer == EventerKind::Channel && self.eventing.channel_capacity == 0 {
            errs.push("eventing.channel_capacity must be > 0".to_string());
        }

        errs
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn emit_timeout(&self) -> Duration {
        Duration::from_millis(self.eventing.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = InventoryConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.server.base_path, "/api/inventory/v1");
        assert!(config.authn.client_cert);
        assert!(!config.authn.allow_guest);
    }

    #[test]
    fn parse_minimal() {
        let config: InventoryConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.address.port(), 9080);
        assert!(config.storage.path.is_none());
        assert_eq!(config.eventing.eventer, EventerKind::Stdout);
    }

    #[test]
    fn parse_full() {
        let toml_str = r#"
[server]
address = "127.0.0.1:8000"
base_path = "/inventory"

[storage]
path = "/tmp/inv.redb"

[authn]
allow_guest = true

[authn.psk.keys.abc123]
principal = "acm-east"
reporter_type = "ACM"
is_reporter = true

[authn.oidc]
issuer = "https://sso.example.com"
client_id = "inventory"
hs256_secret = "s3cret"

[eventing]
eventer = "none"
timeout_ms = 500
"#;
        let config: InventoryConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        let psk = config.authn.psk.unwrap();
        assert_eq!(psk.keys["abc123"].reporter_type.as_deref(), Some("ACM"));
        assert_eq!(config.eventing.eventer, EventerKind::None);
        assert_eq!(config.server.base_path, "/inventory");
    }

    #[test]
    fn unknown_eventer_is_rejected() {
        let result: Result<InventoryConfig, _> = toml::from_str("[eventing]\neventer = \"kafka\"");
        assert!(result.is_err());
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = InventoryConfig::default();
        config.server.base_path = "api/".to_string();
        config.server.request_timeout_secs = 0;
        config.authn.oidc = Some(OidcConfig::default());
        config.eventing.timeout_ms = 0;

        let errs = config.validate();
        // base_path (x2), timeout, issuer, client_id, key material, eventing timeout
        assert_eq!(errs.len(), 7, "{errs:?}");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = InventoryConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("base_path"));
        let back: InventoryConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.server.base_path, config.server.base_path);
    }
}
