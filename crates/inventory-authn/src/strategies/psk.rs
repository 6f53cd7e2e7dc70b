//! Pre-shared key authentication.
//!
//! Keys map to fixed identities. Only the SHA-256 digest of each key is
//! held in memory; presented keys are hashed and looked up.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use inventory_core::Identity;
use inventory_core::config::PskConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{Authenticator, AuthnError, Credentials, Outcome};

type KeyDigest = [u8; 32];

fn digest(key: &str) -> KeyDigest {
    Sha256::digest(key.as_bytes()).into()
}

/// Layout of a pre-shared key file.
///
/// ```toml
/// [keys."3f1c9a..."]
/// principal = "acm-east"
/// reporter_type = "ACM"
/// is_reporter = true
/// ```
#[derive(Debug, Default, Deserialize)]
struct KeyFile {
    #[serde(default)]
    keys: BTreeMap<String, Identity>,
}

pub struct PreSharedKeyAuthenticator {
    keys: HashMap<KeyDigest, Identity>,
}

impl PreSharedKeyAuthenticator {
    pub fn new<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = (String, Identity)>,
    {
        let keys = keys
            .into_iter()
            .map(|(key, identity)| (digest(&key), identity))
            .collect();
        Self { keys }
    }

    /// Build from config: inline keys first, then the key file on top.
    pub fn from_config(config: &PskConfig) -> Result<Self, AuthnError> {
        let mut keys = config.keys.clone();
        if let Some(path) = &config.file {
            keys.extend(load_key_file(path)?);
        }
        if keys.is_empty() {
            return Err(AuthnError::Config("no pre-shared keys configured".to_string()));
        }
        info!(count = keys.len(), "pre-shared keys loaded");
        Ok(Self::new(keys))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn load_key_file(path: &Path) -> Result<BTreeMap<String, Identity>, AuthnError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AuthnError::Config(format!("read {}: {e}", path.display())))?;
    let file: KeyFile = toml::from_str(&content)
        .map_err(|e| AuthnError::Config(format!("parse {}: {e}", path.display())))?;
    Ok(file.keys)
}

#[async_trait]
impl Authenticator for PreSharedKeyAuthenticator {
    fn name(&self) -> &'static str {
        "psk"
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Outcome, AuthnError> {
        let Some(key) = credentials.pre_shared_key.as_deref().map(str::trim) else {
            return Ok(Outcome::Ignore);
        };
        if key.is_empty() {
            return Ok(Outcome::Ignore);
        }
        let presented = digest(key);
        match self.keys.get(&presented) {
            Some(identity) => Ok(Outcome::Allow(identity.clone())),
            None => {
                debug!(fingerprint = %hex::encode(&presented[..4]), "unknown pre-shared key");
                Ok(Outcome::Deny)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn authenticator() -> PreSharedKeyAuthenticator {
        PreSharedKeyAuthenticator::new([(
            "key-1".to_string(),
            Identity::reporter("acm-east").with_reporter_type("ACM"),
        )])
    }

    #[tokio::test]
    async fn ignores_without_key() {
        let outcome = authenticator()
            .authenticate(&Credentials::default())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignore);

        let blank = Credentials::default().with_pre_shared_key("  ");
        assert_eq!(authenticator().authenticate(&blank).await.unwrap(), Outcome::Ignore);
    }

    #[tokio::test]
    async fn allows_known_key() {
        let creds = Credentials::default().with_pre_shared_key("key-1");
        let identity = authenticator()
            .authenticate(&creds)
            .await
            .unwrap()
            .into_identity()
            .unwrap();
        assert_eq!(identity.principal, "acm-east");
        assert_eq!(identity.reporter_type.as_deref(), Some("ACM"));
    }

    #[tokio::test]
    async fn denies_unknown_key() {
        let creds = Credentials::default().with_pre_shared_key("nope");
        assert_eq!(authenticator().authenticate(&creds).await.unwrap(), Outcome::Deny);
    }

    #[test]
    fn loads_key_file_over_inline_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let contents = r#"
[keys.from-file]
principal = "hbi"
reporter_type = "HBI"
is_reporter = true

[keys.shared]
principal = "file-wins"
"#;
        write!(file, "{contents}").unwrap();

        let mut config = PskConfig {
            file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        config
            .keys
            .insert("shared".to_string(), Identity::reporter("inline"));

        let auth = PreSharedKeyAuthenticator::from_config(&config).unwrap();
        assert_eq!(auth.len(), 2);
        assert_eq!(auth.keys[&digest("shared")].principal, "file-wins");
        assert!(auth.keys[&digest("from-file")].is_reporter);
    }

    #[test]
    fn missing_key_file_is_a_config_error() {
        let config = PskConfig {
            file: Some("/nonexistent/psks.toml".into()),
            ..Default::default()
        };
        assert!(matches!(
            PreSharedKeyAuthenticator::from_config(&config),
            Err(AuthnError::Config(_))
        ));
    }
}
