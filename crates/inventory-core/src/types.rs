//! Shared types used across inventory crates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal first segment of a composite reporter reference.
pub const HCRN_PREFIX: &str = "hcrn";

/// The resolved caller of a single request.
///
/// Produced by an authenticator on `Allow` and dropped when the request
/// finishes. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub tenant: String,
    /// Unique name within the scheme that authenticated the caller.
    pub principal: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default)]
    pub is_reporter: bool,
    #[serde(default)]
    pub is_guest: bool,
    /// Reporter type asserted by the credential (e.g. "ACM", "HBI").
    #[serde(default)]
    pub reporter_type: Option<String>,
    /// Base URL of the reporter instance, if the credential carries one.
    #[serde(default)]
    pub href: Option<String>,
}

impl Identity {
    /// An identity for a reporting system.
    pub fn reporter(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            is_reporter: true,
            ..Default::default()
        }
    }

    /// The anonymous caller admitted by the guest strategy.
    pub fn guest() -> Self {
        Self {
            principal: "guest".to_string(),
            is_guest: true,
            ..Default::default()
        }
    }

    pub fn with_reporter_type(mut self, reporter_type: impl Into<String>) -> Self {
        self.reporter_type = Some(reporter_type.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Globally unique key of one reporter's contribution to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReporterKey {
    /// Principal of the reporter instance.
    pub reporter: String,
    pub reporter_type: String,
    /// Identifier the reporter uses for the resource.
    pub local_resource_id: String,
}

impl ReporterKey {
    pub fn new(
        reporter: impl Into<String>,
        reporter_type: impl Into<String>,
        local_resource_id: impl Into<String>,
    ) -> Self {
        Self {
            reporter: reporter.into(),
            reporter_type: reporter_type.into(),
            local_resource_id: local_resource_id.into(),
        }
    }

    /// Borrowed tuple form, in index column order.
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (
            self.reporter.as_str(),
            self.reporter_type.as_str(),
            self.local_resource_id.as_str(),
        )
    }
}

/// Renders the composite reference form `hcrn:<type>:<instance>:<local id>`.
impl fmt::Display for ReporterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{HCRN_PREFIX}:{}:{}:{}",
            self.reporter_type, self.reporter, self.local_resource_id
        )
    }
}
