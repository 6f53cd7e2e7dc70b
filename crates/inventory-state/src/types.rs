//! Domain types for the inventory resource store.
//!
//! These types are the persisted form of the reconciled inventory and are
//! also what the REST layer renders, so they serialize in camelCase.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use inventory_core::ReporterKey;
use serde::{Deserialize, Serialize};

/// Primary key of a resource, issued by the store.
pub type ResourceId = u64;

/// Primary key of a workspace, issued by the store.
pub type WorkspaceId = u64;

// ── Resource ───────────────────────────────────────────────────────

/// The reconciled record for one logical resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Zero until the store assigns a key on creation.
    pub id: ResourceId,
    pub display_name: String,
    /// Fixed at creation.
    pub resource_type: String,
    pub workspace: Option<String>,
    /// Server clock.
    pub created_at: DateTime<Utc>,
    /// Server clock.
    pub updated_at: DateTime<Utc>,
    /// One entry per reporter key, in the order reporters first appeared.
    pub reporters: Vec<ReporterEntry>,
    #[serde(default)]
    pub tags: BTreeSet<ResourceTag>,
}

impl Resource {
    /// Keys of every reporter entry.
    pub fn reporter_keys(&self) -> impl Iterator<Item = ReporterKey> + '_ {
        self.reporters.iter().map(ReporterEntry::key)
    }

    /// The entry a given reporter contributed, if any.
    pub fn entry(&self, reporter: &str, reporter_type: &str) -> Option<&ReporterEntry> {
        self.reporters
            .iter()
            .find(|e| e.reporter == reporter && e.reporter_type == reporter_type)
    }

    pub fn entry_mut(&mut self, reporter: &str, reporter_type: &str) -> Option<&mut ReporterEntry> {
        self.reporters
            .iter_mut()
            .find(|e| e.reporter == reporter && e.reporter_type == reporter_type)
    }
}

// ── Workspaces ─────────────────────────────────────────────────────

/// A named grouping of resources, optionally nested under a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Zero until the store assigns a key on creation.
    pub id: WorkspaceId,
    pub display_name: String,
    #[serde(default)]
    pub parent_workspace_id: Option<WorkspaceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Reporter entries ───────────────────────────────────────────────

/// One reporter's view of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterEntry {
    /// Principal of the reporter instance.
    pub reporter: String,
    pub reporter_type: String,
    pub local_resource_id: String,
    /// Base URL of the reporter instance.
    pub reporter_href: Option<String>,
    pub console_href: String,
    pub api_href: String,
    /// Reporter clock.
    pub created: DateTime<Utc>,
    /// Reporter clock.
    pub updated: DateTime<Utc>,
    /// Reporter-specific payload, never interpreted here.
    pub data: serde_json::Value,
}

impl ReporterEntry {
    pub fn key(&self) -> ReporterKey {
        ReporterKey::new(
            self.reporter.clone(),
            self.reporter_type.clone(),
            self.local_resource_id.clone(),
        )
    }
}

// ── Tags ───────────────────────────────────────────────────────────

/// Cross-cutting label used to group and query resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceTag {
    pub namespace: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl ResourceTag {
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}
