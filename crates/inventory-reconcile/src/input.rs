//! Reporter-submitted resource payload and its validation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use inventory_core::{Identity, ReporterKey};
use inventory_state::ResourceTag;
use serde::{Deserialize, Serialize};

use crate::{InventoryError, InventoryResult};

/// Separates the segments of an hcrn reference; no key part may contain it.
const HCRN_SEPARATOR: char = ':';

/// Body of a create or update request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceInput {
    pub display_name: String,
    pub resource_type: String,
    pub local_resource_id: String,
    /// Reporter clock. The server clock stands in when omitted.
    pub local_time: Option<DateTime<Utc>>,
    pub console_href: String,
    pub api_href: String,
    /// Used only when the credential does not carry a reporter type.
    pub reporter_type: Option<String>,
    pub data: serde_json::Value,
    pub workspace: Option<String>,
    pub tags: Option<BTreeSet<ResourceTag>>,
}

impl ResourceInput {
    /// Resource types are case-insensitive and stored lowercase.
    pub fn normalized_type(&self) -> String {
        self.resource_type.trim().to_lowercase()
    }

    /// Validate against the calling identity and derive the reporter key.
    ///
    /// Collects every violation before failing.
    pub fn reporter_key(&self, identity: &Identity) -> InventoryResult<ReporterKey> {
        let mut problems = Vec::new();

        if self.display_name.trim().is_empty() {
            problems.push("displayName must not be empty".to_string());
        }
        if self.resource_type.trim().is_empty() {
            problems.push("resourceType must not be empty".to_string());
        }
        if self.local_resource_id.trim().is_empty() {
            problems.push("localResourceId must not be empty".to_string());
        }
        if self.local_resource_id.contains(HCRN_SEPARATOR) {
            problems.push("localResourceId must not contain ':'".to_string());
        }
        if is_empty_data(&self.data) {
            problems.push("data must be a non-empty JSON value".to_string());
        }
        if identity.principal.is_empty() {
            problems.push("caller has no principal".to_string());
        }
        if identity.principal.contains(HCRN_SEPARATOR) {
            problems.push(format!("principal {:?} must not contain ':'", identity.principal));
        }
        for tag in self.tags.iter().flatten() {
            if tag.namespace.trim().is_empty() || tag.key.trim().is_empty() {
                problems.push(format!(
                    "tag {:?}/{:?} needs a namespace and a key",
                    tag.namespace, tag.key
                ));
            }
        }

        let reporter_type = non_blank(identity.reporter_type.as_deref())
            .or_else(|| non_blank(self.reporter_type.as_deref()));
        if reporter_type.is_some_and(|t| t.contains(HCRN_SEPARATOR)) {
            problems.push("reporterType must not contain ':'".to_string());
        }
        if reporter_type.is_none() {
            problems.push(
                "reporterType must be carried by the credential or the request".to_string(),
            );
        }

        match reporter_type {
            Some(reporter_type) if problems.is_empty() => Ok(ReporterKey::new(
                identity.principal.clone(),
                reporter_type,
                self.local_resource_id.trim(),
            )),
            _ => Err(InventoryError::Validation(problems)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_empty_data(data: &serde_json::Value) -> bool {
    match data {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
