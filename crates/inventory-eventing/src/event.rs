//! Event payloads.

use std::collections::BTreeMap;
use std::fmt;

use inventory_core::Identity;
use inventory_state::Resource;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HEADER_EVENT_ID: &str = "event-id";
pub const HEADER_PRINCIPAL: &str = "principal";
pub const HEADER_TENANT: &str = "tenant";
pub const HEADER_REPORTER_TYPE: &str = "reporter-type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Create => "Create",
            EventKind::Update => "Update",
            EventKind::Delete => "Delete",
        };
        f.write_str(name)
    }
}

/// One mutation of one resource.
///
/// `object` is the resource after the mutation, or the removed snapshot
/// for [`EventKind::Delete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub headers: BTreeMap<String, String>,
    pub event_type: EventKind,
    pub resource_type: String,
    pub object: Resource,
}

impl Event {
    pub fn new(identity: &Identity, kind: EventKind, object: Resource) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_EVENT_ID.to_string(), Uuid::new_v4().to_string());
        headers.insert(HEADER_PRINCIPAL.to_string(), identity.principal.clone());
        if !identity.tenant.is_empty() {
            headers.insert(HEADER_TENANT.to_string(), identity.tenant.clone());
        }
        if let Some(reporter_type) = &identity.reporter_type {
            headers.insert(HEADER_REPORTER_TYPE.to_string(), reporter_type.clone());
        }
        Self {
            headers,
            event_type: kind,
            resource_type: object.resource_type.clone(),
            object,
        }
    }

    pub fn id(&self) -> &str {
        self.headers
            .get(HEADER_EVENT_ID)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
