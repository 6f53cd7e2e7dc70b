//! Workspace payload and its validation.

use inventory_state::WorkspaceId;
use serde::{Deserialize, Serialize};

use crate::{InventoryError, InventoryResult};

/// Body of a workspace create or update request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceInput {
    pub display_name: String,
    pub parent_workspace_id: Option<WorkspaceId>,
}

impl WorkspaceInput {
    /// Collects every violation before failing.
    pub fn validate(&self) -> InventoryResult<()> {
        let mut problems = Vec::new();
        if self.display_name.trim().is_empty() {
            problems.push("displayName must not be empty".to_string());
        }
        if self.parent_workspace_id == Some(0) {
            problems.push("parentWorkspaceId must be a workspace id".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(InventoryError::Validation(problems))
        }
    }
}
