//! redb table definitions for the inventory resource store.

use redb::TableDefinition;

/// Resource aggregates keyed by primary key, values are JSON.
pub const RESOURCES: TableDefinition<u64, &[u8]> = TableDefinition::new("resources");

/// Owning resource id keyed by `(reporter, reporter_type, local_resource_id)`.
pub const REPORTER_INDEX: TableDefinition<(&str, &str, &str), u64> =
    TableDefinition::new("reporter_index");

/// Workspaces keyed by primary key, values are JSON.
pub const WORKSPACES: TableDefinition<u64, &[u8]> = TableDefinition::new("workspaces");

/// Monotonic id sequences keyed by name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Sequence that issues resource primary keys.
pub const RESOURCE_SEQUENCE: &str = "resource_id";

/// Sequence that issues workspace primary keys.
pub const WORKSPACE_SEQUENCE: &str = "workspace_id";
