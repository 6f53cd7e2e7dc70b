//! StateStore — redb-backed persistence for resource aggregates.
//!
//! Each mutating operation runs in exactly one write transaction. When an
//! operation fails part-way the transaction is aborted, so a resource and
//! its reporter index rows are always written (or removed) together.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use inventory_core::ReporterKey;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

/// Reporter keys of an aggregate, rejecting duplicates within it.
fn distinct_keys(resource: &Resource) -> StateResult<BTreeSet<ReporterKey>> {
    let keys: BTreeSet<ReporterKey> = resource.reporter_keys().collect();
    if keys.len() != resource.reporters.len() {
        return Err(StateError::Invariant(
            "reporter entries must have distinct keys".to_string(),
        ));
    }
    Ok(keys)
}

/// Thread-safe resource store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "resource store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory resource store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Persist a new aggregate and claim all of its reporter keys.
    ///
    /// The store assigns `id`. Fails with [`StateError::Conflict`] if any
    /// key already belongs to a resource; nothing is written in that case.
    pub fn create_resource(&self, mut resource: Resource) -> StateResult<Resource> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match Self::insert_new(&txn, &mut resource) {
            Ok(()) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(
                    id = resource.id,
                    resource_type = %resource.resource_type,
                    "resource created"
                );
                Ok(resource)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    fn insert_new(txn: &WriteTransaction, resource: &mut Resource) -> StateResult<()> {
        if resource.reporters.is_empty() {
            return Err(StateError::Invariant(
                "a resource needs at least one reporter entry".to_string(),
            ));
        }
        let keys = distinct_keys(resource)?;

        let mut index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        for key in &keys {
            if index.get(key.as_tuple()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::Conflict(key.to_string()));
            }
        }

        let id = Self::next_id(txn, RESOURCE_SEQUENCE)?;
        resource.id = id;
        for key in &keys {
            index.insert(key.as_tuple(), id).map_err(map_err!(Write))?;
        }

        let value = encode(resource)?;
        let mut resources = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        resources
            .insert(id, value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    fn next_id(txn: &WriteTransaction, sequence: &str) -> StateResult<u64> {
        let mut sequences = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        let last = sequences
            .get(sequence)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = last + 1;
        sequences.insert(sequence, next).map_err(map_err!(Write))?;
        Ok(next)
    }

    /// Read-modify-write one aggregate inside a single write transaction.
    ///
    /// `f` sees the stored aggregate and may change anything except `id`
    /// and `resource_type`. Reporter keys added by `f` are claimed in the
    /// index (conflicting with another resource's key aborts the write);
    /// keys it removed are released. Returns `Ok(None)` if `id` is unknown.
    pub fn modify_resource<F, E>(&self, id: ResourceId, f: F) -> Result<Option<Resource>, E>
    where
        F: FnOnce(&mut Resource) -> Result<(), E>,
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match Self::apply_modification(&txn, id, f) {
            Ok(Some(resource)) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(id, entries = resource.reporters.len(), "resource updated");
                Ok(Some(resource))
            }
            Ok(None) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Ok(None)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    fn apply_modification<F, E>(
        txn: &WriteTransaction,
        id: ResourceId,
        f: F,
    ) -> Result<Option<Resource>, E>
    where
        F: FnOnce(&mut Resource) -> Result<(), E>,
        E: From<StateError>,
    {
        let mut resources = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        let current = match resources.get(id).map_err(map_err!(Read))? {
            Some(guard) => decode::<Resource>(guard.value())?,
            None => return Ok(None),
        };

        let mut updated = current.clone();
        f(&mut updated)?;

        if updated.id != current.id {
            return Err(StateError::Invariant("resource id is immutable".to_string()).into());
        }
        if updated.resource_type != current.resource_type {
            return Err(StateError::Invariant(format!(
                "resource type is immutable (stored {:?}, got {:?})",
                current.resource_type, updated.resource_type
            ))
            .into());
        }
        if updated.reporters.is_empty() {
            return Err(StateError::Invariant(
                "a resource needs at least one reporter entry".to_string(),
            )
            .into());
        }

        let old_keys = distinct_keys(&current)?;
        let new_keys = distinct_keys(&updated)?;

        let mut index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        for key in new_keys.difference(&old_keys) {
            let owner = index
                .get(key.as_tuple())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value());
            if owner.is_some_and(|owner| owner != id) {
                return Err(StateError::Conflict(key.to_string()).into());
            }
            index.insert(key.as_tuple(), id).map_err(map_err!(Write))?;
        }
        for key in old_keys.difference(&new_keys) {
            index.remove(key.as_tuple()).map_err(map_err!(Write))?;
        }

        let value = encode(&updated)?;
        resources
            .insert(id, value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(Some(updated))
    }

    /// Delete a resource and release all of its reporter keys.
    ///
    /// Returns the removed aggregate, or `None` if it did not exist.
    pub fn delete_resource(&self, id: ResourceId) -> StateResult<Option<Resource>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed = {
            let mut resources = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
            let guard = resources.remove(id).map_err(map_err!(Write))?;
            guard
                .map(|guard| decode::<Resource>(guard.value()))
                .transpose()?
        };
        if let Some(resource) = &removed {
            let mut index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
            for key in resource.reporter_keys() {
                index.remove(key.as_tuple()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, existed = removed.is_some(), "resource deleted");
        Ok(removed)
    }

    // ── Workspaces ─────────────────────────────────────────────────

    /// Persist a new workspace. The store assigns `id`; a parent, when
    /// given, must already exist.
    pub fn create_workspace(&self, mut workspace: Workspace) -> StateResult<Workspace> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match Self::insert_workspace(&txn, &mut workspace) {
            Ok(()) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(
                    id = workspace.id,
                    parent = ?workspace.parent_workspace_id,
                    "workspace created"
                );
                Ok(workspace)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    fn insert_workspace(txn: &WriteTransaction, workspace: &mut Workspace) -> StateResult<()> {
        let mut table = txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        if let Some(parent) = workspace.parent_workspace_id
            && table.get(parent).map_err(map_err!(Read))?.is_none()
        {
            return Err(StateError::InvalidParent(format!("workspace {parent} does not exist")));
        }
        workspace.id = Self::next_id(txn, WORKSPACE_SEQUENCE)?;
        let value = encode(workspace)?;
        table
            .insert(workspace.id, value.as_slice())
            .map_err(map_err!(Write))?;
        Ok(())
    }

    /// Read-modify-write one workspace inside a single write transaction.
    ///
    /// A changed parent must exist and must not be the workspace itself or
    /// one of its descendants. Returns `Ok(None)` if `id` is unknown.
    pub fn modify_workspace<F, E>(&self, id: WorkspaceId, f: F) -> Result<Option<Workspace>, E>
    where
        F: FnOnce(&mut Workspace) -> Result<(), E>,
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match Self::apply_workspace_change(&txn, id, f) {
            Ok(Some(workspace)) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(id, parent = ?workspace.parent_workspace_id, "workspace updated");
                Ok(Some(workspace))
            }
            Ok(None) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Ok(None)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    fn apply_workspace_change<F, E>(
        txn: &WriteTransaction,
        id: WorkspaceId,
        f: F,
    ) -> Result<Option<Workspace>, E>
    where
        F: FnOnce(&mut Workspace) -> Result<(), E>,
        E: From<StateError>,
    {
        let mut table = txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        let current = match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => decode::<Workspace>(guard.value())?,
            None => return Ok(None),
        };

        let mut updated = current.clone();
        f(&mut updated)?;

        if updated.id != current.id {
            return Err(StateError::Invariant("workspace id is immutable".to_string()).into());
        }

        // Walk up from the new parent; reaching `id` means a cycle.
        let mut ancestor = updated.parent_workspace_id;
        while let Some(next) = ancestor {
            if next == id {
                return Err(StateError::InvalidParent(format!(
                    "workspace {next} cannot be nested under itself"
                ))
                .into());
            }
            ancestor = match table.get(next).map_err(map_err!(Read))? {
                Some(guard) => decode::<Workspace>(guard.value())?.parent_workspace_id,
                None => {
                    return Err(StateError::InvalidParent(format!(
                        "workspace {next} does not exist"
                    ))
                    .into());
                }
            };
        }

        let value = encode(&updated)?;
        table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        Ok(Some(updated))
    }

    /// Delete a workspace that has no children.
    ///
    /// Returns the removed workspace, or `None` if it did not exist. Fails
    /// with [`StateError::InUse`] while any workspace names it as parent.
    pub fn delete_workspace(&self, id: WorkspaceId) -> StateResult<Option<Workspace>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match Self::remove_workspace(&txn, id) {
            Ok(removed) => {
                txn.commit().map_err(map_err!(Transaction))?;
                debug!(id, existed = removed.is_some(), "workspace deleted");
                Ok(removed)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    fn remove_workspace(txn: &WriteTransaction, id: WorkspaceId) -> StateResult<Option<Workspace>> {
        let mut table = txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let child: Workspace = decode(value.value())?;
            if child.parent_workspace_id == Some(id) {
                return Err(StateError::InUse(format!(
                    "workspace {id} is the parent of workspace {}",
                    key.value()
                )));
            }
        }
        let removed = table.remove(id).map_err(map_err!(Write))?;
        removed.map(|guard| decode(guard.value())).transpose()
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Get a resource by primary key.
    pub fn get_resource(&self, id: ResourceId) -> StateResult<Option<Resource>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// The id of the resource that owns a reporter key.
    pub fn resource_id_for(&self, key: &ReporterKey) -> StateResult<Option<ResourceId>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        let owner = index
            .get(key.as_tuple())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value());
        Ok(owner)
    }

    /// Resolve a reporter key to its resource within one read snapshot.
    pub fn find_by_reporter_key(&self, key: &ReporterKey) -> StateResult<Option<Resource>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        let Some(id) = index
            .get(key.as_tuple())
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
        else {
            return Ok(None);
        };
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// One page of resources in primary-key order, plus the total count.
    pub fn list_page(&self, offset: u64, limit: u64) -> StateResult<(Vec<Resource>, u64)> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        let total = table.len().map_err(map_err!(Read))?;
        let mut items = Vec::new();
        let iter = table.iter().map_err(map_err!(Read))?;
        for entry in iter
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            items.push(decode(value.value())?);
        }
        Ok((items, total))
    }

    /// Get a workspace by primary key.
    pub fn get_workspace(&self, id: WorkspaceId) -> StateResult<Option<Workspace>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// One page of workspaces in primary-key order, plus the total count.
    pub fn list_workspaces(&self, offset: u64, limit: u64) -> StateResult<(Vec<Workspace>, u64)> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKSPACES).map_err(map_err!(Table))?;
        let total = table.len().map_err(map_err!(Read))?;
        let mut items = Vec::new();
        let iter = table.iter().map_err(map_err!(Read))?;
        for entry in iter
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            items.push(decode(value.value())?);
        }
        Ok((items, total))
    }

    /// Number of claimed reporter keys across all resources.
    pub fn reporter_index_len(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(REPORTER_INDEX).map_err(map_err!(Table))?;
        index.len().map_err(map_err!(Read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_entry(reporter: &str, reporter_type: &str, local: &str) -> ReporterEntry {
        let now = Utc::now();
        ReporterEntry {
            reporter: reporter.to_string(),
            reporter_type: reporter_type.to_string(),
            local_resource_id: local.to_string(),
            reporter_href: None,
            console_href: format!("https://console/{local}"),
            api_href: format!("https://api/{local}"),
            created: now,
            updated: now,
            data: serde_json::json!({"cpus": 4}),
        }
    }

    fn test_resource(reporter: &str, local: &str) -> Resource {
        let now = Utc::now();
        Resource {
            id: 0,
            display_name: format!("host {local}"),
            resource_type: "host".to_string(),
            workspace: None,
            created_at: now,
            updated_at: now,
            reporters: vec![test_entry(reporter, "HBI", local)],
            tags: BTreeSet::new(),
        }
    }

    // ── Create ─────────────────────────────────────────────────────

    #[test]
    fn create_assigns_sequential_ids() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.create_resource(test_resource("hbi", "1")).unwrap();
        let b = store.create_resource(test_resource("hbi", "2")).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.get_resource(1).unwrap(), Some(a));
    }

    #[test]
    fn create_rejects_claimed_key_without_side_effects() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_resource(test_resource("hbi", "1")).unwrap();

        let err = store.create_resource(test_resource("hbi", "1")).unwrap_err();
        assert!(matches!(err, StateError::Conflict(_)));

        let (items, total) = store.list_page(0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items.len(), 1);
        // The aborted transaction did not consume an id.
        let next = store.create_resource(test_resource("hbi", "2")).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn create_requires_an_entry() {
        let store = StateStore::open_in_memory().unwrap();
        let mut resource = test_resource("hbi", "1");
        resource.reporters.clear();
        let err = store.create_resource(resource).unwrap_err();
        assert!(matches!(err, StateError::Invariant(_)));
    }

    #[test]
    fn lookup_by_reporter_key() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_resource(test_resource("hbi", "abc")).unwrap();

        let key = ReporterKey::new("hbi", "HBI", "abc");
        assert_eq!(store.resource_id_for(&key).unwrap(), Some(created.id));
        assert_eq!(store.find_by_reporter_key(&key).unwrap(), Some(created));

        let other = ReporterKey::new("hbi", "ACM", "abc");
        assert!(store.find_by_reporter_key(&other).unwrap().is_none());
    }

    // ── Modify ─────────────────────────────────────────────────────

    #[test]
    fn modify_appends_entry_and_indexes_it() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_resource(test_resource("hbi", "1")).unwrap();

        let updated = store
            .modify_resource(created.id, |r| {
                r.reporters.push(test_entry("acm", "ACM", "c-1"));
                Ok::<_, StateError>(())
            })
            .unwrap()
            .unwrap();

        assert_eq!(updated.reporters.len(), 2);
        let key = ReporterKey::new("acm", "ACM", "c-1");
        assert_eq!(store.resource_id_for(&key).unwrap(), Some(created.id));
        assert_eq!(store.reporter_index_len().unwrap(), 2);
    }

    #[test]
    fn modify_rejects_key_owned_by_other_resource() {
        let store = StateStore::open_in_memory().unwrap();
        let first = store.create_resource(test_resource("hbi", "1")).unwrap();
        let second = store.create_resource(test_resource("hbi", "2")).unwrap();

        let err = store
            .modify_resource(second.id, |r| {
                r.display_name = "renamed".to_string();
                r.reporters.push(test_entry("hbi", "HBI", "1"));
                Ok::<_, StateError>(())
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Conflict(_)));

        // Neither resource changed.
        assert_eq!(store.get_resource(second.id).unwrap().unwrap(), second);
        assert_eq!(store.get_resource(first.id).unwrap().unwrap(), first);
    }

    #[test]
    fn modify_unknown_id_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        let result = store
            .modify_resource(42, |_| Ok::<_, StateError>(()))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn modify_guards_resource_type() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_resource(test_resource("hbi", "1")).unwrap();
        let err = store
            .modify_resource(created.id, |r| {
                r.resource_type = "cluster".to_string();
                Ok::<_, StateError>(())
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Invariant(_)));
    }

    #[test]
    fn modify_closure_error_aborts() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_resource(test_resource("hbi", "1")).unwrap();
        let err = store
            .modify_resource(created.id, |r| {
                r.display_name = "half-done".to_string();
                Err(StateError::Invariant("stop".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Invariant(_)));
        assert_eq!(store.get_resource(created.id).unwrap().unwrap(), created);
    }

    // ── Delete ─────────────────────────────────────────────────────

    #[test]
    fn delete_cascades_index_rows() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_resource(test_resource("hbi", "1")).unwrap();
        store
            .modify_resource(created.id, |r| {
                r.reporters.push(test_entry("acm", "ACM", "c-1"));
                Ok::<_, StateError>(())
            })
            .unwrap();

        let removed = store.delete_resource(created.id).unwrap().unwrap();
        assert_eq!(removed.reporters.len(), 2);
        assert!(store.get_resource(created.id).unwrap().is_none());
        assert_eq!(store.reporter_index_len().unwrap(), 0);
        assert!(store.delete_resource(created.id).unwrap().is_none());

        // The released key can be claimed again.
        store.create_resource(test_resource("hbi", "1")).unwrap();
    }

    // ── List ───────────────────────────────────────────────────────

    #[test]
    fn list_pages_in_id_order() {
        let store = StateStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.create_resource(test_resource("hbi", &i.to_string())).unwrap();
        }

        let (page, total) = store.list_page(2, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 4]);

        let (tail, _) = store.list_page(4, 10).unwrap();
        assert_eq!(tail.len(), 1);

        let (beyond, total) = store.list_page(100, 10).unwrap();
        assert!(beyond.is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_resource(1).unwrap().is_none());
        assert!(store.delete_resource(1).unwrap().is_none());
        assert_eq!(store.list_page(0, 10).unwrap(), (Vec::new(), 0));
        assert_eq!(store.reporter_index_len().unwrap(), 0);
    }

    // ── Concurrency ────────────────────────────────────────────────

    #[test]
    fn racing_creates_for_one_key_claim_it_once() {
        let store = StateStore::open_in_memory().unwrap();
        let results: Vec<StateResult<Resource>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    s.spawn(move || store.create_resource(test_resource("hbi", "same")))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StateError::Conflict(_))))
            .count();
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.list_page(0, 100).unwrap().1, 1);
    }

    // ── Workspaces ─────────────────────────────────────────────────

    fn test_workspace(name: &str, parent: Option<WorkspaceId>) -> Workspace {
        let now = Utc::now();
        Workspace {
            id: 0,
            display_name: name.to_string(),
            parent_workspace_id: parent,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn workspaces_have_their_own_sequence() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_resource(test_resource("hbi", "1")).unwrap();
        let root = store.create_workspace(test_workspace("root", None)).unwrap();
        let child = store.create_workspace(test_workspace("child", Some(root.id))).unwrap();

        assert_eq!(root.id, 1);
        assert_eq!(child.id, 2);
        assert_eq!(store.get_workspace(child.id).unwrap(), Some(child));
    }

    #[test]
    fn workspace_parent_must_exist() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.create_workspace(test_workspace("orphan", Some(9))).unwrap_err();
        assert!(matches!(err, StateError::InvalidParent(_)));
        assert_eq!(store.list_workspaces(0, 10).unwrap().1, 0);
    }

    #[test]
    fn reparenting_under_a_descendant_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.create_workspace(test_workspace("a", None)).unwrap();
        let b = store.create_workspace(test_workspace("b", Some(a.id))).unwrap();
        let c = store.create_workspace(test_workspace("c", Some(b.id))).unwrap();

        for parent in [a.id, c.id] {
            let err = store
                .modify_workspace(a.id, |w| {
                    w.parent_workspace_id = Some(parent);
                    Ok::<_, StateError>(())
                })
                .unwrap_err();
            assert!(matches!(err, StateError::InvalidParent(_)));
        }
        assert_eq!(store.get_workspace(a.id).unwrap().unwrap(), a);

        let moved = store
            .modify_workspace(c.id, |w| {
                w.parent_workspace_id = Some(a.id);
                Ok::<_, StateError>(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(moved.parent_workspace_id, Some(a.id));
    }

    #[test]
    fn workspace_with_children_cannot_be_deleted() {
        let store = StateStore::open_in_memory().unwrap();
        let parent = store.create_workspace(test_workspace("p", None)).unwrap();
        let child = store.create_workspace(test_workspace("c", Some(parent.id))).unwrap();

        let err = store.delete_workspace(parent.id).unwrap_err();
        assert!(matches!(err, StateError::InUse(_)));

        assert_eq!(store.delete_workspace(child.id).unwrap(), Some(child));
        assert_eq!(store.delete_workspace(parent.id).unwrap(), Some(parent.clone()));
        assert!(store.delete_workspace(parent.id).unwrap().is_none());
        assert!(store.modify_workspace(parent.id, |_| Ok::<_, StateError>(())).unwrap().is_none());
    }

    #[test]
    fn list_workspaces_pages() {
        let store = StateStore::open_in_memory().unwrap();
        for i in 0..3 {
            store.create_workspace(test_workspace(&format!("w{i}"), None)).unwrap();
        }
        let (page, total) = store.list_workspaces(1, 1).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page[0].display_name, "w1");
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.create_resource(test_resource("hbi", "1")).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        let resource = store.get_resource(1).unwrap();
        assert!(resource.is_some());
        assert_eq!(resource.unwrap().display_name, "host 1");
        // The sequence continues after reopen.
        assert_eq!(store.create_resource(test_resource("hbi", "2")).unwrap().id, 2);
    }
}
