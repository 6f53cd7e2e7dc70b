//! Create, update, delete and read of reconciled resources.

use chrono::Utc;
use inventory_core::{Identity, ReporterKey};
use inventory_state::{
    ReporterEntry, Resource, ResourceId, StateStore, Workspace, WorkspaceId,
};
use tracing::{debug, info};

use crate::{
    InventoryError, InventoryResult, Page, Pagination, ResourceInput, ResourceRef, WorkspaceInput,
};

/// Applies reporter input to the store.
///
/// Methods are synchronous and may block on storage I/O; async callers
/// should run them on a blocking thread.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: StateStore,
}

impl ReconciliationEngine {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Register a resource first seen by this reporter.
    pub fn create(&self, identity: &Identity, input: ResourceInput) -> InventoryResult<Resource> {
        let key = input.reporter_key(identity)?;

        if let Some(owner) = self.store.resource_id_for(&key)? {
            debug!(%key, owner, "duplicate create rejected");
            return Err(conflict(&key));
        }

        let now = Utc::now();
        let local_time = input.local_time.unwrap_or(now);
        let resource = Resource {
            id: 0,
            display_name: input.display_name.trim().to_string(),
            resource_type: input.normalized_type(),
            workspace: input.workspace,
            created_at: now,
            updated_at: now,
            reporters: vec![ReporterEntry {
                reporter: key.reporter.clone(),
                reporter_type: key.reporter_type.clone(),
                local_resource_id: key.local_resource_id.clone(),
                reporter_href: identity.href.clone(),
                console_href: input.console_href,
                api_href: input.api_href,
                created: local_time,
                updated: local_time,
                data: input.data,
            }],
            tags: input.tags.unwrap_or_default(),
        };

        let created = self.store.create_resource(resource)?;
        info!(id = created.id, %key, resource_type = %created.resource_type, "resource created");
        Ok(created)
    }

    /// Apply a reporter's view to an existing resource.
    ///
    /// The caller's own entry is refreshed in place; a reporter seen for the
    /// first time gets a new entry appended. Resource-level fields are last
    /// writer wins.
    pub fn update(
        &self,
        identity: &Identity,
        reference: &ResourceRef,
        input: ResourceInput,
    ) -> InventoryResult<Resource> {
        let id = self.resolve_id(reference)?;
        let key = input.reporter_key(identity)?;
        let resource_type = input.normalized_type();
        let now = Utc::now();
        let local_time = input.local_time.unwrap_or(now);

        let updated = self.store.modify_resource(id, |resource| {
            if resource.resource_type != resource_type {
                return Err(InventoryError::Validation(vec![format!(
                    "resourceType is immutable: resource {} is {:?}, got {:?}",
                    resource.id, resource.resource_type, resource_type
                )]));
            }

            let id = resource.id;
            match resource.entry_mut(&key.reporter, &key.reporter_type) {
                Some(entry) => {
                    if entry.local_resource_id != key.local_resource_id {
                        debug!(
                            id,
                            stored = %entry.local_resource_id,
                            presented = %key.local_resource_id,
                            "reporter entry keeps its original local id"
                        );
                    }
                    entry.updated = local_time;
                    entry.console_href = input.console_href;
                    entry.api_href = input.api_href;
                    entry.data = input.data;
                    if identity.href.is_some() {
                        entry.reporter_href = identity.href.clone();
                    }
                }
                None => {
                    resource.reporters.push(ReporterEntry {
                        reporter: key.reporter.clone(),
                        reporter_type: key.reporter_type.clone(),
                        local_resource_id: key.local_resource_id.clone(),
                        reporter_href: identity.href.clone(),
                        console_href: input.console_href,
                        api_href: input.api_href,
                        created: local_time,
                        updated: local_time,
                        data: input.data,
                    });
                }
            }

            resource.display_name = input.display_name.trim().to_string();
            if let Some(workspace) = input.workspace {
                resource.workspace = Some(workspace);
            }
            if let Some(tags) = input.tags {
                resource.tags = tags;
            }
            resource.updated_at = now;
            Ok(())
        })?;

        let updated = updated.ok_or_else(|| not_found(reference))?;
        info!(id = updated.id, %key, reporters = updated.reporters.len(), "resource updated");
        Ok(updated)
    }

    /// Remove a resource and every reporter key it owns. Returns the
    /// removed snapshot.
    pub fn delete(
        &self,
        identity: &Identity,
        reference: &ResourceRef,
    ) -> InventoryResult<Resource> {
        let id = self.resolve_id(reference)?;
        let removed = self
            .store
            .delete_resource(id)?
            .ok_or_else(|| not_found(reference))?;
        info!(id, principal = %identity.principal, "resource deleted");
        Ok(removed)
    }

    pub fn get(&self, reference: &ResourceRef) -> InventoryResult<Resource> {
        let found = match reference {
            ResourceRef::Id(id) => self.store.get_resource(*id)?,
            ResourceRef::Reporter(key) => self.store.find_by_reporter_key(key)?,
        };
        found.ok_or_else(|| not_found(reference))
    }

    pub fn list(&self, pagination: Pagination) -> InventoryResult<Page<Resource>> {
        let (items, total) = self
            .store
            .list_page(pagination.offset(), pagination.size)?;
        Ok(Page {
            page: pagination.page,
            size: items.len(),
            total,
            items,
        })
    }

    fn resolve_id(&self, reference: &ResourceRef) -> InventoryResult<ResourceId> {
        match reference {
            ResourceRef::Id(id) => match self.store.get_resource(*id)? {
                Some(_) => Ok(*id),
                None => Err(not_found(reference)),
            },
            ResourceRef::Reporter(key) => self
                .store
                .resource_id_for(key)?
                .ok_or_else(|| not_found(reference)),
        }
    }

    // ── Workspaces ─────────────────────────────────────────────────

    pub fn create_workspace(
        &self,
        identity: &Identity,
        input: WorkspaceInput,
    ) -> InventoryResult<Workspace> {
        input.validate()?;
        let now = Utc::now();
        let created = self.store.create_workspace(Workspace {
            id: 0,
            display_name: input.display_name.trim().to_string(),
            parent_workspace_id: input.parent_workspace_id,
            created_at: now,
            updated_at: now,
        })?;
        info!(id = created.id, principal = %identity.principal, "workspace created");
        Ok(created)
    }

    /// Rename or move a workspace. Both fields are replaced.
    pub fn update_workspace(
        &self,
        identity: &Identity,
        id: WorkspaceId,
        input: WorkspaceInput,
    ) -> InventoryResult<Workspace> {
        input.validate()?;
        let updated = self.store.modify_workspace(id, |workspace| {
            workspace.display_name = input.display_name.trim().to_string();
            workspace.parent_workspace_id = input.parent_workspace_id;
            workspace.updated_at = Utc::now();
            Ok::<_, InventoryError>(())
        })?;
        let updated = updated.ok_or_else(|| workspace_not_found(id))?;
        info!(id, principal = %identity.principal, "workspace updated");
        Ok(updated)
    }

    pub fn delete_workspace(
        &self,
        identity: &Identity,
        id: WorkspaceId,
    ) -> InventoryResult<Workspace> {
        let removed = self
            .store
            .delete_workspace(id)?
            .ok_or_else(|| workspace_not_found(id))?;
        info!(id, principal = %identity.principal, "workspace deleted");
        Ok(removed)
    }

    pub fn get_workspace(&self, id: WorkspaceId) -> InventoryResult<Workspace> {
        self.store
            .get_workspace(id)?
            .ok_or_else(|| workspace_not_found(id))
    }

    pub fn list_workspaces(&self, pagination: Pagination) -> InventoryResult<Page<Workspace>> {
        let (items, total) = self
            .store
            .list_workspaces(pagination.offset(), pagination.size)?;
        Ok(Page {
            page: pagination.page,
            size: items.len(),
            total,
            items,
        })
    }
}

fn not_found(reference: &ResourceRef) -> InventoryError {
    InventoryError::NotFound(reference.to_string())
}

fn workspace_not_found(id: WorkspaceId) -> InventoryError {
    InventoryError::NotFound(format!("workspace {id}"))
}

fn conflict(key: &ReporterKey) -> InventoryError {
    InventoryError::Conflict(format!(
        "reporter has already reported this local resource id ({key})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use inventory_state::ResourceTag;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(StateStore::open_in_memory().unwrap())
    }

    fn hbi() -> Identity {
        Identity::reporter("hbi-1").with_reporter_type("HBI")
    }

    fn acm() -> Identity {
        Identity::reporter("acm-1").with_reporter_type("ACM")
    }

    fn input(local: &str) -> ResourceInput {
        ResourceInput {
            display_name: "web-01".to_string(),
            resource_type: "rhel-host".to_string(),
            local_resource_id: local.to_string(),
            console_href: "https://console/1".to_string(),
            api_href: "https://api/1".to_string(),
            data: json!({"os": "rhel"}),
            ..Default::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn create_then_get_by_id_and_hcrn() {
        let engine = engine();
        let created = engine.create(&hbi(), input("abc")).unwrap();
        assert_eq!(created.reporters.len(), 1);

        let by_id = engine.get(&ResourceRef::Id(created.id)).unwrap();
        assert_eq!(by_id, created);

        let by_key: ResourceRef = "hcrn:HBI:hbi-1:abc".parse().unwrap();
        assert_eq!(engine.get(&by_key).unwrap(), created);
    }

    #[test]
    fn create_uses_reporter_clock_for_entry() {
        let engine = engine();
        let mut body = input("abc");
        body.local_time = Some(at(1_700_000_000));
        let created = engine.create(&hbi(), body).unwrap();
        assert_eq!(created.reporters[0].created, at(1_700_000_000));
        assert_ne!(created.created_at, at(1_700_000_000));
    }

    #[test]
    fn duplicate_create_conflicts() {
        let engine = engine();
        engine.create(&hbi(), input("abc")).unwrap();
        let err = engine.create(&hbi(), input("abc")).unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
        assert_eq!(engine.list(Pagination::default()).unwrap().total, 1);
    }

    #[test]
    fn same_local_id_from_another_reporter_is_a_new_resource() {
        let engine = engine();
        let a = engine.create(&hbi(), input("abc")).unwrap();
        let b = engine.create(&acm(), input("abc")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn update_refreshes_own_entry() {
        let engine = engine();
        let created = engine.create(&hbi(), input("abc")).unwrap();

        let mut body = input("abc");
        body.display_name = "web-01-renamed".to_string();
        body.data = json!({"os": "rhel9"});
        body.local_time = Some(at(1_800_000_000));
        let updated = engine
            .update(&hbi(), &ResourceRef::Id(created.id), body)
            .unwrap();

        assert_eq!(updated.reporters.len(), 1);
        assert_eq!(updated.display_name, "web-01-renamed");
        assert_eq!(updated.reporters[0].data, json!({"os": "rhel9"}));
        assert_eq!(updated.reporters[0].updated, at(1_800_000_000));
        assert_eq!(updated.reporters[0].created, created.reporters[0].created);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn second_reporter_appends_entry() {
        let engine = engine();
        let created = engine.create(&hbi(), input("abc")).unwrap();

        let updated = engine
            .update(&acm(), &ResourceRef::Id(created.id), input("cluster-9"))
            .unwrap();
        assert_eq!(updated.reporters.len(), 2);
        assert!(updated.entry("hbi-1", "HBI").is_some());
        assert!(updated.entry("acm-1", "ACM").is_some());

        let by_acm: ResourceRef = "hcrn:ACM:acm-1:cluster-9".parse().unwrap();
        assert_eq!(engine.get(&by_acm).unwrap().id, created.id);
    }

    #[test]
    fn appending_a_key_owned_elsewhere_conflicts() {
        let engine = engine();
        let first = engine.create(&hbi(), input("abc")).unwrap();
        engine.create(&acm(), input("taken")).unwrap();

        let err = engine
            .update(&acm(), &ResourceRef::Id(first.id), input("taken"))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(_)));
        assert_eq!(engine.get(&ResourceRef::Id(first.id)).unwrap(), first);
    }

    #[test]
    fn update_rejects_type_change() {
        let engine = engine();
        let created = engine.create(&hbi(), input("abc")).unwrap();
        let mut body = input("abc");
        body.resource_type = "k8s-cluster".to_string();
        let err = engine
            .update(&hbi(), &ResourceRef::Id(created.id), body)
            .unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn update_keeps_tags_and_workspace_when_omitted() {
        let engine = engine();
        let mut body = input("abc");
        body.workspace = Some("ws-1".to_string());
        body.tags = Some([ResourceTag::new("insights", "env", "prod")].into_iter().collect());
        let created = engine.create(&hbi(), body).unwrap();

        let updated = engine
            .update(&hbi(), &ResourceRef::Id(created.id), input("abc"))
            .unwrap();
        assert_eq!(updated.workspace.as_deref(), Some("ws-1"));
        assert_eq!(updated.tags, created.tags);
    }

    #[test]
    fn update_unknown_is_not_found_before_validation() {
        let engine = engine();
        let err = engine
            .update(&hbi(), &ResourceRef::Id(42), ResourceInput::default())
            .unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    #[test]
    fn delete_releases_keys() {
        let engine = engine();
        let created = engine.create(&hbi(), input("abc")).unwrap();
        let removed = engine.delete(&hbi(), &ResourceRef::Id(created.id)).unwrap();
        assert_eq!(removed, created);

        assert!(matches!(
            engine.get(&ResourceRef::Id(created.id)),
            Err(InventoryError::NotFound(_))
        ));
        assert!(matches!(
            engine.delete(&hbi(), &ResourceRef::Id(created.id)),
            Err(InventoryError::NotFound(_))
        ));
        engine.create(&hbi(), input("abc")).unwrap();
    }

    #[test]
    fn delete_by_hcrn_without_ownership_check() {
        let engine = engine();
        engine.create(&hbi(), input("abc")).unwrap();
        let by_key: ResourceRef = "hcrn:HBI:hbi-1:abc".parse().unwrap();
        engine.delete(&acm(), &by_key).unwrap();
        assert_eq!(engine.list(Pagination::default()).unwrap().total, 0);
    }

    #[test]
    fn list_pages() {
        let engine = engine();
        for i in 0..7 {
            engine.create(&hbi(), input(&format!("r{i}"))).unwrap();
        }
        let page = engine.list(Pagination::new(Some(2), Some(3))).unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.size, 3);
        assert_eq!(page.total, 7);
        assert_eq!(page.items[0].reporters[0].local_resource_id, "r3");

        let last = engine.list(Pagination::new(Some(3), Some(3))).unwrap();
        assert_eq!(last.size, 1);
        let past = engine.list(Pagination::new(Some(9), Some(3))).unwrap();
        assert!(past.items.is_empty());
        assert_eq!(past.total, 7);
    }

    #[test]
    fn concurrent_creates_of_one_key_admit_one() {
        let engine = engine();
        let results: Vec<InventoryResult<Resource>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| engine.create(&hbi(), input("race"))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, InventoryError::Conflict(_))));
    }

    #[test]
    fn concurrent_creates_of_distinct_keys_all_land() {
        let engine = engine();
        let results: Vec<InventoryResult<Resource>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let engine = &engine;
                    s.spawn(move || engine.create(&hbi(), input(&format!("host-{n}"))))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut ids: Vec<u64> = results.into_iter().map(|r| r.unwrap().id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(engine.list(Pagination::default()).unwrap().total, 8);
        assert_eq!(engine.store().reporter_index_len().unwrap(), 8);
    }

    fn workspace(name: &str, parent: Option<WorkspaceId>) -> WorkspaceInput {
        WorkspaceInput {
            display_name: name.to_string(),
            parent_workspace_id: parent,
        }
    }

    #[test]
    fn workspace_lifecycle() {
        let engine = engine();
        let root = engine.create_workspace(&hbi(), workspace(" root ", None)).unwrap();
        assert_eq!(root.display_name, "root");
        let team = engine.create_workspace(&hbi(), workspace("team", Some(root.id))).unwrap();

        let renamed = engine
            .update_workspace(&acm(), team.id, workspace("platform", None))
            .unwrap();
        assert_eq!(renamed.display_name, "platform");
        assert_eq!(renamed.parent_workspace_id, None);
        assert_eq!(renamed.created_at, team.created_at);
        assert_eq!(engine.get_workspace(team.id).unwrap(), renamed);

        let page = engine.list_workspaces(Pagination::default()).unwrap();
        assert_eq!(page.total, 2);

        engine.delete_workspace(&hbi(), root.id).unwrap();
        assert!(matches!(
            engine.get_workspace(root.id),
            Err(InventoryError::NotFound(_))
        ));
    }

    #[test]
    fn workspace_errors_map_to_client_errors() {
        let engine = engine();
        let err = engine.create_workspace(&hbi(), workspace("", Some(0))).unwrap_err();
        assert!(matches!(err, InventoryError::Validation(ref p) if p.len() == 2));

        let err = engine.create_workspace(&hbi(), workspace("x", Some(5))).unwrap_err();
        assert_eq!(err.kind(), "validation");

        let parent = engine.create_workspace(&hbi(), workspace("p", None)).unwrap();
        engine.create_workspace(&hbi(), workspace("c", Some(parent.id))).unwrap();
        let err = engine.delete_workspace(&hbi(), parent.id).unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let err = engine.update_workspace(&hbi(), 99, workspace("x", None)).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
        let err = engine.delete_workspace(&hbi(), 99).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound(_)));
    }

    proptest! {
        #[test]
        fn created_resources_are_found_by_their_key(
            principal in "[a-z][a-z0-9-]{0,12}",
            reporter_type in "[A-Z]{2,6}",
            local in "[a-zA-Z0-9_.-]{1,24}",
        ) {
            let engine = engine();
            let identity = Identity::reporter(principal.clone())
                .with_reporter_type(reporter_type.clone());
            let created = engine.create(&identity, input(&local)).unwrap();

            let key = ReporterKey::new(principal, reporter_type, local);
            let reference = ResourceRef::Reporter(key);
            prop_assert_eq!(engine.get(&reference).unwrap(), created.clone());
            let reparsed: ResourceRef = reference.to_string().parse().unwrap();
            prop_assert_eq!(engine.get(&reparsed).unwrap(), created);
        }
    }
}
