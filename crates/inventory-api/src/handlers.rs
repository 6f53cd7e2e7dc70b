//! REST API handlers.
//!
//! Store work runs on the blocking pool under the request timeout. A mutation
//! and its event run as one detached task: once the engine commits, the event
//! is emitted even if the request already timed out or the client went away.
//! An emission failure never changes the response.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory_core::Identity;
use inventory_eventing::EventKind;
use inventory_reconcile::{
    InventoryError, InventoryResult, Pagination, ReconciliationEngine, ResourceInput, ResourceRef,
    WorkspaceInput,
};
use inventory_state::{Resource, Workspace, WorkspaceId};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, warn};

use crate::ApiState;
use crate::error::error_response;

/// A resource as rendered to clients.
#[derive(Debug, Serialize)]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: Resource,
    pub href: String,
}

/// A workspace as rendered to clients.
#[derive(Debug, Serialize)]
pub struct WorkspaceView {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub href: String,
}

impl ApiState {
    fn view(&self, resource: Resource) -> ResourceView {
        ResourceView {
            href: self.href(resource.id),
            resource,
        }
    }

    fn workspace_view(&self, workspace: Workspace) -> WorkspaceView {
        WorkspaceView {
            href: self.workspace_href(workspace.id),
            workspace,
        }
    }
}

/// Raw paging parameters; unparsable values are ignored rather than rejected.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub size: Option<String>,
}

/// Run engine work off the async runtime, bounded by the request timeout.
async fn run_blocking<T, F>(state: &ApiState, f: F) -> InventoryResult<T>
where
    F: FnOnce(&ReconciliationEngine) -> InventoryResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    let task = tokio::task::spawn_blocking(move || f(&engine));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(InventoryError::Internal(format!("store task failed: {e}"))),
        Err(_) => Err(InventoryError::Internal(format!(
            "store call exceeded {:?}",
            state.request_timeout
        ))),
    }
}

/// Run a mutation and emit its event as one unit that outlives the request.
///
/// The timeout only decides what the caller sees; the spawned task keeps
/// running, so a commit that lands late still produces its event.
async fn run_mutation<F>(
    state: &ApiState,
    identity: Identity,
    kind: EventKind,
    f: F,
) -> InventoryResult<Resource>
where
    F: FnOnce(&ReconciliationEngine, &Identity) -> InventoryResult<Resource> + Send + 'static,
{
    let engine = state.engine.clone();
    let gateway = state.gateway.clone();
    let unit = async move {
        let caller = identity.clone();
        let result = match tokio::task::spawn_blocking(move || f(&engine, &caller)).await {
            Ok(result) => result,
            Err(e) => Err(InventoryError::Internal(format!("store task failed: {e}"))),
        };
        if let Ok(resource) = &result {
            let _ = gateway.emit(&identity, kind, resource).await;
        }
        result
    };
    let task = tokio::spawn(unit.instrument(tracing::Span::current()));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(InventoryError::Internal(format!("mutation task failed: {e}"))),
        Err(_) => {
            warn!(?kind, timeout = ?state.request_timeout, "mutation outlived the request");
            Err(InventoryError::Internal(format!(
                "store call exceeded {:?}",
                state.request_timeout
            )))
        }
    }
}

fn parse_ref(raw: &str) -> InventoryResult<ResourceRef> {
    raw.parse()
}

/// Workspaces are addressed by decimal id only.
fn parse_workspace_id(raw: &str) -> InventoryResult<WorkspaceId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InventoryError::InvalidRef(format!("{raw:?} is not a workspace id")));
    }
    raw.parse()
        .map_err(|_| InventoryError::InvalidRef(format!("{raw:?} is out of range")))
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> InventoryResult<T> {
    body.map(|Json(input)| input)
        .map_err(|e| InventoryError::Validation(vec![e.body_text()]))
}

// ── Resources ──────────────────────────────────────────────────

/// GET {base}/resources
pub async fn list_resources(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Response {
    let pagination = Pagination::from_query(params.page.as_deref(), params.size.as_deref());
    match run_blocking(&state, move |engine| engine.list(pagination)).await {
        Ok(page) => Json(page.map(|r| state.view(r))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET {base}/resources/{ref}
pub async fn get_resource(
    State(state): State<ApiState>,
    Path(reference): Path<String>,
) -> Response {
    let reference = match parse_ref(&reference) {
        Ok(reference) => reference,
        Err(e) => return error_response(e),
    };
    match run_blocking(&state, move |engine| engine.get(&reference)).await {
        Ok(resource) => Json(state.view(resource)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST {base}/resources
pub async fn create_resource(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<ResourceInput>, JsonRejection>,
) -> Response {
    let input = match parse_body(body) {
        Ok(input) => input,
        Err(e) => return error_response(e),
    };
    let create = move |engine: &ReconciliationEngine, caller: &Identity| {
        engine.create(caller, input)
    };
    match run_mutation(&state, identity, EventKind::Create, create).await {
        Ok(created) => (StatusCode::CREATED, Json(state.view(created))).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT {base}/resources/{ref}
pub async fn update_resource(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(reference): Path<String>,
    body: Result<Json<ResourceInput>, JsonRejection>,
) -> Response {
    let reference = match parse_ref(&reference) {
        Ok(reference) => reference,
        Err(e) => return error_response(e),
    };
    let input = match parse_body(body) {
        Ok(input) => input,
        Err(e) => return error_response(e),
    };
    let update = move |engine: &ReconciliationEngine, caller: &Identity| {
        engine.update(caller, &reference, input)
    };
    match run_mutation(&state, identity, EventKind::Update, update).await {
        Ok(updated) => Json(state.view(updated)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE {base}/resources/{ref}
pub async fn delete_resource(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(reference): Path<String>,
) -> Response {
    let reference = match parse_ref(&reference) {
        Ok(reference) => reference,
        Err(e) => return error_response(e),
    };
    let delete = move |engine: &ReconciliationEngine, caller: &Identity| {
        engine.delete(caller, &reference)
    };
    match run_mutation(&state, identity, EventKind::Delete, delete).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// ── Workspaces ─────────────────────────────────────────────────

/// GET {base}/workspaces
pub async fn list_workspaces(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Response {
    let pagination = Pagination::from_query(params.page.as_deref(), params.size.as_deref());
    match run_blocking(&state, move |engine| engine.list_workspaces(pagination)).await {
        Ok(page) => Json(page.map(|w| state.workspace_view(w))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET {base}/workspaces/{id}
pub async fn get_workspace(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let id = match parse_workspace_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    match run_blocking(&state, move |engine| engine.get_workspace(id)).await {
        Ok(workspace) => Json(state.workspace_view(workspace)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST {base}/workspaces
pub async fn create_workspace(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    body: Result<Json<WorkspaceInput>, JsonRejection>,
) -> Response {
    let input = match parse_body(body) {
        Ok(input) => input,
        Err(e) => return error_response(e),
    };
    let create = move |engine: &ReconciliationEngine| engine.create_workspace(&identity, input);
    match run_blocking(&state, create).await {
        Ok(created) => (StatusCode::CREATED, Json(state.workspace_view(created))).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT {base}/workspaces/{id}
pub async fn update_workspace(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    body: Result<Json<WorkspaceInput>, JsonRejection>,
) -> Response {
    let id = match parse_workspace_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    let input = match parse_body(body) {
        Ok(input) => input,
        Err(e) => return error_response(e),
    };
    let update = move |engine: &ReconciliationEngine| engine.update_workspace(&identity, id, input);
    match run_blocking(&state, update).await {
        Ok(updated) => Json(state.workspace_view(updated)).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE {base}/workspaces/{id}
pub async fn delete_workspace(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_workspace_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };
    match run_blocking(&state, move |engine| engine.delete_workspace(&identity, id)).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /livez
pub async fn livez() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /readyz
pub async fn readyz(State(state): State<ApiState>) -> Response {
    let check = run_blocking(&state, |engine| {
        engine.store().reporter_index_len().map_err(InventoryError::from)
    });
    match check.await {
        Ok(_) => Json(serde_json::json!({ "status": "ready" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable", "message": e.to_string() })),
        )
            .into_response(),
    }
}
