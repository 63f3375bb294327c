//! Request handlers. Each one parses path ids, delegates to the
//! [`BranchManager`](scene_engine::BranchManager) and returns JSON.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use scene_engine::{
    CreatedBranch, DeletedBranch, DiffReport, EngineError, MergeOutcome, ReconciliationReport,
    RestoreReport,
};
use scene_sync::{JobStatus, ListQuery, NewElement};
use scene_types::{
    Branch, BranchId, Dimensions3D, Element, ElementId, ElementProperties, ElementType, JobId,
    Point3D, Rotation3D, Scene, SceneId, SnapshotId, SnapshotInfo,
};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

type Created<T> = (StatusCode, Json<T>);

fn parse_id<T>(raw: &str, what: &str) -> ServerResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ServerError::BadRequest(format!("invalid {what} id '{raw}': {e}")))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "scene-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---- Scenes ----

#[derive(Debug, Deserialize)]
pub struct CreateSceneRequest {
    pub workspace_id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dimensions: Dimensions3D,
}

pub async fn create_scene(
    State(state): State<AppState>,
    Json(req): Json<CreateSceneRequest>,
) -> ServerResult<Created<Scene>> {
    if req.name.trim().is_empty() {
        return Err(ServerError::BadRequest("scene name must not be empty".into()));
    }
    let mut scene = Scene::new(req.workspace_id, req.owner_id, req.name, req.dimensions);
    scene.description = req.description;
    state
        .scenes
        .put_scene(scene.clone())
        .await
        .map_err(EngineError::from)?;
    tracing::info!(scene_id = %scene.id, name = %scene.name, "scene registered");
    Ok((StatusCode::CREATED, Json(scene)))
}

pub async fn get_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ServerResult<Json<Scene>> {
    let scene_id: SceneId = parse_id(&scene_id, "scene")?;
    let scene = state
        .scenes
        .get_scene(scene_id)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(scene))
}

// ---- Branches ----

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Omit to create the scene's main branch.
    #[serde(default)]
    pub parent_branch_id: Option<BranchId>,
}

pub async fn create_branch(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    Json(req): Json<CreateBranchRequest>,
) -> ServerResult<Created<CreatedBranch>> {
    let scene_id: SceneId = parse_id(&scene_id, "scene")?;
    let created = state
        .manager
        .create_branch(scene_id, &req.name, &req.description, req.parent_branch_id)
        .await?;
    if created.branch.is_main {
        if let Err(e) = state.scenes.set_main_branch(scene_id, created.branch.id).await {
            tracing::warn!(scene_id = %scene_id, error = %e, "could not record main branch on scene");
        }
    }
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_branches(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ServerResult<Json<Vec<Branch>>> {
    let scene_id: SceneId = parse_id(&scene_id, "scene")?;
    Ok(Json(state.manager.list_branches(scene_id).await?))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> ServerResult<Json<ReconciliationReport>> {
    let scene_id: SceneId = parse_id(&scene_id, "scene")?;
    Ok(Json(state.manager.reconcile(scene_id).await?))
}

pub async fn get_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Branch>> {
    let id: BranchId = parse_id(&id, "branch")?;
    Ok(Json(state.manager.get_branch(id).await?))
}

pub async fn delete_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<DeletedBranch>> {
    let id: BranchId = parse_id(&id, "branch")?;
    Ok(Json(state.manager.delete_branch(id).await?))
}

pub async fn archive_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Branch>> {
    let id: BranchId = parse_id(&id, "branch")?;
    Ok(Json(state.manager.archive_branch(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub target_id: BranchId,
    #[serde(default)]
    pub delete_source: bool,
}

/// Conflicts and compliance blocks come back as `200` with
/// `success: false`.
pub async fn merge_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MergeRequest>,
) -> ServerResult<Json<MergeOutcome>> {
    let source: BranchId = parse_id(&id, "branch")?;
    let outcome = state
        .manager
        .merge_branch(source, req.target_id, req.delete_source)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub target: String,
}

pub async fn diff_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> ServerResult<Json<DiffReport>> {
    let source: BranchId = parse_id(&id, "branch")?;
    let target: BranchId = parse_id(&query.target, "target branch")?;
    Ok(Json(state.manager.get_diff(source, target).await?))
}

// ---- Snapshots ----

#[derive(Debug, Deserialize)]
pub struct CreateSnapshotRequest {
    pub name: String,
}

pub async fn create_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateSnapshotRequest>,
) -> ServerResult<Created<SnapshotInfo>> {
    let id: BranchId = parse_id(&id, "branch")?;
    let info = state.manager.create_snapshot(id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn list_snapshots(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Vec<SnapshotInfo>>> {
    let id: BranchId = parse_id(&id, "branch")?;
    Ok(Json(state.manager.list_snapshots(id).await?))
}

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<SnapshotInfo>> {
    let id: SnapshotId = parse_id(&id, "snapshot")?;
    Ok(Json(state.manager.get_snapshot(id).await?))
}

pub async fn restore_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<RestoreReport>> {
    let id: SnapshotId = parse_id(&id, "snapshot")?;
    Ok(Json(state.manager.restore_snapshot(id).await?))
}

// ---- Replication jobs ----

#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    /// Long-poll until the job finishes or this many milliseconds pass.
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<JobQuery>,
) -> ServerResult<Json<JobStatus>> {
    let id: JobId = parse_id(&id, "job")?;
    let status = match query.wait_ms {
        Some(ms) if ms > 0 => {
            let wait = Duration::from_millis(ms).min(state.max_job_wait);
            state.manager.wait_for_replication(id, wait).await?
        }
        _ => state.manager.replication_status(id)?,
    };
    Ok(Json(status))
}

// ---- Elements ----

#[derive(Debug, Deserialize)]
pub struct CreateElementRequest {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    #[serde(default)]
    pub position: Point3D,
    #[serde(default)]
    pub rotation: Rotation3D,
    #[serde(default)]
    pub dimensions: Dimensions3D,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub parent_id: Option<ElementId>,
}

pub async fn create_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateElementRequest>,
) -> ServerResult<Created<Element>> {
    let id: BranchId = parse_id(&id, "branch")?;
    let branch = state.manager.get_branch(id).await?;
    let mut new = NewElement::new(branch.scene_id, branch.id, req.element_type, req.name)
        .with_position(req.position)
        .with_dimensions(req.dimensions);
    new.rotation = req.rotation;
    new.properties = req.properties;
    new.parent_id = req.parent_id;
    let element = state.manager.create_element(branch.id, new).await?;
    Ok((StatusCode::CREATED, Json(element)))
}

pub async fn list_elements(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Vec<Element>>> {
    let id: BranchId = parse_id(&id, "branch")?;
    Ok(Json(state.manager.list_elements(id, &query).await?))
}

/// New content for an element. Identity, deletion state and merge
/// bookkeeping are not client-writable; extra fields are ignored.
#[derive(Debug, Deserialize)]
pub struct UpdateElementRequest {
    /// The version the client read.
    pub version: u64,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    #[serde(default)]
    pub position: Point3D,
    #[serde(default)]
    pub rotation: Rotation3D,
    #[serde(default)]
    pub dimensions: Dimensions3D,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub parent_id: Option<ElementId>,
}

/// Compare-and-swap: the body carries the version the client read.
pub async fn update_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateElementRequest>,
) -> ServerResult<Json<Element>> {
    let id: ElementId = parse_id(&id, "element")?;
    let mut element = state.manager.get_element(id).await?;
    element.version = req.version;
    element.element_type = req.element_type;
    element.name = req.name;
    element.position = req.position;
    element.rotation = req.rotation;
    element.dimensions = req.dimensions;
    element.properties = req.properties;
    element.parent_id = req.parent_id;
    Ok(Json(state.manager.update_element(element).await?))
}

pub async fn delete_element(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Element>> {
    let id: ElementId = parse_id(&id, "element")?;
    Ok(Json(state.manager.delete_element(id).await?))
}
