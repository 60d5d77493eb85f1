use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use hks_core::{MemberRole, Node, OrganizationId, Task, UserId, Workspace, WorkspaceId, WorkspacePlan, WorkspaceStatus};
use hks_store::WorkspaceFilter;
use hks_workspace::{CreateWorkspaceRequest, UpdateWorkspaceRequest, WorkspaceOperation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::middleware::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspaces", post(create_workspace).get(list_workspaces))
        .route("/workspaces/:id", get(get_workspace).patch(update_workspace).delete(delete_workspace))
        .route("/workspaces/:id/suspend", post(suspend))
        .route("/workspaces/:id/reactivate", post(reactivate))
        .route("/workspaces/:id/operations", post(execute_operation))
        .route("/workspaces/:id/members", get(list_members).post(add_member))
        .route("/workspaces/:id/members/:user_id", delete(remove_member))
        .route("/workspaces/:id/kubeconfig", get(get_kubeconfig))
        .route("/workspaces/:id/nodes", get(get_nodes))
        .route("/workspaces/:id/deployments/:deployment/scale", post(scale_deployment))
}

#[derive(Deserialize)]
struct CreateWorkspaceBody {
    organization_id: OrganizationId,
    name: String,
    description: Option<String>,
    plan: WorkspacePlan,
    plan_id: Option<String>,
}

#[derive(Serialize)]
struct CreateWorkspaceResponse {
    workspace: Workspace,
    task: Task,
}

async fn create_workspace(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(body): Json<CreateWorkspaceBody>,
) -> Result<Json<CreateWorkspaceResponse>, ApiError> {
    let (workspace, task) = state
        .lifecycle
        .create_workspace(CreateWorkspaceRequest {
            organization_id: body.organization_id,
            name: body.name,
            description: body.description,
            plan: body.plan,
            plan_id: body.plan_id,
        })
        .await?;
    Ok(Json(CreateWorkspaceResponse { workspace, task }))
}

async fn get_workspace(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Workspace>, ApiError> {
    Ok(Json(state.lifecycle.get_workspace(id).await?))
}

#[derive(Deserialize)]
struct ListWorkspacesQuery {
    organization_id: Option<OrganizationId>,
    status: Option<WorkspaceStatus>,
    search: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn list_workspaces(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(query): Query<ListWorkspacesQuery>,
) -> Result<Json<Vec<Workspace>>, ApiError> {
    let filter = WorkspaceFilter {
        organization_id: query.organization_id,
        status: query.status,
        search: query.search,
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(state.lifecycle.list_workspaces(&filter).await?))
}

#[derive(Deserialize)]
struct UpdateWorkspaceBody {
    name: Option<String>,
    description: Option<String>,
    settings: Option<HashMap<String, Value>>,
}

async fn update_workspace(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<UpdateWorkspaceBody>,
) -> Result<Json<Workspace>, ApiError> {
    let workspace = state
        .lifecycle
        .update_workspace(
            id,
            UpdateWorkspaceRequest {
                name: body.name,
                description: body.description,
                settings: body.settings,
            },
        )
        .await?;
    Ok(Json(workspace))
}

async fn delete_workspace(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.lifecycle.delete_workspace(id).await?))
}

#[derive(Deserialize)]
struct SuspendBody {
    reason: String,
}

async fn suspend(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<SuspendBody>,
) -> Result<Json<Value>, ApiError> {
    state.lifecycle.suspend(id, &body.reason).await?;
    Ok(Json(serde_json::json!({ "status": "suspended" })))
}

async fn reactivate(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Value>, ApiError> {
    state.lifecycle.reactivate(id).await?;
    Ok(Json(serde_json::json!({ "status": "active" })))
}

#[derive(Deserialize)]
struct ExecuteOperationBody {
    operation: WorkspaceOperation,
}

async fn execute_operation(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<ExecuteOperationBody>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.lifecycle.execute_operation(id, body.operation).await?))
}

async fn list_members(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Vec<hks_core::WorkspaceMember>>, ApiError> {
    Ok(Json(state.lifecycle.list_members(id).await?))
}

#[derive(Deserialize)]
struct AddMemberBody {
    user_id: UserId,
    role: MemberRole,
}

async fn add_member(
    State(state): State<AppState>,
    AuthUser(added_by): AuthUser,
    Path(id): Path<WorkspaceId>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<Value>, ApiError> {
    state.lifecycle.add_member(id, body.user_id, body.role, added_by).await?;
    Ok(Json(serde_json::json!({ "added": true })))
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path((id, user_id)): Path<(WorkspaceId, UserId)>,
) -> Result<Json<Value>, ApiError> {
    state.lifecycle.remove_member(id, user_id).await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

async fn get_kubeconfig(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Value>, ApiError> {
    let kubeconfig = state.lifecycle.get_kubeconfig(id).await?;
    Ok(Json(serde_json::json!({ "kubeconfig": kubeconfig })))
}

async fn get_nodes(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Vec<Node>>, ApiError> {
    Ok(Json(state.lifecycle.get_nodes(id).await?))
}

#[derive(Deserialize)]
struct ScaleDeploymentBody {
    replicas: u32,
}

async fn scale_deployment(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path((id, deployment)): Path<(WorkspaceId, String)>,
    Json(body): Json<ScaleDeploymentBody>,
) -> Result<Json<Value>, ApiError> {
    state.lifecycle.scale_deployment(id, &deployment, body.replicas).await?;
    Ok(Json(serde_json::json!({ "scaled": true })))
}
