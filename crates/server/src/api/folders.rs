use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use docroute_core::domain::folder::{Folder, FolderId, FolderPermission, FolderUpdate, NewFolder};
use docroute_core::domain::principal::UserId;
use serde::Deserialize;
use tracing::info;

use super::context::{ApiError, RequestContext};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<FolderId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderListQuery {
    pub parent_id: Option<FolderId>,
}

#[derive(Debug, Deserialize)]
pub struct GrantAccessRequest {
    pub user_id: UserId,
    pub permission: FolderPermission,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/folders", post(create_folder).get(list_folders))
        .route("/folders/{id}", get(get_folder).put(update_folder).delete(delete_folder))
        .route("/folders/{id}/access", post(grant_access))
        .route("/folders/{id}/access/{user_id}", delete(revoke_access))
}

/// Loads a folder and checks the caller holds `level` on it. Admins pass every check.
pub(super) async fn require_folder(
    state: &AppState,
    ctx: &RequestContext,
    folder_id: &FolderId,
    level: FolderPermission,
) -> Result<Folder, ApiError> {
    let folder = state
        .store
        .folders
        .find_by_id(folder_id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.not_found("folder", folder_id))?;
    if ctx.is_admin() {
        return Ok(folder);
    }

    let allowed = state
        .store
        .folder_access
        .has_permission(folder_id, ctx.user_id(), level)
        .await
        .map_err(|error| ctx.fail(error))?;
    if allowed {
        Ok(folder)
    } else {
        Err(ctx.forbidden(format!("{} permission on folder `{folder_id}` is required", level.as_str())))
    }
}

async fn create_folder(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Folder>), ApiError> {
    if request.name.trim().is_empty() {
        return Err(ctx.invalid("folder name must not be empty"));
    }
    if let Some(parent_id) = &request.parent_id {
        require_folder(&state, &ctx, parent_id, FolderPermission::Write).await?;
    }

    let folder = state
        .store
        .folders
        .create(NewFolder {
            name: request.name,
            parent_id: request.parent_id,
            created_by: ctx.user_id().clone(),
        })
        .await
        .map_err(|error| ctx.fail(error))?;

    info!(
        event_name = "api.folder.created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        folder_id = %folder.id,
        "folder created"
    );
    Ok((StatusCode::CREATED, Json(folder)))
}

async fn list_folders(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<FolderListQuery>,
) -> Result<Json<Vec<Folder>>, ApiError> {
    if let Some(parent_id) = &query.parent_id {
        require_folder(&state, &ctx, parent_id, FolderPermission::Read).await?;
    }

    let folders = state
        .store
        .folders
        .list_children(query.parent_id.as_ref())
        .await
        .map_err(|error| ctx.fail(error))?;
    let visible = folders
        .into_iter()
        .filter(|folder| ctx.is_admin() || folder.has_permission(ctx.user_id(), FolderPermission::Read))
        .collect();
    Ok(Json(visible))
}

async fn get_folder(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(folder_id): Path<FolderId>,
) -> Result<Json<Folder>, ApiError> {
    require_folder(&state, &ctx, &folder_id, FolderPermission::Read).await.map(Json)
}

async fn update_folder(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(folder_id): Path<FolderId>,
    Json(update): Json<FolderUpdate>,
) -> Result<Json<Folder>, ApiError> {
    let mut folder = require_folder(&state, &ctx, &folder_id, FolderPermission::Admin).await?;
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ctx.invalid("folder name must not be empty"));
    }
    if let Some(parent_id) = &update.parent_id {
        if parent_id == &folder_id {
            return Err(ctx.invalid("a folder cannot be its own parent"));
        }
        let parent = require_folder(&state, &ctx, parent_id, FolderPermission::Write).await?;
        ensure_not_descendant(&state, &ctx, &folder_id, parent).await?;
    }

    update.apply(&mut folder);
    let saved = state.store.folders.save(folder).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(saved))
}

/// Walks up from `candidate_parent` and refuses the move when `folder_id` is an ancestor.
async fn ensure_not_descendant(
    state: &AppState,
    ctx: &RequestContext,
    folder_id: &FolderId,
    candidate_parent: Folder,
) -> Result<(), ApiError> {
    let mut cursor = candidate_parent.parent_id;
    while let Some(ancestor_id) = cursor {
        if &ancestor_id == folder_id {
            return Err(ctx.conflict("a folder cannot move beneath its own descendant"));
        }
        cursor = state
            .store
            .folders
            .find_by_id(&ancestor_id)
            .await
            .map_err(|error| ctx.fail(error))?
            .and_then(|ancestor| ancestor.parent_id);
    }
    Ok(())
}

async fn delete_folder(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(folder_id): Path<FolderId>,
) -> Result<StatusCode, ApiError> {
    require_folder(&state, &ctx, &folder_id, FolderPermission::Admin).await?;

    let children =
        state.store.folders.list_children(Some(&folder_id)).await.map_err(|error| ctx.fail(error))?;
    let documents =
        state.store.documents.list_in_folder(&folder_id).await.map_err(|error| ctx.fail(error))?;
    if !children.is_empty() || !documents.is_empty() {
        return Err(ctx.conflict(format!("folder `{folder_id}` is not empty")));
    }
    let forms = state.store.forms.list().await.map_err(|error| ctx.fail(error))?;
    if forms.iter().any(|form| form.target_folder_id.as_ref() == Some(&folder_id)) {
        return Err(ctx.conflict(format!("folder `{folder_id}` is the target of an approval form")));
    }

    state.store.folders.delete(&folder_id).await.map_err(|error| ctx.fail(error))?;
    info!(
        event_name = "api.folder.deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        folder_id = %folder_id,
        "folder deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn grant_access(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(folder_id): Path<FolderId>,
    Json(request): Json<GrantAccessRequest>,
) -> Result<Json<Folder>, ApiError> {
    let mut folder = require_folder(&state, &ctx, &folder_id, FolderPermission::Admin).await?;
    folder.grant(request.user_id.clone(), request.permission);
    let saved = state.store.folders.save(folder).await.map_err(|error| ctx.fail(error))?;

    info!(
        event_name = "api.folder.access_granted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        folder_id = %folder_id,
        grantee_id = %request.user_id,
        permission = request.permission.as_str(),
        "folder access granted"
    );
    Ok(Json(saved))
}

async fn revoke_access(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((folder_id, user_id)): Path<(FolderId, UserId)>,
) -> Result<Json<Folder>, ApiError> {
    let mut folder = require_folder(&state, &ctx, &folder_id, FolderPermission::Admin).await?;
    folder.revoke(&user_id);
    let saved = state.store.folders.save(folder).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(saved))
}
