use std::collections::{BTreeMap, HashMap};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docroute_core::domain::document::{Document, DocumentId, DocumentUpdate, NewDocument};
use docroute_core::domain::folder::{FolderId, FolderPermission};
use docroute_db::BlobError;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::context::{ApiError, RequestContext};
use super::folders::require_folder;
use super::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub folder_id: FolderId,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub folder_id: Option<FolderId>,
}

pub fn routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload_document).get(list_documents))
        .route("/documents/{id}", get(get_document).put(update_document).delete(delete_document))
        .route("/documents/{id}/content", get(download_content))
        .layer(DefaultBodyLimit::max(upload_limit))
}

/// Filed documents follow their folder's grants; unfiled ones belong to their creator.
async fn authorize(
    state: &AppState,
    ctx: &RequestContext,
    document: &Document,
    level: FolderPermission,
) -> Result<(), ApiError> {
    match &document.folder_id {
        Some(folder_id) => require_folder(state, ctx, folder_id, level).await.map(|_| ()),
        None if ctx.is_admin() || &document.created_by == ctx.user_id() => Ok(()),
        None => Err(ctx.forbidden(format!("document `{}` is visible to its creator only", document.id))),
    }
}

async fn load_document(
    state: &AppState,
    ctx: &RequestContext,
    document_id: &DocumentId,
    level: FolderPermission,
) -> Result<Document, ApiError> {
    let document = state
        .store
        .documents
        .find_by_id(document_id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.not_found("document", document_id))?;
    authorize(state, ctx, &document, level).await?;
    Ok(document)
}

async fn upload_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    if query.name.trim().is_empty() {
        return Err(ctx.invalid("document name must not be empty"));
    }
    if body.is_empty() {
        return Err(ctx.invalid("uploaded file is empty"));
    }
    require_folder(&state, &ctx, &query.folder_id, FolderPermission::Write).await?;

    let file_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let file_size = body.len() as u64;
    let key = format!("uploads/{}", Uuid::new_v4());
    let file_path =
        state.store.blobs.store_blob(&key, body.to_vec()).await.map_err(|error| ctx.integration(error))?;

    let created = state
        .store
        .documents
        .create(NewDocument {
            name: query.name,
            folder_id: Some(query.folder_id),
            file_path: file_path.clone(),
            file_type,
            file_size,
            created_by: ctx.user_id().clone(),
            metadata: BTreeMap::new(),
        })
        .await;
    let document = match created {
        Ok(document) => document,
        Err(error) => {
            if let Err(cleanup) = state.store.blobs.delete_blob(&file_path).await {
                warn!(
                    event_name = "api.document.orphaned_blob",
                    correlation_id = %ctx.correlation_id,
                    file_path = %file_path,
                    error = %cleanup,
                    "uploaded blob could not be removed"
                );
            }
            return Err(ctx.fail(error));
        }
    };

    info!(
        event_name = "api.document.uploaded",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        document_id = %document.id,
        file_size = document.file_size,
        "document uploaded"
    );
    Ok((StatusCode::CREATED, Json(document)))
}

async fn list_documents(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    if let Some(folder_id) = &query.folder_id {
        require_folder(&state, &ctx, folder_id, FolderPermission::Read).await?;
        let documents =
            state.store.documents.list_in_folder(folder_id).await.map_err(|error| ctx.fail(error))?;
        return Ok(Json(documents));
    }

    let documents = state.store.documents.list().await.map_err(|error| ctx.fail(error))?;
    if ctx.is_admin() {
        return Ok(Json(documents));
    }
    let folders: HashMap<FolderId, _> = state
        .store
        .folders
        .list()
        .await
        .map_err(|error| ctx.fail(error))?
        .into_iter()
        .map(|folder| (folder.id.clone(), folder))
        .collect();

    let visible = documents
        .into_iter()
        .filter(|document| match &document.folder_id {
            Some(folder_id) => folders
                .get(folder_id)
                .is_some_and(|folder| folder.has_permission(ctx.user_id(), FolderPermission::Read)),
            None => &document.created_by == ctx.user_id(),
        })
        .collect();
    Ok(Json(visible))
}

async fn get_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<DocumentId>,
) -> Result<Json<Document>, ApiError> {
    load_document(&state, &ctx, &document_id, FolderPermission::Read).await.map(Json)
}

async fn update_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<DocumentId>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Json<Document>, ApiError> {
    let mut document = load_document(&state, &ctx, &document_id, FolderPermission::Write).await?;
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(ctx.invalid("document name must not be empty"));
    }
    if let Some(target) = &update.folder_id {
        if document.folder_id.as_ref() != Some(target) {
            require_folder(&state, &ctx, target, FolderPermission::Write).await?;
        }
    }

    update.apply(&mut document);
    let saved = state.store.documents.save(document).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(saved))
}

async fn delete_document(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<DocumentId>,
) -> Result<StatusCode, ApiError> {
    let document = load_document(&state, &ctx, &document_id, FolderPermission::Admin).await?;

    state.store.documents.delete(&document_id).await.map_err(|error| ctx.fail(error))?;
    if let Err(error) = state.store.blobs.delete_blob(&document.file_path).await {
        warn!(
            event_name = "api.document.orphaned_blob",
            correlation_id = %ctx.correlation_id,
            document_id = %document_id,
            error = %error,
            "document removed but its blob could not be deleted"
        );
    }

    info!(
        event_name = "api.document.deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        document_id = %document_id,
        "document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn download_content(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(document_id): Path<DocumentId>,
) -> Result<Response, ApiError> {
    let document = load_document(&state, &ctx, &document_id, FolderPermission::Read).await?;
    let bytes = match state.store.blobs.read_blob(&document.file_path).await {
        Ok(bytes) => bytes,
        Err(BlobError::NotFound(path)) => return Err(ctx.not_found("blob", path)),
        Err(error) => return Err(ctx.integration(error)),
    };

    Ok(([(header::CONTENT_TYPE, document.file_type)], bytes).into_response())
}
