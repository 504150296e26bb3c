use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use docroute_db::{FilesystemBlobStore, Store};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    store: Store,
    blobs: Arc<FilesystemBlobStore>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub store: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Store, blob_root: PathBuf) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { store, blobs: Arc::new(FilesystemBlobStore::new(blob_root)) })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store = store_check(&state.store).await;
    let storage = storage_check(&state.blobs).await;
    let ready = store.status == "ready" && storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "docroute-server runtime initialized".to_string(),
        },
        store,
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn store_check(store: &Store) -> HealthCheck {
    match store.routes.list().await {
        Ok(routes) => {
            HealthCheck { status: "ready", detail: format!("{} approval routes loaded", routes.len()) }
        }
        Err(error) => HealthCheck { status: "degraded", detail: format!("store query failed: {error}") },
    }
}

async fn storage_check(blobs: &FilesystemBlobStore) -> HealthCheck {
    match blobs.ensure_writable().await {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: format!("blob root {} is writable", blobs.root().display()),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
