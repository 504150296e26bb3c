//! JSON API over the store and the workflow engine.
//!
//! Resources:
//! - `/folders`, `/folders/{id}`, `/folders/{id}/access[/{user_id}]`
//! - `/documents`, `/documents/{id}`, `/documents/{id}/content`
//! - `/approval-forms`, `/approval-forms/{id}`, `/approval-forms/initialize`
//! - `/approval-routes`, `/approval-routes/{id}`
//! - `/applications`, `/applications/{id}[/progress]`, `/applications/for-approval`,
//!   `/applications/{submit,approve,reject,cancel}`
//!
//! Callers are identified by the `x-user-id` and `x-user-role` headers set by the upstream
//! gateway. `x-request-id` becomes the correlation id when present.

mod applications;
mod context;
mod documents;
mod folders;
mod forms;
mod routes;

use std::sync::Arc;

use axum::Router;
use docroute_core::workflow::ApprovalWorkflowEngine;
use docroute_db::Store;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub engine: ApprovalWorkflowEngine,
    pub max_upload_bytes: u64,
    /// Submits hold this shared; route step replacement holds it exclusively.
    pub route_edits: Arc<RwLock<()>>,
}

impl AppState {
    pub fn new(store: Store, engine: ApprovalWorkflowEngine, max_upload_bytes: u64) -> Self {
        Self { store, engine, max_upload_bytes, route_edits: Arc::new(RwLock::new(())) }
    }
}

pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .merge(folders::routes())
        .merge(documents::routes(upload_limit))
        .merge(forms::routes())
        .merge(routes::routes())
        .merge(applications::routes())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use docroute_core::audit::InMemoryAuditSink;
    use docroute_core::workflow::WorkflowSettings;
    use docroute_db::{DemoSeedDataset, InMemoryBlobStore, SeedResult, Store};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{router, AppState};

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub audit: InMemoryAuditSink,
    }

    pub fn app_with_limit(max_upload_bytes: u64) -> TestApp {
        let store = Store::in_memory(Arc::new(InMemoryBlobStore::default()));
        let audit = InMemoryAuditSink::default();
        let engine = store.workflow_engine(Arc::new(audit.clone()), WorkflowSettings::default());
        let state = AppState::new(store, engine, max_upload_bytes);
        TestApp { router: router(state.clone()), state, audit }
    }

    pub fn app() -> TestApp {
        app_with_limit(1024 * 1024)
    }

    pub async fn seeded_app() -> (TestApp, SeedResult) {
        let app = app();
        let seeded = DemoSeedDataset::load(&app.state.store).await.expect("seed dataset");
        (app, seeded)
    }

    pub fn request(method: &str, uri: &str, user: &str, body: Option<Value>) -> Request<Body> {
        let role = if user == "admin" { "admin" } else { "user" };
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user)
            .header("x-user-role", role)
            .header("x-request-id", format!("req-{user}"));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
