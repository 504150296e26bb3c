use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use docroute_core::domain::application::{
    Application, ApplicationFilter, ApplicationId, ApplicationStatus, DraftUpdate, FormData,
    NewApplication,
};
use docroute_core::domain::form::FormId;
use docroute_core::domain::progress::ApplicationProgress;
use docroute_core::domain::route::RouteId;
use docroute_core::errors::WorkflowError;
use serde::Deserialize;

use super::context::{ApiError, RequestContext};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub form_id: FormId,
    pub route_id: RouteId,
    #[serde(default)]
    pub form_data: FormData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
}

/// Body of the submit/approve/reject/cancel actions.
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub application_id: ApplicationId,
    #[serde(default)]
    pub comment: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/applications", post(create_application).get(list_own_applications))
        .route("/applications/for-approval", get(list_for_approval))
        .route("/applications/submit", post(submit_application))
        .route("/applications/approve", post(approve_application))
        .route("/applications/reject", post(reject_application))
        .route("/applications/cancel", post(cancel_application))
        .route(
            "/applications/{id}",
            get(get_application).put(update_application).delete(delete_application),
        )
        .route("/applications/{id}/progress", get(get_progress))
}

async fn load_application(
    state: &AppState,
    ctx: &RequestContext,
    application_id: &ApplicationId,
) -> Result<Application, ApiError> {
    state
        .store
        .applications
        .find_by_id(application_id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.fail(WorkflowError::not_found("application", application_id)))
}

/// Applicants, admins and approvers on the application's route may look at it.
async fn ensure_viewer(
    state: &AppState,
    ctx: &RequestContext,
    application: &Application,
) -> Result<(), ApiError> {
    if ctx.is_admin() || application.is_applicant(ctx.user_id()) {
        return Ok(());
    }
    let route = state
        .store
        .routes
        .find_by_id(&application.route_id)
        .await
        .map_err(|error| ctx.fail(error))?;
    if route.is_some_and(|route| route.has_approver(ctx.user_id())) {
        Ok(())
    } else {
        Err(ctx.forbidden(format!("application `{}` is not visible to this caller", application.id)))
    }
}

fn not_applicant(ctx: &RequestContext, application: &Application) -> ApiError {
    ctx.fail(WorkflowError::NotApplicant {
        application_id: application.id.clone(),
        actor_id: ctx.user_id().clone(),
    })
}

async fn create_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let application = state
        .engine
        .open_draft(
            NewApplication {
                form_id: request.form_id,
                route_id: request.route_id,
                applicant_id: ctx.user_id().clone(),
                form_data: request.form_data,
            },
            &ctx.audit(),
        )
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn list_own_applications(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let mut filter = ApplicationFilter::by_applicant(ctx.user_id().clone());
    if let Some(raw) = query.status.as_deref() {
        let status = ApplicationStatus::parse(raw)
            .ok_or_else(|| ctx.invalid(format!("unknown application status `{raw}`")))?;
        filter = filter.with_status(status);
    }

    state.store.applications.list_by(&filter).await.map(Json).map_err(|error| ctx.fail(error))
}

async fn list_for_approval(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<Application>>, ApiError> {
    state.engine.pending_for_approver(ctx.user_id()).await.map(Json).map_err(|error| ctx.fail(error))
}

async fn get_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(application_id): Path<ApplicationId>,
) -> Result<Json<Application>, ApiError> {
    let application = load_application(&state, &ctx, &application_id).await?;
    ensure_viewer(&state, &ctx, &application).await?;
    Ok(Json(application))
}

async fn get_progress(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(application_id): Path<ApplicationId>,
) -> Result<Json<ApplicationProgress>, ApiError> {
    let application = load_application(&state, &ctx, &application_id).await?;
    ensure_viewer(&state, &ctx, &application).await?;
    state.engine.progress(&application_id).await.map(Json).map_err(|error| ctx.fail(error))
}

async fn update_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(application_id): Path<ApplicationId>,
    Json(update): Json<DraftUpdate>,
) -> Result<Json<Application>, ApiError> {
    state
        .engine
        .update_draft(&application_id, ctx.user_id(), update, &ctx.audit())
        .await
        .map(Json)
        .map_err(|error| ctx.fail(error))
}

async fn delete_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(application_id): Path<ApplicationId>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .discard_draft(&application_id, ctx.user_id(), &ctx.audit())
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<Application>, ApiError> {
    let application = load_application(&state, &ctx, &request.application_id).await?;
    if !application.is_applicant(ctx.user_id()) {
        return Err(not_applicant(&ctx, &application));
    }

    let _route_guard = state.route_edits.read().await;
    state
        .engine
        .submit(&request.application_id, &ctx.audit())
        .await
        .map(Json)
        .map_err(|error| ctx.fail(error))
}

async fn approve_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<Application>, ApiError> {
    state
        .engine
        .approve(&request.application_id, ctx.user_id(), request.comment, &ctx.audit())
        .await
        .map(Json)
        .map_err(|error| ctx.fail(error))
}

async fn reject_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<Application>, ApiError> {
    state
        .engine
        .reject(&request.application_id, ctx.user_id(), request.comment, &ctx.audit())
        .await
        .map(Json)
        .map_err(|error| ctx.fail(error))
}

async fn cancel_application(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<WorkflowRequest>,
) -> Result<Json<Application>, ApiError> {
    let application = load_application(&state, &ctx, &request.application_id).await?;
    if !ctx.is_admin() && !application.is_applicant(ctx.user_id()) {
        return Err(not_applicant(&ctx, &application));
    }

    state
        .engine
        .cancel(&request.application_id, &ctx.audit())
        .await
        .map(Json)
        .map_err(|error| ctx.fail(error))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::testing::{request, seeded_app, send, TestApp};

    async fn act(app: &TestApp, action: &str, user: &str, application_id: &Value) -> (StatusCode, Value) {
        let uri = format!("/applications/{action}");
        let body = json!({ "application_id": application_id, "comment": format!("{action} by {user}") });
        send(app, request("POST", &uri, user, Some(body))).await
    }

    async fn two_step_route(app: &TestApp) -> Value {
        let payload = json!({
            "name": "Two signatures",
            "steps": [
                { "approver_id": "alice", "order": 1 },
                { "approver_id": "bob", "order": 2 }
            ]
        });
        let (status, route) = send(app, request("POST", "/approval-routes", "admin", Some(payload))).await;
        assert_eq!(status, StatusCode::CREATED);
        route["id"].clone()
    }

    #[tokio::test]
    async fn seeded_application_is_approved_and_filed() {
        let (app, seeded) = seeded_app().await;
        let id = json!(seeded.application_id.as_str());

        let (status, _) = act(&app, "submit", "mallory", &id).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = act(&app, "submit", "user", &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("pending"));

        let (_, inbox) = send(&app, request("GET", "/applications/for-approval", "admin", None)).await;
        assert_eq!(inbox.as_array().map(Vec::len), Some(1));
        let (_, inbox) = send(&app, request("GET", "/applications/for-approval", "user", None)).await;
        assert_eq!(inbox, json!([]));

        let (status, body) = act(&app, "approve", "user", &id).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], json!("forbidden"));

        let (status, body) = act(&app, "approve", "admin", &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("approved"));
        assert_eq!(body["current_step"], json!(1));
        let document_id = body["document_id"].as_str().unwrap_or_default().to_string();
        assert!(!document_id.is_empty());

        let (status, document) =
            send(&app, request("GET", &format!("/documents/{document_id}"), "admin", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["folder_id"], json!(seeded.applications_folder_id.as_str()));
        assert_eq!(document["file_type"], json!("application/json"));

        let uri = format!("/applications/{}/progress", seeded.application_id);
        let (status, progress) = send(&app, request("GET", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["steps"][0]["status"], json!("approved"));
        assert_eq!(progress["steps"][0]["comment"], json!("approve by admin"));

        assert_eq!(app.audit.events_of_type("workflow.completed").len(), 1);
    }

    #[tokio::test]
    async fn rejection_closes_the_application() {
        let (app, seeded) = seeded_app().await;
        let route_id = two_step_route(&app).await;
        let payload = json!({ "form_id": seeded.form_id, "route_id": route_id, "form_data": { "amount": 40 } });
        let (status, created) = send(&app, request("POST", "/applications", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], json!("draft"));
        let id = created["id"].clone();

        act(&app, "submit", "user", &id).await;
        let (status, _) = act(&app, "approve", "alice", &id).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = act(&app, "reject", "bob", &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("rejected"));
        assert_eq!(body["document_id"], Value::Null);

        let (status, body) = act(&app, "approve", "bob", &id).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("conflict"));

        let (_, own) = send(&app, request("GET", "/applications?status=rejected", "user", None)).await;
        assert_eq!(own.as_array().map(Vec::len), Some(1));
        let (status, _) = send(&app, request("GET", "/applications?status=bogus", "user", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn visibility_covers_applicant_admin_and_route_approvers() {
        let (app, seeded) = seeded_app().await;
        let route_id = two_step_route(&app).await;
        let payload = json!({ "form_id": seeded.form_id, "route_id": route_id });
        let (_, created) = send(&app, request("POST", "/applications", "user", Some(payload))).await;
        let uri = format!("/applications/{}", created["id"].as_str().unwrap_or_default());

        for (viewer, expected) in [
            ("user", StatusCode::OK),
            ("admin", StatusCode::OK),
            ("bob", StatusCode::OK),
            ("mallory", StatusCode::FORBIDDEN),
        ] {
            let (status, _) = send(&app, request("GET", &uri, viewer, None)).await;
            assert_eq!(status, expected, "viewer {viewer}");
        }

        let (status, _) = send(&app, request("GET", "/applications/missing", "admin", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn drafts_are_edited_and_discarded_by_the_applicant() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/applications/{}", seeded.application_id);
        let edit = json!({ "form_data": { "amount": 120.5, "description": "Monitors" } });

        let (status, _) = send(&app, request("PUT", &uri, "mallory", Some(edit.clone()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(&app, request("PUT", &uri, "user", Some(edit.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["form_data"]["description"], json!("Monitors"));

        let id = json!(seeded.application_id.as_str());
        act(&app, "submit", "user", &id).await;
        let (status, _) = send(&app, request("PUT", &uri, "user", Some(edit))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, request("DELETE", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = act(&app, "cancel", "admin", &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("canceled"));
    }

    #[tokio::test]
    async fn discarding_a_draft_removes_it() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/applications/{}", seeded.application_id);

        let (status, _) = send(&app, request("DELETE", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request("GET", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn drafts_need_an_existing_form() {
        let (app, seeded) = seeded_app().await;
        let payload = json!({ "form_id": "missing", "route_id": seeded.route_id });

        let (status, body) = send(&app, request("POST", "/applications", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["correlation_id"], json!("req-user"));
    }
}
