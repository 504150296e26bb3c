use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use docroute_core::domain::application::{ApplicationFilter, ApplicationStatus};
use docroute_core::domain::route::{ApprovalRoute, NewApprovalRoute, NewRouteStep, RouteId, RouteUpdate};
use serde::Deserialize;
use tracing::info;

use super::context::{ApiError, RequestContext};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<NewRouteStep>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/approval-routes", post(create_route).get(list_routes))
        .route("/approval-routes/{id}", get(get_route).put(update_route).delete(delete_route))
}

async fn load_route(
    state: &AppState,
    ctx: &RequestContext,
    route_id: &RouteId,
) -> Result<ApprovalRoute, ApiError> {
    state
        .store
        .routes
        .find_by_id(route_id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.not_found("route", route_id))
}

async fn create_route(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<ApprovalRoute>), ApiError> {
    let new_route = NewApprovalRoute {
        name: request.name,
        description: request.description,
        steps: request.steps,
        created_by: ctx.user_id().clone(),
    };
    new_route.validate().map_err(|error| ctx.fail(error))?;

    let route = state.store.routes.create(new_route).await.map_err(|error| ctx.fail(error))?;
    info!(
        event_name = "api.route.created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        route_id = %route.id,
        steps = route.len(),
        "approval route created"
    );
    Ok((StatusCode::CREATED, Json(route)))
}

async fn list_routes(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<ApprovalRoute>>, ApiError> {
    state.store.routes.list().await.map(Json).map_err(|error| ctx.fail(error))
}

async fn get_route(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(route_id): Path<RouteId>,
) -> Result<Json<ApprovalRoute>, ApiError> {
    load_route(&state, &ctx, &route_id).await.map(Json)
}

async fn update_route(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(route_id): Path<RouteId>,
    Json(update): Json<RouteUpdate>,
) -> Result<Json<ApprovalRoute>, ApiError> {
    let mut route = load_route(&state, &ctx, &route_id).await?;
    ctx.ensure_owner(&route.created_by, "this route")?;
    update.validate().map_err(|error| ctx.fail(error))?;

    // Submitted applications index into the step list by position and keep per-step history.
    let _route_guard = if update.replaces_steps() {
        let guard = state.route_edits.write().await;
        let referencing = state
            .store
            .applications
            .list_by(&ApplicationFilter::by_route(route_id.clone()))
            .await
            .map_err(|error| ctx.fail(error))?;
        let submitted = referencing
            .iter()
            .filter(|application| application.status != ApplicationStatus::Draft)
            .count();
        if submitted > 0 {
            return Err(ctx.conflict(format!(
                "route `{route_id}` is used by {submitted} submitted application(s); its steps cannot be replaced"
            )));
        }
        Some(guard)
    } else {
        None
    };

    update.apply(&mut route);
    let saved = state.store.routes.save(route).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(saved))
}

async fn delete_route(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(route_id): Path<RouteId>,
) -> Result<StatusCode, ApiError> {
    let route = load_route(&state, &ctx, &route_id).await?;
    ctx.ensure_owner(&route.created_by, "this route")?;

    let referencing = state
        .store
        .applications
        .list_by(&ApplicationFilter::by_route(route_id.clone()))
        .await
        .map_err(|error| ctx.fail(error))?;
    if !referencing.is_empty() {
        return Err(ctx.conflict(format!(
            "route `{route_id}` is used by {} application(s)",
            referencing.len()
        )));
    }

    state.store.routes.delete(&route_id).await.map_err(|error| ctx.fail(error))?;
    info!(
        event_name = "api.route.deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        route_id = %route_id,
        "approval route deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::testing::{request, seeded_app, send};

    #[tokio::test]
    async fn steps_are_stored_in_order() {
        let (app, _) = seeded_app().await;
        let payload = json!({
            "name": "Two signatures",
            "steps": [
                { "approver_id": "bob", "order": 2 },
                { "approver_id": "alice", "order": 1 }
            ]
        });

        let (status, body) = send(&app, request("POST", "/approval-routes", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["steps"][0]["approver_id"], json!("alice"));
        assert_eq!(body["steps"][1]["approver_id"], json!("bob"));
    }

    #[tokio::test]
    async fn empty_or_tied_step_lists_are_rejected() {
        let (app, _) = seeded_app().await;

        let empty = json!({ "name": "Nobody", "steps": [] });
        let (status, _) = send(&app, request("POST", "/approval-routes", "user", Some(empty))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let tied = json!({
            "name": "Tied",
            "steps": [
                { "approver_id": "alice", "order": 1 },
                { "approver_id": "bob", "order": 1 }
            ]
        });
        let (status, _) = send(&app, request("POST", "/approval-routes", "user", Some(tied))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn steps_are_frozen_while_applications_are_pending() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/approval-routes/{}", seeded.route_id);
        let new_steps = json!({ "steps": [{ "approver_id": "carol", "order": 1 }] });

        let (status, _) = send(
            &app,
            request("POST", "/applications/submit", "user", Some(json!({ "application_id": seeded.application_id }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, request("PUT", &uri, "admin", Some(new_steps))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) =
            send(&app, request("PUT", &uri, "admin", Some(json!({ "name": "Manager sign-off" })))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], json!("Manager sign-off"));
    }

    #[tokio::test]
    async fn steps_stay_fixed_once_an_application_is_approved() {
        let (app, seeded) = seeded_app().await;
        let body = json!({ "application_id": seeded.application_id });

        let (status, _) =
            send(&app, request("POST", "/applications/submit", "user", Some(body.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, approved) =
            send(&app, request("POST", "/applications/approve", "admin", Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], json!("approved"));

        let uri = format!("/approval-routes/{}", seeded.route_id);
        let new_steps = json!({
            "steps": [
                { "approver_id": "alice", "order": 1 },
                { "approver_id": "bob", "order": 2 }
            ]
        });
        let (status, body) = send(&app, request("PUT", &uri, "admin", Some(new_steps))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("conflict"));

        let progress_uri = format!("/applications/{}/progress", seeded.application_id);
        let (status, progress) = send(&app, request("GET", &progress_uri, "user", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["current_step"], json!(1));
        assert_eq!(progress["total_steps"], json!(1));
        assert_eq!(progress["steps"][0]["status"], json!("approved"));
    }

    #[tokio::test]
    async fn steps_can_be_replaced_while_only_drafts_use_the_route() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/approval-routes/{}", seeded.route_id);
        let new_steps = json!({
            "steps": [
                { "approver_id": "admin", "order": 1 },
                { "approver_id": "carol", "order": 2 }
            ]
        });

        let (status, body) = send(&app, request("PUT", &uri, "admin", Some(new_steps))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn referenced_routes_cannot_be_deleted_and_owners_are_enforced() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/approval-routes/{}", seeded.route_id);

        let (status, _) = send(&app, request("DELETE", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request("DELETE", &uri, "admin", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
