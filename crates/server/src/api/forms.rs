use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use docroute_core::domain::application::{ApplicationFilter, FormData};
use docroute_core::domain::folder::{FolderId, FolderPermission};
use docroute_core::domain::form::{ApprovalForm, FormId, FormUpdate, NewApprovalForm, NewFormField};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::{ApiError, RequestContext};
use super::folders::require_folder;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<NewFormField>,
    #[serde(default)]
    pub target_folder_id: Option<FolderId>,
}

#[derive(Debug, Deserialize)]
pub struct InitializeFormRequest {
    pub form_id: FormId,
    #[serde(default)]
    pub initial_values: FormData,
}

#[derive(Debug, Serialize)]
pub struct InitializedForm {
    pub form: ApprovalForm,
    pub values: FormData,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/approval-forms", post(create_form).get(list_forms))
        .route("/approval-forms/initialize", post(initialize_form))
        .route("/approval-forms/{id}", get(get_form).put(update_form).delete(delete_form))
}

async fn load_form(
    state: &AppState,
    ctx: &RequestContext,
    form_id: &FormId,
) -> Result<ApprovalForm, ApiError> {
    state
        .store
        .forms
        .find_by_id(form_id)
        .await
        .map_err(|error| ctx.fail(error))?
        .ok_or_else(|| ctx.not_found("form", form_id))
}

async fn create_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<ApprovalForm>), ApiError> {
    let new_form = NewApprovalForm {
        name: request.name,
        description: request.description,
        fields: request.fields,
        created_by: ctx.user_id().clone(),
        target_folder_id: request.target_folder_id,
    };
    new_form.validate().map_err(|error| ctx.fail(error))?;
    if let Some(folder_id) = &new_form.target_folder_id {
        require_folder(&state, &ctx, folder_id, FolderPermission::Write).await?;
    }

    let form = state.store.forms.create(new_form).await.map_err(|error| ctx.fail(error))?;
    info!(
        event_name = "api.form.created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        form_id = %form.id,
        fields = form.fields.len(),
        "approval form created"
    );
    Ok((StatusCode::CREATED, Json(form)))
}

async fn list_forms(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<ApprovalForm>>, ApiError> {
    state.store.forms.list().await.map(Json).map_err(|error| ctx.fail(error))
}

async fn get_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(form_id): Path<FormId>,
) -> Result<Json<ApprovalForm>, ApiError> {
    load_form(&state, &ctx, &form_id).await.map(Json)
}

async fn update_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(form_id): Path<FormId>,
    Json(update): Json<FormUpdate>,
) -> Result<Json<ApprovalForm>, ApiError> {
    let mut form = load_form(&state, &ctx, &form_id).await?;
    ctx.ensure_owner(&form.created_by, "this form")?;
    update.validate().map_err(|error| ctx.fail(error))?;
    if let Some(folder_id) = &update.target_folder_id {
        if form.target_folder_id.as_ref() != Some(folder_id) {
            require_folder(&state, &ctx, folder_id, FolderPermission::Write).await?;
        }
    }

    update.apply(&mut form);
    let saved = state.store.forms.save(form).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(saved))
}

async fn delete_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(form_id): Path<FormId>,
) -> Result<StatusCode, ApiError> {
    let form = load_form(&state, &ctx, &form_id).await?;
    ctx.ensure_owner(&form.created_by, "this form")?;

    let referencing = state
        .store
        .applications
        .list_by(&ApplicationFilter::by_form(form_id.clone()))
        .await
        .map_err(|error| ctx.fail(error))?;
    if !referencing.is_empty() {
        return Err(ctx.conflict(format!(
            "form `{form_id}` is used by {} application(s)",
            referencing.len()
        )));
    }

    state.store.forms.delete(&form_id).await.map_err(|error| ctx.fail(error))?;
    info!(
        event_name = "api.form.deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.user_id(),
        form_id = %form_id,
        "approval form deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Field defaults merged with the caller's initial values, ready to seed a draft.
async fn initialize_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<InitializeFormRequest>,
) -> Result<Json<InitializedForm>, ApiError> {
    let form = load_form(&state, &ctx, &request.form_id).await?;
    let values = form.initial_values(&request.initial_values);
    Ok(Json(InitializedForm { form, values }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::testing::{request, seeded_app, send};

    fn expense_form() -> serde_json::Value {
        json!({
            "name": "Travel Request",
            "fields": [
                { "name": "destination", "label": "Destination", "type": "text", "required": true, "order": 1 },
                { "name": "nights", "label": "Nights", "type": "number", "default_value": 1, "order": 2 }
            ]
        })
    }

    #[tokio::test]
    async fn forms_are_created_with_ordered_fields() {
        let (app, _) = seeded_app().await;

        let (status, body) =
            send(&app, request("POST", "/approval-forms", "user", Some(expense_form()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created_by"], json!("user"));
        assert_eq!(body["fields"][0]["name"], json!("destination"));
        assert_eq!(body["fields"][1]["type"], json!("number"));

        let (status, body) = send(&app, request("GET", "/approval-forms", "user", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn duplicate_field_names_are_a_bad_request() {
        let (app, _) = seeded_app().await;
        let payload = json!({
            "name": "Broken",
            "fields": [
                { "name": "amount", "label": "Amount", "type": "number", "order": 1 },
                { "name": "amount", "label": "Again", "type": "number", "order": 2 }
            ]
        });

        let (status, body) = send(&app, request("POST", "/approval-forms", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("bad_request"));
    }

    #[tokio::test]
    async fn only_owners_and_admins_change_forms() {
        let (app, _) = seeded_app().await;
        let (_, created) =
            send(&app, request("POST", "/approval-forms", "user", Some(expense_form()))).await;
        let uri = format!("/approval-forms/{}", created["id"].as_str().unwrap_or_default());

        let (status, _) =
            send(&app, request("PUT", &uri, "mallory", Some(json!({ "name": "Hijacked" })))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app, request("PUT", &uri, "admin", Some(json!({ "name": "Travel" })))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], json!("Travel"));

        let (status, _) = send(&app, request("DELETE", &uri, "user", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn forms_in_use_cannot_be_deleted() {
        let (app, seeded) = seeded_app().await;
        let uri = format!("/approval-forms/{}", seeded.form_id);

        let (status, _) = send(&app, request("DELETE", &uri, "admin", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn initialize_merges_defaults_with_provided_values() {
        let (app, _) = seeded_app().await;
        let (_, created) =
            send(&app, request("POST", "/approval-forms", "user", Some(expense_form()))).await;

        let payload = json!({
            "form_id": created["id"],
            "initial_values": { "destination": "Lisbon" }
        });
        let (status, body) =
            send(&app, request("POST", "/approval-forms/initialize", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["values"], json!({ "destination": "Lisbon", "nights": 1 }));
        assert_eq!(body["form"]["name"], json!("Travel Request"));
    }

    #[tokio::test]
    async fn targeting_a_folder_needs_write_on_it() {
        let (app, seeded) = seeded_app().await;
        let mut payload = expense_form();
        payload["target_folder_id"] = json!(seeded.applications_folder_id.as_str());

        let (status, _) = send(&app, request("POST", "/approval-forms", "user", Some(payload))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
