use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use docroute_core::audit::AuditContext;
use docroute_core::domain::principal::{AuthenticatedPrincipal, Role, UserId};
use docroute_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

const USER_HEADER: &str = "x-user-id";
const ROLE_HEADER: &str = "x-user-role";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller identity and correlation id for one request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub principal: AuthenticatedPrincipal,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn user_id(&self) -> &UserId {
        &self.principal.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.principal.is_admin()
    }

    pub fn audit(&self) -> AuditContext {
        AuditContext::new(self.correlation_id.clone(), self.principal.user_id.as_str())
    }

    /// Maps any application-layer failure onto the caller-facing error for this request.
    pub fn fail(&self, error: impl Into<ApplicationError>) -> ApiError {
        let interface = error.into().into_interface(self.correlation_id.clone());
        match &interface {
            InterfaceError::Internal { message, .. } => error!(
                event_name = "api.request.failed",
                correlation_id = %self.correlation_id,
                actor_id = %self.principal.user_id,
                error = %message,
                "request failed with an internal error"
            ),
            InterfaceError::ServiceUnavailable { message, .. } => warn!(
                event_name = "api.request.unavailable",
                correlation_id = %self.correlation_id,
                actor_id = %self.principal.user_id,
                error = %message,
                "request failed on a collaborator"
            ),
            _ => {}
        }
        ApiError::Interface(interface)
    }

    /// Owners and admins may mutate a resource.
    pub fn ensure_owner(&self, owner: &UserId, resource: &str) -> Result<(), ApiError> {
        if self.is_admin() || owner == self.user_id() {
            Ok(())
        } else {
            Err(self.forbidden(format!("only the owner of {resource} or an admin may change it")))
        }
    }

    pub fn forbidden(&self, message: impl Into<String>) -> ApiError {
        self.fail(ApplicationError::Forbidden(message.into()))
    }

    pub fn not_found(&self, kind: &'static str, id: impl std::fmt::Display) -> ApiError {
        self.fail(ApplicationError::not_found(kind, id))
    }

    pub fn conflict(&self, message: impl Into<String>) -> ApiError {
        self.fail(ApplicationError::Conflict(message.into()))
    }

    pub fn invalid(&self, message: impl Into<String>) -> ApiError {
        self.fail(ApplicationError::InvalidInput(message.into()))
    }

    pub fn integration(&self, error: impl std::fmt::Display) -> ApiError {
        self.fail(ApplicationError::Integration(error.to_string()))
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let correlation_id = header(headers, REQUEST_ID_HEADER)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()));

        let Some(user_id) = header(headers, USER_HEADER) else {
            return Err(ApiError::Unauthenticated { correlation_id });
        };
        let role = match header(headers, ROLE_HEADER) {
            None => Role::User,
            Some(raw) => match Role::parse(raw) {
                Some(role) => role,
                None => {
                    return Err(ApiError::Interface(InterfaceError::BadRequest {
                        message: format!("unknown role `{raw}`"),
                        correlation_id,
                    }))
                }
            },
        };

        Ok(Self { principal: AuthenticatedPrincipal::new(user_id, role), correlation_id })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated { correlation_id: String },
    Interface(InterfaceError),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    correlation_id: &'a str,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated { correlation_id } => {
                let body = ErrorBody {
                    error: "unauthenticated",
                    message: "A caller identity is required.",
                    detail: None,
                    correlation_id: &correlation_id,
                    retryable: false,
                };
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            ApiError::Interface(error) => {
                let (status, kind) = match &error {
                    InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
                    InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                    InterfaceError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
                    InterfaceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
                    InterfaceError::ServiceUnavailable { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
                    }
                    InterfaceError::Internal { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                    }
                };
                let detail = match &error {
                    InterfaceError::Internal { .. } => None,
                    other => Some(other.message()),
                };
                let body = ErrorBody {
                    error: kind,
                    message: error.user_message(),
                    detail,
                    correlation_id: error.correlation_id(),
                    retryable: error.is_retryable(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use docroute_core::domain::application::ApplicationId;
    use docroute_core::domain::principal::Role;
    use docroute_core::errors::{ApplicationError, WorkflowError};

    use super::{ApiError, RequestContext};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn identity_headers_build_the_principal() {
        let context = RequestContext::from_headers(&headers(&[
            ("x-user-id", "alice"),
            ("x-user-role", "admin"),
            ("x-request-id", "req-42"),
        ]))
        .expect("context");

        assert_eq!(context.user_id().as_str(), "alice");
        assert_eq!(context.principal.role, Role::Admin);
        assert_eq!(context.correlation_id, "req-42");
    }

    #[test]
    fn role_defaults_to_user_and_correlation_id_is_generated() {
        let context =
            RequestContext::from_headers(&headers(&[("x-user-id", "bob")])).expect("context");
        assert!(!context.is_admin());
        assert!(context.correlation_id.starts_with("req-"));
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        let error = RequestContext::from_headers(&headers(&[("x-user-role", "user")]))
            .expect_err("identity required");
        assert_eq!(error.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unknown_role_is_a_bad_request() {
        let error =
            RequestContext::from_headers(&headers(&[("x-user-id", "bob"), ("x-user-role", "root")]))
                .expect_err("role must parse");
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn artifact_failures_surface_as_retryable_unavailability() {
        let context =
            RequestContext::from_headers(&headers(&[("x-user-id", "bob")])).expect("context");
        let error = context.fail(ApplicationError::from(WorkflowError::ArtifactGenerationFailed {
            application_id: ApplicationId::new("app-1"),
            reason: "disk full".to_string(),
        }));
        match &error {
            ApiError::Interface(interface) => assert!(interface.is_retryable()),
            ApiError::Unauthenticated { .. } => panic!("expected interface error"),
        }
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
