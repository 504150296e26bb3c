use thiserror::Error;

use crate::domain::application::{ApplicationId, ApplicationStatus};
use crate::domain::principal::UserId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("an approval route needs at least one step")]
    EmptyRoute,
    #[error("step order {0} is used more than once")]
    DuplicateStepOrder(u32),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{kind} `{id}` is missing from the store")]
    Missing { kind: &'static str, id: String },
    #[error("{kind} `{id}` changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict { kind: &'static str, id: String, expected: u64, actual: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("cannot {operation} application `{application_id}` while it is {status:?}")]
    InvalidState {
        application_id: ApplicationId,
        status: ApplicationStatus,
        operation: &'static str,
    },
    #[error("`{actor_id}` is not the approver of step {position} on application `{application_id}`")]
    NotAuthorizedStep { application_id: ApplicationId, actor_id: UserId, position: usize },
    #[error("`{actor_id}` is not the applicant of application `{application_id}`")]
    NotApplicant { application_id: ApplicationId, actor_id: UserId },
    #[error(
        "application `{application_id}` is pending at step {current_step} of a {total_steps}-step route"
    )]
    RouteExhausted { application_id: ApplicationId, current_step: usize, total_steps: usize },
    #[error("artifact generation failed for application `{application_id}`: {reason}")]
    ArtifactGenerationFailed { application_id: ApplicationId, reason: String },
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::NotAuthorizedStep { .. } => "not_authorized_step",
            Self::NotApplicant { .. } => "not_applicant",
            Self::RouteExhausted { .. } => "route_exhausted",
            Self::ArtifactGenerationFailed { .. } => "artifact_generation_failed",
            Self::Store(_) => "store",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

impl ApplicationError {
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::Conflict { .. } => {
                "The resource is not in a state that allows this action. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Forbidden { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

const UNASSIGNED: &str = "unassigned";

fn store_fault(error: RepositoryError) -> InterfaceError {
    let message = error.to_string();
    match error {
        RepositoryError::VersionConflict { .. } => {
            InterfaceError::Conflict { message, correlation_id: UNASSIGNED.to_owned() }
        }
        RepositoryError::Missing { .. } | RepositoryError::Unavailable(_) => {
            InterfaceError::Internal { message, correlation_id: UNASSIGNED.to_owned() }
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::Domain(_) | ApplicationError::InvalidInput(_) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Forbidden(_) => Self::Forbidden { message, correlation_id },
            ApplicationError::Conflict(_) => Self::Conflict { message, correlation_id },
            ApplicationError::Persistence(error) => store_fault(error),
            ApplicationError::Workflow(error) => match error {
                WorkflowError::NotFound { .. } => Self::NotFound { message, correlation_id },
                WorkflowError::InvalidState { .. } => Self::Conflict { message, correlation_id },
                WorkflowError::NotAuthorizedStep { .. } | WorkflowError::NotApplicant { .. } => {
                    Self::Forbidden { message, correlation_id }
                }
                WorkflowError::ArtifactGenerationFailed { .. } => {
                    Self::ServiceUnavailable { message, correlation_id }
                }
                WorkflowError::RouteExhausted { .. } => Self::Internal { message, correlation_id },
                WorkflowError::Store(error) => store_fault(error),
            },
            ApplicationError::Integration(_) => Self::ServiceUnavailable { message, correlation_id },
        }
    }
}
