pub mod access;
pub mod artifacts;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod store;
pub mod workflow;

pub use access::FolderAccess;
pub use artifacts::{ArtifactError, ArtifactGenerator, ArtifactRequest};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::application::{
    Application, ApplicationFilter, ApplicationId, ApplicationStatus, DraftUpdate, FormData,
    NewApplication,
};
pub use domain::document::{Document, DocumentId};
pub use domain::folder::{Folder, FolderId, FolderPermission};
pub use domain::form::{ApprovalForm, FormId};
pub use domain::principal::{AuthenticatedPrincipal, Role, UserId};
pub use domain::progress::{ApplicationProgress, StepProgress, StepStatus};
pub use domain::route::{ApprovalRoute, RouteId, RouteStep, StepId};
pub use errors::{ApplicationError, DomainError, InterfaceError, RepositoryError, WorkflowError};
pub use store::{ApplicationRepository, FormRepository, RouteRepository, StepProgressRepository};
pub use workflow::{ApprovalWorkflowEngine, StepLookup, WorkflowSettings, WorkflowStores};
