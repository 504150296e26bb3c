//! Engine-facing persistence contracts.
//!
//! Implementations own identity and timestamp bookkeeping: `create` assigns a fresh id and
//! stamps `created_at`/`updated_at`, every later write refreshes `updated_at`.

use async_trait::async_trait;

use crate::domain::application::{Application, ApplicationFilter, ApplicationId, NewApplication};
use crate::domain::form::{ApprovalForm, FormId, NewApprovalForm};
use crate::domain::progress::StepProgress;
use crate::domain::route::{ApprovalRoute, NewApprovalRoute, RouteId, StepId};
use crate::errors::RepositoryError;

#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn find_by_id(&self, id: &RouteId) -> Result<Option<ApprovalRoute>, RepositoryError>;
    async fn list(&self) -> Result<Vec<ApprovalRoute>, RepositoryError>;
    async fn create(&self, route: NewApprovalRoute) -> Result<ApprovalRoute, RepositoryError>;
    async fn save(&self, route: ApprovalRoute) -> Result<ApprovalRoute, RepositoryError>;
    async fn delete(&self, id: &RouteId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn find_by_id(&self, id: &FormId) -> Result<Option<ApprovalForm>, RepositoryError>;
    async fn list(&self) -> Result<Vec<ApprovalForm>, RepositoryError>;
    async fn create(&self, form: NewApprovalForm) -> Result<ApprovalForm, RepositoryError>;
    async fn save(&self, form: ApprovalForm) -> Result<ApprovalForm, RepositoryError>;
    async fn delete(&self, id: &FormId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;

    async fn list_by(&self, filter: &ApplicationFilter)
        -> Result<Vec<Application>, RepositoryError>;

    async fn create(&self, application: NewApplication) -> Result<Application, RepositoryError>;

    /// Compare-and-swap on `state_version`. Stores the application with the version bumped
    /// and `updated_at` refreshed, or fails with `VersionConflict` when the stored version
    /// differs from `expected_version`.
    async fn update(
        &self,
        application: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError>;

    async fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait StepProgressRepository: Send + Sync {
    /// Inserts or replaces the row for `(application_id, step_id)`.
    async fn record(&self, progress: StepProgress) -> Result<(), RepositoryError>;

    async fn list_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<StepProgress>, RepositoryError>;

    async fn remove(
        &self,
        application_id: &ApplicationId,
        step_id: &StepId,
    ) -> Result<(), RepositoryError>;

    async fn remove_all(&self, application_id: &ApplicationId) -> Result<(), RepositoryError>;
}
