use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::artifacts::{ArtifactGenerator, ArtifactRequest};
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::config::WorkflowConfig;
use crate::domain::application::{
    Application, ApplicationFilter, ApplicationId, ApplicationStatus, DraftUpdate,
    NewApplication,
};
use crate::domain::document::DocumentId;
use crate::domain::principal::UserId;
use crate::domain::progress::{ApplicationProgress, StepProgress};
use crate::domain::route::{ApprovalRoute, RouteId};
use crate::errors::WorkflowError;
use crate::store::{
    ApplicationRepository, FormRepository, RouteRepository, StepProgressRepository,
};
use crate::workflow::locks::ApplicationLocks;
use crate::workflow::machine::{gating_position, is_gating_approver, transition};
use crate::workflow::states::{TransitionOutcome, WorkflowAction, WorkflowEvent};

/// Repositories the engine reads and writes.
#[derive(Clone)]
pub struct WorkflowStores {
    pub routes: Arc<dyn RouteRepository>,
    pub forms: Arc<dyn FormRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub progress: Arc<dyn StepProgressRepository>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub artifact_timeout: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { artifact_timeout: Duration::from_secs(30) }
    }
}

impl From<&WorkflowConfig> for WorkflowSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self { artifact_timeout: Duration::from_secs(config.artifact_timeout_secs) }
    }
}

/// Drives applications through their routes.
///
/// Every state-changing operation runs under the application's lock and persists through a
/// version-checked update, so at most one of two racing decisions on the same application
/// can succeed. Applications on the same route never contend: step decisions are stored per
/// application, the route itself is only read.
#[derive(Clone)]
pub struct ApprovalWorkflowEngine {
    stores: WorkflowStores,
    artifacts: Arc<dyn ArtifactGenerator>,
    audit: Arc<dyn AuditSink>,
    locks: ApplicationLocks,
    settings: WorkflowSettings,
}

impl ApprovalWorkflowEngine {
    pub fn new(
        stores: WorkflowStores,
        artifacts: Arc<dyn ArtifactGenerator>,
        audit: Arc<dyn AuditSink>,
        settings: WorkflowSettings,
    ) -> Self {
        Self { stores, artifacts, audit, locks: ApplicationLocks::default(), settings }
    }

    pub fn stores(&self) -> &WorkflowStores {
        &self.stores
    }

    pub async fn open_draft(
        &self,
        new_application: NewApplication,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        if self.stores.forms.find_by_id(&new_application.form_id).await?.is_none() {
            return Err(WorkflowError::not_found("form", &new_application.form_id));
        }
        if self.stores.routes.find_by_id(&new_application.route_id).await?.is_none() {
            return Err(WorkflowError::not_found("route", &new_application.route_id));
        }

        let application = self.stores.applications.create(new_application).await?;
        info!(
            event_name = "workflow.draft_opened",
            correlation_id = %audit.correlation_id,
            application_id = %application.id,
            applicant_id = %application.applicant_id,
            "application draft opened"
        );
        self.emit(&application.id, audit, "workflow.draft_opened", AuditOutcome::Success, |event| {
            event.with_metadata("route_id", application.route_id.to_string())
        });
        Ok(application)
    }

    pub async fn update_draft(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
        update: DraftUpdate,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        let _guard = self.locks.acquire(application_id).await;
        let event = WorkflowEvent::EditDraft;
        let result = self.edit_draft(application_id, actor_id, update).await;
        self.conclude(application_id, &event, result, audit)
    }

    /// Physically removes a draft. Returns the application as it was before removal.
    pub async fn discard_draft(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        let _guard = self.locks.acquire(application_id).await;
        let event = WorkflowEvent::DiscardDraft;
        let result = self.remove_draft(application_id, actor_id).await;
        self.conclude(application_id, &event, result, audit)
    }

    pub async fn submit(
        &self,
        application_id: &ApplicationId,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        self.advance(application_id, WorkflowEvent::Submit, None, audit).await
    }

    pub async fn approve(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
        comment: Option<String>,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        let event = WorkflowEvent::Approve { actor_id: actor_id.clone() };
        self.advance(application_id, event, comment, audit).await
    }

    pub async fn reject(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
        comment: Option<String>,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        let event = WorkflowEvent::Reject { actor_id: actor_id.clone() };
        self.advance(application_id, event, comment, audit).await
    }

    pub async fn cancel(
        &self,
        application_id: &ApplicationId,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        self.advance(application_id, WorkflowEvent::Cancel, None, audit).await
    }

    pub async fn progress(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationProgress, WorkflowError> {
        let application = self.load(application_id).await?;
        let route = self.load_route(&application.route_id).await?;
        let rows = self.stores.progress.list_for_application(application_id).await?;

        Ok(ApplicationProgress::assemble(
            application.id.clone(),
            application.current_step,
            gating_position(&application, &route),
            &route,
            &rows,
        ))
    }

    /// Pending applications whose gating step belongs to `approver_id`.
    pub async fn pending_for_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<Application>, WorkflowError> {
        let pending = self
            .stores
            .applications
            .list_by(&ApplicationFilter::default().with_status(ApplicationStatus::Pending))
            .await?;

        let mut routes: HashMap<RouteId, Option<ApprovalRoute>> = HashMap::new();
        let mut inbox = Vec::new();
        for application in pending {
            if !routes.contains_key(&application.route_id) {
                let route = self.stores.routes.find_by_id(&application.route_id).await?;
                routes.insert(application.route_id.clone(), route);
            }
            let gated = routes
                .get(&application.route_id)
                .and_then(Option::as_ref)
                .is_some_and(|route| is_gating_approver(&application, route, approver_id));
            if gated {
                inbox.push(application);
            }
        }
        inbox.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(inbox)
    }

    async fn advance(
        &self,
        application_id: &ApplicationId,
        event: WorkflowEvent,
        comment: Option<String>,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        let _guard = self.locks.acquire(application_id).await;
        let result = self.apply(application_id, &event, comment).await;
        self.conclude(application_id, &event, result, audit)
    }

    /// Computes the next state in memory, produces the artifact when the route is complete,
    /// and only then persists. Nothing is written when the generator fails.
    async fn apply(
        &self,
        application_id: &ApplicationId,
        event: &WorkflowEvent,
        comment: Option<String>,
    ) -> Result<(Application, TransitionOutcome), WorkflowError> {
        let application = self.load(application_id).await?;
        let route = if event.needs_route() && application.status == ApplicationStatus::Pending {
            self.stores.routes.find_by_id(&application.route_id).await?
        } else {
            None
        };

        let outcome = transition(&application, route.as_ref(), event)?;
        let now = Utc::now();

        let mut next = application.clone();
        next.status = outcome.to;
        next.current_step = outcome.current_step;

        let progress = outcome.decided_step.as_ref().map(|decided| StepProgress {
            application_id: application.id.clone(),
            step_id: decided.step_id.clone(),
            position: decided.position,
            approver_id: decided.approver_id.clone(),
            status: decided.status,
            comment,
            decided_at: Some(now),
        });

        let artifact = if outcome.requires(&WorkflowAction::GenerateArtifact) {
            let document_id = self.generate_artifact(&application, now).await?;
            next.document_id = Some(document_id.clone());
            Some(document_id)
        } else {
            None
        };

        if let Some(row) = &progress {
            if let Err(store_error) = self.stores.progress.record(row.clone()).await {
                self.compensate(&application.id, artifact.as_ref(), None).await;
                return Err(store_error.into());
            }
        }

        match self.stores.applications.update(next, application.state_version).await {
            Ok(saved) => Ok((saved, outcome)),
            Err(store_error) => {
                self.compensate(&application.id, artifact.as_ref(), progress.as_ref()).await;
                Err(store_error.into())
            }
        }
    }

    async fn edit_draft(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
        update: DraftUpdate,
    ) -> Result<(Application, TransitionOutcome), WorkflowError> {
        let application = self.load(application_id).await?;
        ensure_applicant(&application, actor_id)?;
        let outcome = transition(&application, None, &WorkflowEvent::EditDraft)?;

        let expected_version = application.state_version;
        let mut next = application;
        next.form_data = update.form_data;
        let saved = self.stores.applications.update(next, expected_version).await?;
        Ok((saved, outcome))
    }

    async fn remove_draft(
        &self,
        application_id: &ApplicationId,
        actor_id: &UserId,
    ) -> Result<(Application, TransitionOutcome), WorkflowError> {
        let application = self.load(application_id).await?;
        ensure_applicant(&application, actor_id)?;
        let outcome = transition(&application, None, &WorkflowEvent::DiscardDraft)?;

        if outcome.requires(&WorkflowAction::DeleteDraft) {
            self.stores.applications.delete(application_id).await?;
            self.stores.progress.remove_all(application_id).await?;
        }
        Ok((application, outcome))
    }

    fn conclude(
        &self,
        application_id: &ApplicationId,
        event: &WorkflowEvent,
        result: Result<(Application, TransitionOutcome), WorkflowError>,
        audit: &AuditContext,
    ) -> Result<Application, WorkflowError> {
        match result {
            Ok((application, outcome)) => {
                self.record_success(&application, &outcome, audit);
                Ok(application)
            }
            Err(error) => Err(self.refused(application_id, event, error, audit)),
        }
    }

    async fn generate_artifact(
        &self,
        application: &Application,
        approved_at: chrono::DateTime<Utc>,
    ) -> Result<DocumentId, WorkflowError> {
        let form = match self.stores.forms.find_by_id(&application.form_id).await? {
            Some(form) => form,
            None => return Err(WorkflowError::not_found("form", &application.form_id)),
        };
        let request = ArtifactRequest::for_application(application, &form, approved_at);

        let reason = match tokio::time::timeout(
            self.settings.artifact_timeout,
            self.artifacts.generate(&request),
        )
        .await
        {
            Ok(Ok(document_id)) => return Ok(document_id),
            Ok(Err(error)) => error.to_string(),
            Err(_) => format!("timed out after {:?}", self.settings.artifact_timeout),
        };

        Err(WorkflowError::ArtifactGenerationFailed {
            application_id: application.id.clone(),
            reason,
        })
    }

    async fn compensate(
        &self,
        application_id: &ApplicationId,
        artifact: Option<&DocumentId>,
        progress: Option<&StepProgress>,
    ) {
        if let Some(document_id) = artifact {
            if let Err(error) = self.artifacts.discard(document_id).await {
                error!(
                    event_name = "workflow.compensation_failed",
                    application_id = %application_id,
                    document_id = %document_id,
                    error = %error,
                    "could not discard artifact after a failed approval"
                );
            }
        }
        if let Some(row) = progress {
            if let Err(error) = self.stores.progress.remove(application_id, &row.step_id).await {
                error!(
                    event_name = "workflow.compensation_failed",
                    application_id = %application_id,
                    step_id = %row.step_id,
                    error = %error,
                    "could not remove step decision after a failed approval"
                );
            }
        }
    }

    async fn load(&self, application_id: &ApplicationId) -> Result<Application, WorkflowError> {
        self.stores
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("application", application_id))
    }

    async fn load_route(&self, route_id: &RouteId) -> Result<ApprovalRoute, WorkflowError> {
        self.stores
            .routes
            .find_by_id(route_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("route", route_id))
    }

    fn record_success(
        &self,
        application: &Application,
        outcome: &TransitionOutcome,
        audit: &AuditContext,
    ) {
        let event_type = match (&outcome.event, outcome.to) {
            (WorkflowEvent::Submit, _) => "workflow.submitted",
            (WorkflowEvent::Approve { .. }, ApplicationStatus::Approved) => "workflow.completed",
            (WorkflowEvent::Approve { .. }, _) => "workflow.step_approved",
            (WorkflowEvent::Reject { .. }, _) => "workflow.rejected",
            (WorkflowEvent::Cancel, _) => "workflow.canceled",
            (WorkflowEvent::EditDraft, _) => "workflow.draft_updated",
            (WorkflowEvent::DiscardDraft, _) => "workflow.draft_discarded",
        };

        info!(
            event_name = event_type,
            correlation_id = %audit.correlation_id,
            actor_id = %audit.actor,
            application_id = %application.id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            current_step = application.current_step,
            "application transition applied"
        );

        self.emit(&application.id, audit, event_type, AuditOutcome::Success, |event| {
            let event = event
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str())
                .with_metadata("current_step", application.current_step.to_string());
            match &application.document_id {
                Some(document_id) => event.with_metadata("document_id", document_id.to_string()),
                None => event,
            }
        });
    }

    /// Logs and audits a refused operation, handing the error back.
    fn refused(
        &self,
        application_id: &ApplicationId,
        event: &WorkflowEvent,
        error: WorkflowError,
        audit: &AuditContext,
    ) -> WorkflowError {
        match &error {
            WorkflowError::RouteExhausted { .. } | WorkflowError::Store(_) => error!(
                event_name = "workflow.transition_refused",
                correlation_id = %audit.correlation_id,
                actor_id = %audit.actor,
                application_id = %application_id,
                operation = event.operation(),
                error = %error,
                "application transition failed"
            ),
            WorkflowError::ArtifactGenerationFailed { .. } => warn!(
                event_name = "workflow.transition_refused",
                correlation_id = %audit.correlation_id,
                actor_id = %audit.actor,
                application_id = %application_id,
                operation = event.operation(),
                error = %error,
                "artifact generation failed, approval not committed"
            ),
            _ => info!(
                event_name = "workflow.transition_refused",
                correlation_id = %audit.correlation_id,
                actor_id = %audit.actor,
                application_id = %application_id,
                operation = event.operation(),
                error_kind = error.kind(),
                "application transition refused"
            ),
        }

        let outcome = match &error {
            WorkflowError::RouteExhausted { .. }
            | WorkflowError::ArtifactGenerationFailed { .. }
            | WorkflowError::Store(_) => AuditOutcome::Failed,
            _ => AuditOutcome::Rejected,
        };
        self.emit(application_id, audit, "workflow.transition_refused", outcome, |audit_event| {
            audit_event
                .with_metadata("operation", event.operation())
                .with_metadata("error_kind", error.kind())
                .with_metadata("error", error.to_string())
        });
        error
    }

    fn emit(
        &self,
        application_id: &ApplicationId,
        audit: &AuditContext,
        event_type: &str,
        outcome: AuditOutcome,
        decorate: impl FnOnce(AuditEvent) -> AuditEvent,
    ) {
        let event = AuditEvent::new(
            Some(application_id.clone()),
            audit.correlation_id.clone(),
            event_type,
            AuditCategory::Workflow,
            audit.actor.clone(),
            outcome,
        );
        self.audit.emit(decorate(event));
    }
}

fn ensure_applicant(application: &Application, actor_id: &UserId) -> Result<(), WorkflowError> {
    if application.is_applicant(actor_id) {
        Ok(())
    } else {
        Err(WorkflowError::NotApplicant {
            application_id: application.id.clone(),
            actor_id: actor_id.clone(),
        })
    }
}
