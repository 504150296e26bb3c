use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::application::{Application, ApplicationId, FormData};
use crate::domain::document::DocumentId;
use crate::domain::folder::FolderId;
use crate::domain::form::{ApprovalForm, FormId};
use crate::domain::principal::UserId;
use crate::errors::RepositoryError;

/// Everything a generator needs to materialize the completion artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRequest {
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub form_id: FormId,
    pub form_name: String,
    pub form_data: FormData,
    pub target_folder_id: Option<FolderId>,
    pub approved_at: DateTime<Utc>,
}

impl ArtifactRequest {
    pub fn for_application(
        application: &Application,
        form: &ApprovalForm,
        approved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id: application.id.clone(),
            applicant_id: application.applicant_id.clone(),
            form_id: form.id.clone(),
            form_name: form.name.clone(),
            form_data: application.form_data.clone(),
            target_folder_id: form.target_folder_id.clone(),
            approved_at,
        }
    }

    pub fn document_name(&self) -> String {
        format!("Application {}", self.application_id)
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "application_id": self.application_id,
            "applicant_id": self.applicant_id,
            "form_id": self.form_id,
            "form_name": self.form_name,
            "form_data": self.form_data,
            "approved_at": self.approved_at.to_rfc3339(),
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("artifact rendering failed: {0}")]
    Rendering(String),
    #[error("artifact storage failed: {0}")]
    Storage(String),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, request: &ArtifactRequest) -> Result<DocumentId, ArtifactError>;

    /// Removes an artifact whose approval could not be committed.
    async fn discard(&self, document_id: &DocumentId) -> Result<(), ArtifactError>;
}
