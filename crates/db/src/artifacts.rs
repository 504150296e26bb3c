use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use docroute_core::artifacts::{ArtifactError, ArtifactGenerator, ArtifactRequest};
use docroute_core::domain::document::{DocumentId, NewDocument};

use crate::blobs::BlobStore;
use crate::repositories::DocumentRepository;

pub const ARTIFACT_CONTENT_TYPE: &str = "application/json";

/// Files a JSON summary of each fully approved application as a document.
pub struct DocumentArtifactGenerator {
    documents: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl DocumentArtifactGenerator {
    pub fn new(documents: Arc<dyn DocumentRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { documents, blobs }
    }

    pub fn blob_key(request: &ArtifactRequest) -> String {
        format!("applications/{}.json", request.application_id)
    }
}

#[async_trait]
impl ArtifactGenerator for DocumentArtifactGenerator {
    async fn generate(&self, request: &ArtifactRequest) -> Result<DocumentId, ArtifactError> {
        let bytes = serde_json::to_vec_pretty(&request.summary())
            .map_err(|error| ArtifactError::Rendering(error.to_string()))?;
        let file_size = bytes.len() as u64;

        let path = self
            .blobs
            .store_blob(&Self::blob_key(request), bytes)
            .await
            .map_err(|error| ArtifactError::Storage(error.to_string()))?;

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "application_id".to_string(),
            serde_json::Value::String(request.application_id.to_string()),
        );
        metadata.insert(
            "form_data".to_string(),
            serde_json::to_value(&request.form_data)
                .map_err(|error| ArtifactError::Rendering(error.to_string()))?,
        );

        let created = self
            .documents
            .create(NewDocument {
                name: request.document_name(),
                folder_id: request.target_folder_id.clone(),
                file_path: path.clone(),
                file_type: ARTIFACT_CONTENT_TYPE.to_string(),
                file_size,
                created_by: request.applicant_id.clone(),
                metadata,
            })
            .await;

        match created {
            Ok(document) => {
                info!(
                    event_name = "artifact.generated",
                    application_id = %request.application_id,
                    document_id = %document.id,
                    filed = document.folder_id.is_some(),
                    "application artifact generated"
                );
                Ok(document.id)
            }
            Err(error) => {
                if let Err(cleanup) = self.blobs.delete_blob(&path).await {
                    warn!(
                        event_name = "artifact.cleanup_failed",
                        application_id = %request.application_id,
                        error = %cleanup,
                        "orphaned artifact blob"
                    );
                }
                Err(ArtifactError::Store(error))
            }
        }
    }

    async fn discard(&self, document_id: &DocumentId) -> Result<(), ArtifactError> {
        let Some(document) = self.documents.find_by_id(document_id).await? else {
            return Ok(());
        };
        self.blobs
            .delete_blob(&document.file_path)
            .await
            .map_err(|error| ArtifactError::Storage(error.to_string()))?;
        self.documents.delete(document_id).await?;
        info!(
            event_name = "artifact.discarded",
            document_id = %document_id,
            "application artifact discarded"
        );
        Ok(())
    }
}
