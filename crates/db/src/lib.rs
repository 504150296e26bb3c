pub mod artifacts;
pub mod blobs;
pub mod fixtures;
pub mod repositories;

use std::sync::Arc;

use docroute_core::access::FolderAccess;
use docroute_core::audit::AuditSink;
use docroute_core::store::{
    ApplicationRepository, FormRepository, RouteRepository, StepProgressRepository,
};
use docroute_core::workflow::{ApprovalWorkflowEngine, WorkflowSettings, WorkflowStores};

pub use artifacts::DocumentArtifactGenerator;
pub use blobs::{BlobError, BlobStore, FilesystemBlobStore, InMemoryBlobStore};
pub use fixtures::{DemoSeedDataset, SeedError, SeedResult, SEED_USERS};
pub use repositories::{
    DocumentRepository, FolderRepository, InMemoryApplicationRepository,
    InMemoryDocumentRepository, InMemoryFolderRepository, InMemoryFormRepository,
    InMemoryRouteRepository, InMemoryStepProgressRepository,
};

/// Every repository plus blob storage, shared by the workflow engine and the CRUD surface.
#[derive(Clone)]
pub struct Store {
    pub folders: Arc<dyn FolderRepository>,
    pub folder_access: Arc<dyn FolderAccess>,
    pub documents: Arc<dyn DocumentRepository>,
    pub routes: Arc<dyn RouteRepository>,
    pub forms: Arc<dyn FormRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub progress: Arc<dyn StepProgressRepository>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Store {
    /// Process-resident repositories over the given blob storage.
    pub fn in_memory(blobs: Arc<dyn BlobStore>) -> Self {
        let folders = Arc::new(InMemoryFolderRepository::default());
        Self {
            folders: folders.clone(),
            folder_access: folders,
            documents: Arc::new(InMemoryDocumentRepository::default()),
            routes: Arc::new(InMemoryRouteRepository::default()),
            forms: Arc::new(InMemoryFormRepository::default()),
            applications: Arc::new(InMemoryApplicationRepository::default()),
            progress: Arc::new(InMemoryStepProgressRepository::default()),
            blobs,
        }
    }

    pub fn workflow_stores(&self) -> WorkflowStores {
        WorkflowStores {
            routes: self.routes.clone(),
            forms: self.forms.clone(),
            applications: self.applications.clone(),
            progress: self.progress.clone(),
        }
    }

    pub fn artifact_generator(&self) -> DocumentArtifactGenerator {
        DocumentArtifactGenerator::new(self.documents.clone(), self.blobs.clone())
    }

    pub fn workflow_engine(
        &self,
        audit: Arc<dyn AuditSink>,
        settings: WorkflowSettings,
    ) -> ApprovalWorkflowEngine {
        ApprovalWorkflowEngine::new(
            self.workflow_stores(),
            Arc::new(self.artifact_generator()),
            audit,
            settings,
        )
    }
}
