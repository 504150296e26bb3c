use async_trait::async_trait;

use docroute_core::domain::document::{Document, DocumentId, NewDocument};
use docroute_core::domain::folder::{Folder, FolderId, NewFolder};
use docroute_core::errors::RepositoryError;

pub mod memory;

pub use memory::{
    InMemoryApplicationRepository, InMemoryDocumentRepository, InMemoryFolderRepository,
    InMemoryFormRepository, InMemoryRouteRepository, InMemoryStepProgressRepository,
};

#[async_trait]
pub trait FolderRepository: Send + Sync {
    async fn find_by_id(&self, id: &FolderId) -> Result<Option<Folder>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Folder>, RepositoryError>;
    async fn list_children(
        &self,
        parent_id: Option<&FolderId>,
    ) -> Result<Vec<Folder>, RepositoryError>;
    async fn create(&self, folder: NewFolder) -> Result<Folder, RepositoryError>;
    async fn save(&self, folder: Folder) -> Result<Folder, RepositoryError>;
    async fn delete(&self, id: &FolderId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Document>, RepositoryError>;
    async fn list_in_folder(&self, folder_id: &FolderId)
        -> Result<Vec<Document>, RepositoryError>;
    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError>;
    async fn save(&self, document: Document) -> Result<Document, RepositoryError>;
    async fn delete(&self, id: &DocumentId) -> Result<bool, RepositoryError>;
}
