use async_trait::async_trait;

use crate::domain::folder::{FolderId, FolderPermission};
use crate::domain::principal::UserId;
use crate::errors::RepositoryError;

/// Folder access-control capability. A missing folder grants nothing.
#[async_trait]
pub trait FolderAccess: Send + Sync {
    async fn has_permission(
        &self,
        folder_id: &FolderId,
        user_id: &UserId,
        level: FolderPermission,
    ) -> Result<bool, RepositoryError>;
}
