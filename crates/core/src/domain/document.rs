use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::folder::FolderId;
use crate::domain::principal::UserId;
use crate::domain::string_id;

string_id!(DocumentId);

/// A stored file. `folder_id` is `None` for generated artifacts whose form names no target folder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub folder_id: Option<FolderId>,
    pub file_path: String,
    pub file_type: String,
    pub file_size: u64,
    pub created_by: UserId,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub folder_id: Option<FolderId>,
    pub file_path: String,
    pub file_type: String,
    pub file_size: u64,
    pub created_by: UserId,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewDocument {
    pub fn into_document(self, id: DocumentId, now: DateTime<Utc>) -> Document {
        Document {
            id,
            name: self.name,
            folder_id: self.folder_id,
            file_path: self.file_path,
            file_type: self.file_type,
            file_size: self.file_size,
            created_by: self.created_by,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    pub folder_id: Option<FolderId>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl DocumentUpdate {
    pub fn apply(self, document: &mut Document) {
        if let Some(name) = self.name {
            document.name = name;
        }
        if let Some(folder_id) = self.folder_id {
            document.folder_id = Some(folder_id);
        }
        if let Some(metadata) = self.metadata {
            document.metadata = metadata;
        }
    }
}
