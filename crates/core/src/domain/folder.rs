use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::principal::UserId;
use crate::domain::string_id;

string_id!(FolderId);

/// Access levels on a folder. Ordered so that a higher grant implies every lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderPermission {
    Read,
    Write,
    Admin,
}

impl FolderPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn satisfies(&self, required: FolderPermission) -> bool {
        *self >= required
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderAccess {
    pub user_id: UserId,
    pub permission: FolderPermission,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub created_by: UserId,
    pub access_list: Vec<FolderAccess>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn permission_for(&self, user_id: &UserId) -> Option<FolderPermission> {
        self.access_list
            .iter()
            .filter(|access| &access.user_id == user_id)
            .map(|access| access.permission)
            .max()
    }

    pub fn has_permission(&self, user_id: &UserId, required: FolderPermission) -> bool {
        self.permission_for(user_id).is_some_and(|granted| granted.satisfies(required))
    }

    /// Replaces any existing grant for the user.
    pub fn grant(&mut self, user_id: UserId, permission: FolderPermission) {
        self.access_list.retain(|access| access.user_id != user_id);
        self.access_list.push(FolderAccess { user_id, permission });
    }

    pub fn revoke(&mut self, user_id: &UserId) {
        self.access_list.retain(|access| &access.user_id != user_id);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFolder {
    pub name: String,
    pub parent_id: Option<FolderId>,
    pub created_by: UserId,
}

impl NewFolder {
    /// The creator always starts with admin rights on the folder.
    pub fn into_folder(self, id: FolderId, now: DateTime<Utc>) -> Folder {
        let access_list =
            vec![FolderAccess { user_id: self.created_by.clone(), permission: FolderPermission::Admin }];
        Folder {
            id,
            name: self.name,
            parent_id: self.parent_id,
            created_by: self.created_by,
            access_list,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderUpdate {
    pub name: Option<String>,
    pub parent_id: Option<FolderId>,
}

impl FolderUpdate {
    pub fn apply(self, folder: &mut Folder) {
        if let Some(name) = self.name {
            folder.name = name;
        }
        if let Some(parent_id) = self.parent_id {
            folder.parent_id = Some(parent_id);
        }
    }
}
