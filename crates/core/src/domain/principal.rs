use serde::{Deserialize, Serialize};

use crate::domain::string_id;

string_id!(UserId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Caller identity handed over by the identity collaborator. Treated as already verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedPrincipal {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthenticatedPrincipal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: UserId(user_id.into()), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
