use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;
use crate::domain::form::FormId;
use crate::domain::principal::UserId;
use crate::domain::route::RouteId;
use crate::domain::string_id;

string_id!(ApplicationId);

/// Opaque key-value payload captured from the applicant.
pub type FormData = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Canceled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Canceled)
    }
}

/// A workflow instance.
///
/// `id`, `form_id`, `route_id` and `applicant_id` never change after creation.
/// `current_step` only grows and equals the route length exactly when `status` is
/// `Approved`, which is also the only status carrying a `document_id`.
/// `state_version` increments on every persisted change and backs compare-and-swap updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub form_id: FormId,
    pub route_id: RouteId,
    pub applicant_id: UserId,
    pub form_data: FormData,
    pub current_step: usize,
    pub status: ApplicationStatus,
    pub document_id: Option<DocumentId>,
    pub state_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_applicant(&self, user_id: &UserId) -> bool {
        &self.applicant_id == user_id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub form_id: FormId,
    pub route_id: RouteId,
    pub applicant_id: UserId,
    #[serde(default)]
    pub form_data: FormData,
}

impl NewApplication {
    pub fn into_application(self, id: ApplicationId, now: DateTime<Utc>) -> Application {
        Application {
            id,
            form_id: self.form_id,
            route_id: self.route_id,
            applicant_id: self.applicant_id,
            form_data: self.form_data,
            current_step: 0,
            status: ApplicationStatus::Draft,
            document_id: None,
            state_version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The only field an applicant may change, and only while the application is a draft.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftUpdate {
    pub form_data: FormData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub applicant_id: Option<UserId>,
    pub route_id: Option<RouteId>,
    pub form_id: Option<FormId>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn by_applicant(applicant_id: UserId) -> Self {
        Self { applicant_id: Some(applicant_id), ..Self::default() }
    }

    pub fn by_route(route_id: RouteId) -> Self {
        Self { route_id: Some(route_id), ..Self::default() }
    }

    pub fn by_form(form_id: FormId) -> Self {
        Self { form_id: Some(form_id), ..Self::default() }
    }

    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.applicant_id.as_ref().map_or(true, |id| id == &application.applicant_id)
            && self.route_id.as_ref().map_or(true, |id| id == &application.route_id)
            && self.form_id.as_ref().map_or(true, |id| id == &application.form_id)
            && self.status.map_or(true, |status| status == application.status)
    }
}
