use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationId;
use crate::domain::principal::UserId;
use crate::domain::route::{ApprovalRoute, StepId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Decision record for one step of one application. Keyed by (application, step).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub application_id: ApplicationId,
    pub step_id: StepId,
    pub position: usize,
    pub approver_id: UserId,
    pub status: StepStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepView {
    pub step_id: StepId,
    pub position: usize,
    pub order: u32,
    pub approver_id: UserId,
    pub status: StepStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub is_gating: bool,
}

/// A route's steps merged with one application's decisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationProgress {
    pub application_id: ApplicationId,
    pub current_step: usize,
    pub total_steps: usize,
    pub steps: Vec<StepView>,
}

impl ApplicationProgress {
    /// `gating` is `None` unless the application is pending.
    pub fn assemble(
        application_id: ApplicationId,
        current_step: usize,
        gating: Option<usize>,
        route: &ApprovalRoute,
        rows: &[StepProgress],
    ) -> Self {
        let steps = route
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                let row = rows.iter().find(|row| row.step_id == step.id);
                StepView {
                    step_id: step.id.clone(),
                    position,
                    order: step.order,
                    approver_id: step.approver_id.clone(),
                    status: row.map_or(StepStatus::Pending, |row| row.status),
                    comment: row.and_then(|row| row.comment.clone()),
                    decided_at: row.and_then(|row| row.decided_at),
                    is_gating: gating == Some(position),
                }
            })
            .collect();

        Self { application_id, current_step, total_steps: route.len(), steps }
    }
}
