use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationStatus;
use crate::domain::principal::UserId;
use crate::domain::progress::StepStatus;
use crate::domain::route::StepId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEvent {
    Submit,
    Approve { actor_id: UserId },
    Reject { actor_id: UserId },
    Cancel,
    EditDraft,
    DiscardDraft,
}

impl WorkflowEvent {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Cancel => "cancel",
            Self::EditDraft => "edit",
            Self::DiscardDraft => "discard",
        }
    }

    pub fn needs_route(&self) -> bool {
        matches!(self, Self::Approve { .. } | Self::Reject { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowAction {
    RecordStepDecision,
    GenerateArtifact,
    DeleteDraft,
}

/// The gating step decided by an approve or reject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecidedStep {
    pub position: usize,
    pub step_id: StepId,
    pub approver_id: UserId,
    pub status: StepStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub event: WorkflowEvent,
    pub current_step: usize,
    pub decided_step: Option<DecidedStep>,
    pub actions: Vec<WorkflowAction>,
}

impl TransitionOutcome {
    pub fn requires(&self, action: &WorkflowAction) -> bool {
        self.actions.contains(action)
    }
}
