//! Transition legality rules. Pure: no I/O, no clocks.

use crate::domain::application::{Application, ApplicationStatus};
use crate::domain::principal::UserId;
use crate::domain::progress::StepStatus;
use crate::domain::route::{ApprovalRoute, RouteStep};
use crate::errors::WorkflowError;
use crate::workflow::index::{step_at, StepLookup};
use crate::workflow::states::{DecidedStep, TransitionOutcome, WorkflowAction, WorkflowEvent};

/// Decides the outcome of `event` against `application` without mutating anything.
///
/// `route` is only consulted for approve and reject; `None` there means the referenced
/// route no longer exists.
pub fn transition(
    application: &Application,
    route: Option<&ApprovalRoute>,
    event: &WorkflowEvent,
) -> Result<TransitionOutcome, WorkflowError> {
    use ApplicationStatus::{Approved, Canceled, Draft, Pending, Rejected};
    use WorkflowAction::{DeleteDraft, GenerateArtifact, RecordStepDecision};

    let from = application.status;
    let current = application.current_step;

    let (to, current_step, decided_step, actions) = match (from, event) {
        (Draft, WorkflowEvent::Submit) => (Pending, current, None, Vec::new()),
        (Draft, WorkflowEvent::EditDraft) => (Draft, current, None, Vec::new()),
        (Draft, WorkflowEvent::DiscardDraft) => (Draft, current, None, vec![DeleteDraft]),
        (Draft, WorkflowEvent::Cancel) | (Pending, WorkflowEvent::Cancel) => {
            (Canceled, current, None, Vec::new())
        }
        (Pending, WorkflowEvent::Approve { actor_id }) => {
            let route = require_route(application, route)?;
            let step = gating_step(application, route, actor_id)?;
            let decided = decided(current, step, StepStatus::Approved);
            let next = current + 1;
            match step_at(route, next) {
                StepLookup::Step(_) => (Pending, next, Some(decided), vec![RecordStepDecision]),
                StepLookup::OutOfRange => {
                    (Approved, next, Some(decided), vec![RecordStepDecision, GenerateArtifact])
                }
            }
        }
        (Pending, WorkflowEvent::Reject { actor_id }) => {
            let route = require_route(application, route)?;
            let step = gating_step(application, route, actor_id)?;
            let decided = decided(current, step, StepStatus::Rejected);
            (Rejected, current, Some(decided), vec![RecordStepDecision])
        }
        (_, event) => {
            return Err(WorkflowError::InvalidState {
                application_id: application.id.clone(),
                status: from,
                operation: event.operation(),
            });
        }
    };

    Ok(TransitionOutcome { from, to, event: event.clone(), current_step, decided_step, actions })
}

/// Position of the step currently blocking a pending application, if any.
pub fn gating_position(application: &Application, route: &ApprovalRoute) -> Option<usize> {
    if application.status != ApplicationStatus::Pending {
        return None;
    }
    match step_at(route, application.current_step) {
        StepLookup::Step(_) => Some(application.current_step),
        StepLookup::OutOfRange => None,
    }
}

pub fn is_gating_approver(
    application: &Application,
    route: &ApprovalRoute,
    user_id: &UserId,
) -> bool {
    gating_position(application, route)
        .and_then(|position| route.steps.get(position))
        .is_some_and(|step| &step.approver_id == user_id)
}

fn require_route<'a>(
    application: &Application,
    route: Option<&'a ApprovalRoute>,
) -> Result<&'a ApprovalRoute, WorkflowError> {
    route.ok_or_else(|| WorkflowError::not_found("route", &application.route_id))
}

fn gating_step<'a>(
    application: &Application,
    route: &'a ApprovalRoute,
    actor_id: &UserId,
) -> Result<&'a RouteStep, WorkflowError> {
    match step_at(route, application.current_step) {
        StepLookup::OutOfRange => Err(WorkflowError::RouteExhausted {
            application_id: application.id.clone(),
            current_step: application.current_step,
            total_steps: route.len(),
        }),
        StepLookup::Step(step) if &step.approver_id == actor_id => Ok(step),
        StepLookup::Step(_) => Err(WorkflowError::NotAuthorizedStep {
            application_id: application.id.clone(),
            actor_id: actor_id.clone(),
            position: application.current_step,
        }),
    }
}

fn decided(position: usize, step: &RouteStep, status: StepStatus) -> DecidedStep {
    DecidedStep {
        position,
        step_id: step.id.clone(),
        approver_id: step.approver_id.clone(),
        status,
    }
}
