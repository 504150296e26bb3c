use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::principal::UserId;
use crate::domain::string_id;
use crate::errors::DomainError;

string_id!(RouteId);
string_id!(StepId);

/// One approver's gate. Decision state lives in per-application progress rows, never here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub id: StepId,
    pub approver_id: UserId,
    pub order: u32,
}

/// Reusable, ordered step template. `steps` is always sorted by `order` with no ties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRoute {
    pub id: RouteId,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<RouteStep>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRoute {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_approver(&self, user_id: &UserId) -> bool {
        self.steps.iter().any(|step| &step.approver_id == user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRouteStep {
    pub approver_id: UserId,
    pub order: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalRoute {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<NewRouteStep>,
    pub created_by: UserId,
}

impl NewApprovalRoute {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvariantViolation("route name must not be empty".to_string()));
        }
        validate_steps(&self.steps)
    }

    pub fn into_route(self, id: RouteId, now: DateTime<Utc>) -> ApprovalRoute {
        ApprovalRoute {
            id,
            name: self.name,
            description: self.description,
            steps: build_steps(self.steps),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<NewRouteStep>>,
}

impl RouteUpdate {
    pub fn replaces_steps(&self) -> bool {
        self.steps.is_some()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(DomainError::InvariantViolation("route name must not be empty".to_string()));
        }
        match &self.steps {
            Some(steps) => validate_steps(steps),
            None => Ok(()),
        }
    }

    pub fn apply(self, route: &mut ApprovalRoute) {
        if let Some(name) = self.name {
            route.name = name;
        }
        if let Some(description) = self.description {
            route.description = Some(description);
        }
        if let Some(steps) = self.steps {
            route.steps = build_steps(steps);
        }
    }
}

fn validate_steps(steps: &[NewRouteStep]) -> Result<(), DomainError> {
    if steps.is_empty() {
        return Err(DomainError::EmptyRoute);
    }
    let mut seen = BTreeSet::new();
    for step in steps {
        if step.order == 0 {
            return Err(DomainError::InvariantViolation("step order is 1-based".to_string()));
        }
        if !seen.insert(step.order) {
            return Err(DomainError::DuplicateStepOrder(step.order));
        }
    }
    Ok(())
}

fn build_steps(steps: Vec<NewRouteStep>) -> Vec<RouteStep> {
    let mut steps: Vec<RouteStep> = steps
        .into_iter()
        .map(|step| RouteStep {
            id: StepId::generate(),
            approver_id: step.approver_id,
            order: step.order,
        })
        .collect();
    steps.sort_by_key(|step| step.order);
    steps
}
