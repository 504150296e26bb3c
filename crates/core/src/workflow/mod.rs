pub mod engine;
pub mod index;
pub mod locks;
pub mod machine;
pub mod states;

pub use engine::{ApprovalWorkflowEngine, WorkflowSettings, WorkflowStores};
pub use index::{step_at, StepLookup};
pub use locks::ApplicationLocks;
pub use machine::{gating_position, is_gating_approver, transition};
pub use states::{DecidedStep, TransitionOutcome, WorkflowAction, WorkflowEvent};
