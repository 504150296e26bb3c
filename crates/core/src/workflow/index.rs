use crate::domain::route::{ApprovalRoute, RouteStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepLookup<'a> {
    Step(&'a RouteStep),
    /// Every step has been passed.
    OutOfRange,
}

/// Resolves the step at a zero-based position. Position 0 is the lowest `order`.
pub fn step_at(route: &ApprovalRoute, position: usize) -> StepLookup<'_> {
    match route.steps.get(position) {
        Some(step) => StepLookup::Step(step),
        None => StepLookup::OutOfRange,
    }
}
