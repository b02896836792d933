//! Deterministic selection logic for the requirements plan.

use crate::plan::{Plan, Story};

/// Find the story with the lowest `id` among those with `passes=false`.
///
/// Returns `None` if every story passes (plan is complete) or the plan has no
/// items. Selection depends only on the persisted document, so re-running
/// against unchanged state picks the same story.
pub fn next_open_story(plan: &Plan) -> Option<&Story> {
    plan.items
        .iter()
        .filter(|story| !story.passes)
        .min_by_key(|story| story.id)
}
