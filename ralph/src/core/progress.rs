//! Pure completion bookkeeping for the requirements plan.

use crate::plan::Plan;

/// Result of marking a story as passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The story flipped from open to passed.
    Updated,
    /// The story was already passed; nothing changed.
    AlreadyPassed,
}

/// Set `passes=true` on exactly the story with `id`, leaving every other
/// story untouched.
///
/// Idempotent: marking an already-passed story is a no-op. An unknown id is
/// an error (the document and the caller disagree about plan contents).
pub fn mark_passed(plan: &mut Plan, id: u64) -> Result<MarkOutcome, String> {
    let Some(story) = plan.items.iter_mut().find(|story| story.id == id) else {
        return Err(format!("story {id} not found in plan"));
    };
    if story.passes {
        return Ok(MarkOutcome::AlreadyPassed);
    }
    story.passes = true;
    Ok(MarkOutcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plan_with_items, story};

    #[test]
    fn marks_only_the_target_story() {
        let mut plan = plan_with_items(vec![story(1, false), story(2, false)]);
        let outcome = mark_passed(&mut plan, 1).expect("mark");
        assert_eq!(outcome, MarkOutcome::Updated);
        assert!(plan.items[0].passes);
        assert!(!plan.items[1].passes);
    }

    #[test]
    fn marking_twice_is_equivalent_to_once() {
        let mut plan = plan_with_items(vec![story(1, false), story(2, true)]);
        mark_passed(&mut plan, 1).expect("first mark");
        let snapshot = plan.clone();

        let outcome = mark_passed(&mut plan, 1).expect("second mark");
        assert_eq!(outcome, MarkOutcome::AlreadyPassed);
        assert_eq!(plan, snapshot);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut plan = plan_with_items(vec![story(1, false)]);
        let err = mark_passed(&mut plan, 9).unwrap_err();
        assert!(err.contains("story 9"));
    }
}
