//! Selection helpers for `ralph select` and the loop.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::selector::next_open_story;
use crate::io::plan_store::{PLAN_FILE, load_plan};

/// Structured selection outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Plan is complete (no open stories).
    Complete,
    /// Open story selected.
    Open(SelectedStory),
}

/// Minimal selected story metadata for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedStory {
    pub id: u64,
    pub title: String,
}

/// Load the plan from disk and select the next open story.
pub fn select_from_root(root: &Path) -> Result<SelectOutcome> {
    let plan = load_plan(&root.join(PLAN_FILE)).context("load plan for selection")?;
    Ok(match next_open_story(&plan) {
        None => SelectOutcome::Complete,
        Some(story) => SelectOutcome::Open(SelectedStory {
            id: story.id,
            title: story.title.clone(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestRepo, plan_with_items, story};

    #[test]
    fn select_returns_lowest_open_story() {
        let repo = TestRepo::new().expect("repo");
        repo.write_plan(&plan_with_items(vec![story(1, true), story(2, false)]))
            .expect("seed plan");

        let outcome = select_from_root(repo.root()).expect("select");
        assert_eq!(
            outcome,
            SelectOutcome::Open(SelectedStory {
                id: 2,
                title: "Story 2".to_string(),
            })
        );
    }

    #[test]
    fn select_reports_complete_plan() {
        let repo = TestRepo::new().expect("repo");
        repo.write_plan(&plan_with_items(vec![story(1, true)]))
            .expect("seed plan");

        let outcome = select_from_root(repo.root()).expect("select");
        assert_eq!(outcome, SelectOutcome::Complete);
    }
}
