//! Instruction payload builder for deterministic agent input.

use std::fs;
use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, warn};

use crate::plan::{Plan, Story};

/// File name of the optional human-readable companion document, resolved
/// against the project root.
pub const DOC_FILE: &str = "PRD.md";

const STORY_TEMPLATE: &str = include_str!("prompts/story.md");

/// Selected story context for template rendering.
#[derive(Debug, Clone, Serialize)]
struct StoryContext {
    id: u64,
    title: String,
    description: String,
    acceptance_criteria: Vec<String>,
}

impl StoryContext {
    fn from_story(story: &Story) -> Self {
        Self {
            id: story.id,
            title: story.title.clone(),
            description: story.description.clone(),
            acceptance_criteria: story.acceptance_criteria.clone(),
        }
    }
}

/// All inputs needed to build an instruction payload.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    /// The story to implement.
    pub story: Story,
    /// Plan title for broader context.
    pub project_title: String,
    /// Plan overview for broader context.
    pub project_overview: String,
    /// Rendered tech-stack metadata, when the plan carries any.
    pub tech_stack: Option<String>,
    /// Body of the companion document, when present.
    pub document: Option<String>,
}

impl PromptInputs {
    /// Assemble inputs from the plan plus the optional companion document.
    pub fn from_plan(root: &Path, plan: &Plan, story: &Story) -> Self {
        let doc_path = root.join(DOC_FILE);
        let document = match fs::read_to_string(&doc_path) {
            Ok(contents) => Some(contents),
            Err(_) => {
                warn!(path = %doc_path.display(), "companion document missing, continuing without it");
                None
            }
        };
        let tech_stack = if plan.tech_stack.is_null() {
            None
        } else {
            serde_json::to_string_pretty(&plan.tech_stack).ok()
        };
        Self {
            story: story.clone(),
            project_title: plan.title.clone(),
            project_overview: plan.overview.clone(),
            tech_stack,
            document,
        }
    }
}

/// Builds an instruction payload within a byte budget, dropping less critical
/// sections first.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget.
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Render the payload for one story.
    pub fn build(&self, input: &PromptInputs) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("story", STORY_TEMPLATE)
            .expect("story template should be valid");
        let template = env.get_template("story")?;
        let story = StoryContext::from_story(&input.story);
        let rendered = template.render(context! {
            story => story,
            project_title => (!input.project_title.trim().is_empty()).then(|| input.project_title.trim()),
            project_overview => input.project_overview.trim(),
            tech_stack => input.tech_stack.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            document => input.document.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        })?;

        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "story").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Full section content.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
///
/// Markers follow format: `<!-- section:KEY required|droppable -->`
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    use std::sync::LazyLock;
    static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").unwrap()
    });

    let mut sections = Vec::new();
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in matches.iter().enumerate() {
        let key = caps.get(1).unwrap().as_str().to_string();
        let required = caps.get(2).unwrap().as_str() == "required";
        let start = caps.get(0).unwrap().end();
        let end = matches
            .get(i + 1)
            .map(|m| m.get(0).unwrap().start())
            .unwrap_or(rendered.len());

        let content = rendered[start..end].trim().to_string();
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key,
                required,
                content,
            });
        }
    }

    sections
}

/// Apply budget to parsed sections, dropping droppable sections as needed.
///
/// Drop order: document -> project
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    for key in ["document", "project"] {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped_len = sections[idx].content.len();
            debug!(
                section = key,
                bytes_dropped = dropped_len,
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }
}

/// Render sections back to a single string.
fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plan_with_items, story_with_criteria};

    fn inputs() -> PromptInputs {
        let story = story_with_criteria(3, "Login form", &["Form renders", "Submits to API"]);
        let mut plan = plan_with_items(vec![story.clone()]);
        plan.title = "Shop".to_string();
        plan.overview = "A web shop".to_string();
        PromptInputs {
            story,
            project_title: plan.title.clone(),
            project_overview: plan.overview.clone(),
            tech_stack: None,
            document: Some("# Shop\nFull document body".to_string()),
        }
    }

    #[test]
    fn payload_contains_story_and_criteria() {
        let payload = PromptBuilder::new(40_000).build(&inputs()).expect("build");
        assert!(payload.contains("Story 3: Login form"));
        assert!(payload.contains("- Form renders"));
        assert!(payload.contains("- Submits to API"));
        assert!(payload.contains("Shop: A web shop"));
        assert!(payload.contains("Full document body"));
        assert!(!payload.contains("section:"));
    }

    #[test]
    fn budget_drops_droppable_sections_but_keeps_story() {
        // A budget nothing fits in drops every droppable section; required
        // sections are never dropped.
        let tight = PromptBuilder::new(10).build(&inputs()).expect("build");
        assert!(!tight.contains("Full document body"));
        assert!(!tight.contains("A web shop"));
        assert!(tight.contains("Story 3: Login form"));
    }

    #[test]
    fn missing_document_is_tolerated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let story = story_with_criteria(1, "A", &[]);
        let plan = plan_with_items(vec![story.clone()]);
        let input = PromptInputs::from_plan(temp.path(), &plan, &story);
        assert!(input.document.is_none());

        let payload = PromptBuilder::new(40_000).build(&input).expect("build");
        assert!(payload.contains("Story 1: A"));
        assert!(!payload.contains("Requirements document"));
    }
}
