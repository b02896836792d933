use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted requirements plan (`prd.json`).
///
/// Unknown fields are kept in `extra` so a full-document rewrite never drops
/// data this crate does not understand.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub title: String,
    pub overview: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub tech_stack: Value,
    pub items: Vec<Story>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One unit of work with a pass/fail completion flag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub passes: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    pub fn incomplete_count(&self) -> usize {
        self.items.iter().filter(|story| !story.passes).count()
    }
}
