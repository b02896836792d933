//! Plan load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

use crate::core::invariants::validate_invariants;
use crate::plan::Plan;

/// File name of the persisted requirements plan, resolved against the
/// project root.
pub const PLAN_FILE: &str = "prd.json";

const PLAN_SCHEMA: &str = include_str!("../../schemas/prd.schema.json");

/// Load and validate the plan from disk (schema + invariants).
pub fn load_plan(path: &Path) -> Result<Plan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", path.display()))?;
    validate_schema(&value)?;
    let plan: Plan = serde_json::from_value(value)
        .with_context(|| format!("deserialize plan {}", path.display()))?;
    validate_plan_invariants(&plan)?;
    Ok(plan)
}

/// Atomically write the plan to disk (temp file + rename).
///
/// The full document is rewritten; unknown fields survive via the model's
/// flattened maps.
pub fn write_plan(path: &Path, plan: &Plan) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(plan)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("plan path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp plan {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace plan {}", path.display()))?;
    Ok(())
}

fn validate_schema(plan: &Value) -> Result<()> {
    let schema_value: Value =
        serde_json::from_str(PLAN_SCHEMA).context("parse embedded plan schema")?;
    let compiled =
        validator_for(&schema_value).map_err(|err| anyhow!("invalid plan schema: {}", err))?;
    if !compiled.is_valid(plan) {
        let messages = compiled
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn validate_plan_invariants(plan: &Plan) -> Result<()> {
    let errors = validate_invariants(plan);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("plan invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plan_with_items, story};

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prd.json");
        let plan = plan_with_items(vec![story(1, false), story(2, true)]);

        write_plan(&path, &plan).expect("write");
        let loaded = load_plan(&path).expect("load");
        assert_eq!(loaded, plan);
    }

    #[test]
    fn write_leaves_no_temp_file_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prd.json");
        write_plan(&path, &plan_with_items(vec![story(1, false)])).expect("write");
        assert!(path.exists());
        assert!(!temp.path().join("prd.json.tmp").exists());
    }

    #[test]
    fn preserves_unknown_fields_across_rewrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prd.json");
        let raw = r#"{
          "title": "App",
          "overview": "An app",
          "techStack": {"frontend": "web"},
          "branchName": "feature/app",
          "items": [
            {"id": 1, "title": "A", "description": "a", "acceptanceCriteria": ["done"], "priority": "high"}
          ]
        }"#;
        fs::write(&path, raw).expect("seed");

        let plan = load_plan(&path).expect("load");
        write_plan(&path, &plan).expect("rewrite");

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).expect("read"))
            .expect("parse");
        assert_eq!(value["branchName"], "feature/app");
        assert_eq!(value["items"][0]["priority"], "high");
        assert_eq!(value["techStack"]["frontend"], "web");
        assert_eq!(value["items"][0]["passes"], false);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prd.json");
        let raw = r#"{
          "title": "App",
          "overview": "An app",
          "items": [
            {"id": 1, "title": "A", "description": "a", "acceptanceCriteria": []},
            {"id": 1, "title": "B", "description": "b", "acceptanceCriteria": []}
          ]
        }"#;
        fs::write(&path, raw).expect("seed");

        let err = load_plan(&path).unwrap_err();
        assert!(err.to_string().contains("plan invariants failed"));
    }

    #[test]
    fn rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("prd.json");
        fs::write(&path, r#"{"title": "App", "items": []}"#).expect("seed");

        let err = load_plan(&path).unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }
}
