//! Per-kind task input, validated when a task is created.

use std::collections::BTreeMap;

use applykit_types::TaskKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const MAX_RESULTS_LIMIT: usize = 50;

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInput {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitInput {
    #[serde(default)]
    pub job_id: String,
    /// Resume to tailor against; the owner's newest upload when absent.
    #[serde(default, alias = "resume_s3_key", skip_serializing_if = "Option::is_none")]
    pub resume_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillInput {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub application_url: String,
    #[serde(default)]
    pub form_data: BTreeMap<String, String>,
    #[serde(default)]
    pub submit: bool,
}

/// Validated input of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    Search(SearchInput),
    Kit(KitInput),
    Fill(FillInput),
}

fn decode<T: for<'de> Deserialize<'de>>(kind: TaskKind, input: &Value) -> Result<T, String> {
    if !input.is_object() {
        return Err(format!("{kind} input must be a JSON object"));
    }
    serde_json::from_value(input.clone()).map_err(|e| format!("invalid {kind} input: {e}"))
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

impl TaskInput {
    /// Check `input` has what `kind` needs. The error names the offending
    /// field.
    pub fn parse(kind: TaskKind, input: &Value) -> Result<Self, String> {
        match kind {
            TaskKind::JobSearch => {
                let mut search: SearchInput = decode(kind, input)?;
                require("query", &search.query)?;
                if !(1..=MAX_RESULTS_LIMIT).contains(&search.max_results) {
                    return Err(format!(
                        "max_results must be between 1 and {MAX_RESULTS_LIMIT}"
                    ));
                }
                search.query = search.query.trim().to_string();
                search.location = search.location.filter(|l| !l.trim().is_empty());
                Ok(TaskInput::Search(search))
            }
            TaskKind::KitGeneration => {
                let mut kit: KitInput = decode(kind, input)?;
                require("job_id", &kit.job_id)?;
                kit.resume_key = kit.resume_key.filter(|k| !k.is_empty());
                Ok(TaskInput::Kit(kit))
            }
            TaskKind::FormFill => {
                let fill: FillInput = decode(kind, input)?;
                require("job_id", &fill.job_id)?;
                require("application_url", &fill.application_url)?;
                let url = fill.application_url.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err("application_url must be an http or https URL".into());
                }
                Ok(TaskInput::Fill(fill))
            }
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskInput::Search(_) => TaskKind::JobSearch,
            TaskInput::Kit(_) => TaskKind::KitGeneration,
            TaskInput::Fill(_) => TaskKind::FormFill,
        }
    }

    /// Parent job, for kinds that have one.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            TaskInput::Search(_) => None,
            TaskInput::Kit(kit) => Some(&kit.job_id),
            TaskInput::Fill(fill) => Some(&fill.job_id),
        }
    }

    /// Canonical JSON form, as stored on the task.
    pub fn to_value(&self) -> Value {
        let value = match self {
            TaskInput::Search(search) => serde_json::to_value(search),
            TaskInput::Kit(kit) => serde_json::to_value(kit),
            TaskInput::Fill(fill) => serde_json::to_value(fill),
        };
        // Plain structs of strings, numbers and maps always serialize.
        value.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_search_defaults_and_trim() {
        let input = TaskInput::parse(TaskKind::JobSearch, &json!({"query": " engineer "})).unwrap();
        assert_eq!(
            input,
            TaskInput::Search(SearchInput {
                query: "engineer".into(),
                location: None,
                max_results: 20,
            })
        );
        assert_eq!(input.to_value(), json!({"query": "engineer", "max_results": 20}));
        assert_eq!(input.job_id(), None);
    }

    #[test]
    fn test_search_validation_messages() {
        let err = TaskInput::parse(TaskKind::JobSearch, &json!({})).unwrap_err();
        assert_eq!(err, "query is required");
        let err = TaskInput::parse(TaskKind::JobSearch, &json!({"query": "x", "max_results": 0}))
            .unwrap_err();
        assert_eq!(err, "max_results must be between 1 and 50");
        let err = TaskInput::parse(TaskKind::JobSearch, &json!("engineer")).unwrap_err();
        assert_eq!(err, "job_search input must be a JSON object");
    }

    #[test]
    fn test_kit_accepts_legacy_resume_field() {
        let input = TaskInput::parse(
            TaskKind::KitGeneration,
            &json!({"job_id": "j1", "resume_s3_key": "resumes/u1/resume_1.pdf"}),
        )
        .unwrap();
        match &input {
            TaskInput::Kit(kit) => {
                assert_eq!(kit.resume_key.as_deref(), Some("resumes/u1/resume_1.pdf"))
            }
            other => panic!("unexpected input: {other:?}"),
        }
        assert_eq!(input.job_id(), Some("j1"));
        assert_eq!(
            TaskInput::parse(TaskKind::KitGeneration, &json!({})).unwrap_err(),
            "job_id is required"
        );
    }

    #[test]
    fn test_fill_requires_http_url() {
        let err = TaskInput::parse(TaskKind::FormFill, &json!({"job_id": "j1"})).unwrap_err();
        assert_eq!(err, "application_url is required");
        let err = TaskInput::parse(
            TaskKind::FormFill,
            &json!({"job_id": "j1", "application_url": "ftp://x"}),
        )
        .unwrap_err();
        assert!(err.contains("http"));
        let input = TaskInput::parse(
            TaskKind::FormFill,
            &json!({"job_id": "j1", "application_url": "https://x/apply", "form_data": {"email": "a@b"}}),
        )
        .unwrap();
        assert_eq!(input.kind(), TaskKind::FormFill);
        assert_eq!(input.to_value()["submit"], json!(false));
    }

    #[test]
    fn test_non_string_form_values_rejected() {
        let err = TaskInput::parse(
            TaskKind::FormFill,
            &json!({"job_id": "j1", "application_url": "https://x", "form_data": {"age": 3}}),
        )
        .unwrap_err();
        assert!(err.starts_with("invalid form_fill input"));
    }
}
