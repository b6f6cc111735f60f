//! Core domain types: records, field values, and pipeline stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ContentPipeError, Result};

/// Name of the field that carries a record's pipeline stage.
pub const STATE_FIELD: &str = "state";

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Opaque identifier assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single field value: text, a list of strings, or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Null,
}

impl FieldValue {
    /// Text view of the value. Lists are joined with `", "`, null is empty.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
            Self::Null => String::new(),
        }
    }

    /// Whether the value counts as empty (null, blank text, or empty list).
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.iter().all(|i| i.trim().is_empty()),
            Self::Null => true,
        }
    }

    /// Normalize an arbitrary JSON value coming from a store.
    ///
    /// Numbers and booleans become text, arrays of strings become lists,
    /// arrays of objects (attachments) become the list of their `url` keys.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(obj) => obj
                            .get("url")
                            .and_then(Value::as_str)
                            .map(String::from)
                            .or_else(|| obj.get("name").and_then(Value::as_str).map(String::from)),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
            Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// JSON representation for writing back to a store.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Field name → value, ordered for deterministic output.
pub type Fields = BTreeMap<String, FieldValue>;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One unit of content moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text of a field, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(FieldValue::to_text)
            .unwrap_or_default()
    }

    /// Non-blank text of a field, or `None`.
    pub fn non_blank(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.is_blank())
            .map(FieldValue::to_text)
    }

    /// Non-blank text of a field, or a [`ContentPipeError::MissingField`].
    pub fn require(&self, name: &str) -> Result<String> {
        self.non_blank(name)
            .ok_or_else(|| ContentPipeError::missing_field(name))
    }

    /// First non-blank item of a list field (or the text itself).
    pub fn first_item(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            FieldValue::List(items) => items.iter().find(|i| !i.trim().is_empty()).cloned(),
            FieldValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// The record's stage. An absent or blank state is [`Stage::Init`].
    pub fn stage(&self) -> Result<Stage> {
        match self.non_blank(STATE_FIELD) {
            None => Ok(Stage::Init),
            Some(s) => s.parse(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Named pipeline stage of a record.
///
/// The main path is `INIT → REVIEW_REQUIRED → READY_TO_PUBLISH → PUBLISHED`.
/// `SKIPPED` and `FAILED` are terminal exits reachable from any non-terminal
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    ReviewRequired,
    ReadyToPublish,
    Published,
    Skipped,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::ReviewRequired => "REVIEW_REQUIRED",
            Self::ReadyToPublish => "READY_TO_PUBLISH",
            Self::Published => "PUBLISHED",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        }
    }

    /// Position on the main path; `None` for the side exits.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Init => Some(0),
            Self::ReviewRequired => Some(1),
            Self::ReadyToPublish => Some(2),
            Self::Published => Some(3),
            Self::Skipped | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Published | Self::Skipped | Self::Failed)
    }

    /// Whether moving from `self` to `next` keeps the transition monotonic.
    ///
    /// Staying put is always allowed. Terminal stages never move.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = ContentPipeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(Self::Init),
            "REVIEW_REQUIRED" => Ok(Self::ReviewRequired),
            "READY_TO_PUBLISH" => Ok(Self::ReadyToPublish),
            "PUBLISHED" => Ok(Self::Published),
            "SKIPPED" => Ok(Self::Skipped),
            "FAILED" => Ok(Self::Failed),
            other => Err(ContentPipeError::validation(format!(
                "unrecognized state: {other}"
            ))),
        }
    }
}

impl From<Stage> for FieldValue {
    fn from(stage: Stage) -> Self {
        Self::Text(stage.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[(&str, FieldValue)]) -> Record {
        Record::new(
            "rec1",
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn absent_state_is_init() {
        let rec = record(&[]);
        assert_eq!(rec.stage().unwrap(), Stage::Init);
    }

    #[test]
    fn stage_parsing_is_strict() {
        assert_eq!("READY_TO_PUBLISH".parse::<Stage>().unwrap(), Stage::ReadyToPublish);
        assert!("ready_to_publish".parse::<Stage>().is_err());
        assert!("Published".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_transitions_are_monotonic() {
        assert!(Stage::Init.can_advance_to(Stage::ReviewRequired));
        assert!(Stage::Init.can_advance_to(Stage::Published));
        assert!(Stage::ReadyToPublish.can_advance_to(Stage::ReadyToPublish));
        assert!(Stage::ReviewRequired.can_advance_to(Stage::Failed));
        assert!(!Stage::ReadyToPublish.can_advance_to(Stage::Init));
        assert!(!Stage::Published.can_advance_to(Stage::Failed));
        assert!(!Stage::Skipped.can_advance_to(Stage::Init));
    }

    #[test]
    fn require_treats_blank_as_missing() {
        let rec = record(&[("source_content_text", "   ".into())]);
        let err = rec.require("source_content_text").unwrap_err();
        assert_eq!(err.to_string(), "missing field: source_content_text");
        assert!(rec.require("nope").is_err());
    }

    #[test]
    fn json_normalization() {
        let attachments = serde_json::json!([
            {"id": "att1", "url": "https://cdn.example.com/a.mp4"},
            {"id": "att2", "url": "https://cdn.example.com/b.mp4"}
        ]);
        let value = FieldValue::from_json(&attachments);
        assert_eq!(
            value,
            FieldValue::List(vec![
                "https://cdn.example.com/a.mp4".into(),
                "https://cdn.example.com/b.mp4".into()
            ])
        );
        assert_eq!(FieldValue::from_json(&serde_json::json!(42)), FieldValue::Text("42".into()));
        assert_eq!(FieldValue::from_json(&serde_json::Value::Null), FieldValue::Null);
    }

    #[test]
    fn first_item_of_list() {
        let rec = record(&[(
            "image",
            FieldValue::List(vec!["".into(), "https://x/img.png".into()]),
        )]);
        assert_eq!(rec.first_item("image").as_deref(), Some("https://x/img.png"));
        assert_eq!(rec.first_item("video"), None);
    }

    #[test]
    fn record_serialization() {
        let rec = record(&[
            ("state", Stage::Init.into()),
            ("tags", FieldValue::List(vec!["a".into(), "b".into()])),
            ("empty", FieldValue::Null),
        ]);
        let json = serde_json::to_string(&rec).expect("serialize");
        let parsed: Record = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, rec);
    }
}
