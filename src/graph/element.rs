//! Element representation: a stored knowledge fragment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new random ElementId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Closed classification of what an element holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Code,
    Concept,
    Context,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Code => "code",
            ElementType::Concept => "concept",
            ElementType::Context => "context",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown element type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element type: {0}")]
pub struct UnknownElementType(pub String);

impl FromStr for ElementType {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ElementType::Code),
            "concept" => Ok(ElementType::Concept),
            "context" => Ok(ElementType::Context),
            other => Err(UnknownElementType(other.to_string())),
        }
    }
}

/// Content key written onto an element superseded by a merge
pub const MERGED_INTO_KEY: &str = "merged_into";
/// Timestamp key written alongside [`MERGED_INTO_KEY`]
pub const MERGED_AT_KEY: &str = "merged_at";

/// A unit of stored knowledge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique identifier
    pub id: ElementId,
    /// Closed type classification
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Opaque structured document
    pub content: Value,
    /// Fixed-dimension embedding vector, if one has been computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Element {
    /// Create a new element with a fresh ID and current timestamps
    pub fn new(element_type: ElementType, content: Value) -> Self {
        let now = Utc::now();
        Self {
            id: ElementId::new(),
            element_type,
            content,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach an embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The successor this element was merged into, if it is a tombstone.
    ///
    /// Only object content can carry the annotation at the top level; array
    /// content produced by concatenation keeps it in its last entry.
    pub fn merged_into(&self) -> Option<ElementId> {
        let holder = match &self.content {
            Value::Object(_) => &self.content,
            Value::Array(items) => items.last()?,
            _ => return None,
        };
        holder
            .get(MERGED_INTO_KEY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn is_tombstone(&self) -> bool {
        self.merged_into().is_some()
    }
}

/// Concatenate a JSON patch onto a document.
///
/// Mirrors document-store `||` semantics: objects merge key-by-key with the
/// patch winning, arrays are appended to, and any other combination yields
/// a two-element array. Existing keys not present in the patch are untouched.
pub fn concat_json(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(left), Value::Object(right)) => {
            let mut merged = left.clone();
            for (key, value) in right {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (Value::Array(left), Value::Array(right)) => {
            let mut merged = left.clone();
            merged.extend(right.iter().cloned());
            Value::Array(merged)
        }
        (Value::Array(left), other) => {
            let mut merged = left.clone();
            merged.push(other.clone());
            Value::Array(merged)
        }
        (other, Value::Array(right)) => {
            let mut merged = vec![other.clone()];
            merged.extend(right.iter().cloned());
            Value::Array(merged)
        }
        (left, right) => Value::Array(vec![left.clone(), right.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn element_type_round_trips_through_str() {
        for ty in [ElementType::Code, ElementType::Concept, ElementType::Context] {
            assert_eq!(ty.as_str().parse::<ElementType>().unwrap(), ty);
        }
        assert!("memory".parse::<ElementType>().is_err());
    }

    #[test]
    fn concat_merges_objects_without_dropping_keys() {
        let base = json!({"topic": "rust", "detail": 1});
        let patch = json!({"merged_into": "x"});
        let merged = concat_json(&base, &patch);
        assert_eq!(merged, json!({"topic": "rust", "detail": 1, "merged_into": "x"}));
    }

    #[test]
    fn concat_wraps_scalars_into_array() {
        let merged = concat_json(&json!("plain text"), &json!({"k": 1}));
        assert_eq!(merged, json!(["plain text", {"k": 1}]));
    }

    #[test]
    fn concat_appends_to_arrays() {
        let merged = concat_json(&json!([1, 2]), &json!({"k": 1}));
        assert_eq!(merged, json!([1, 2, {"k": 1}]));
    }

    #[test]
    fn tombstone_detected_on_object_and_array_content() {
        let successor = ElementId::new();
        let mut el = Element::new(ElementType::Concept, json!({"a": 1}));
        assert!(!el.is_tombstone());

        el.content = concat_json(&el.content, &json!({ MERGED_INTO_KEY: successor.to_string() }));
        assert_eq!(el.merged_into(), Some(successor));

        let mut scalar = Element::new(ElementType::Context, json!("text"));
        scalar.content =
            concat_json(&scalar.content, &json!({ MERGED_INTO_KEY: successor.to_string() }));
        assert_eq!(scalar.merged_into(), Some(successor));
    }
}
