//! Response annotations attached to prompt documents.

use serde::Deserialize;
use serde_json::Value;

use super::prompt::PromptKey;

/// Attribute name marking the selected response for a prompt.
const IS_BEST_ATTRIBUTE: &str = "isBest";

/// A response candidate attached to a prompt document.
///
/// Deserializes from the platform's annotation JSON. The `isBest` flag lives
/// under `metadata.system.attributes`; when the attribute (or any level above
/// it) is missing the annotation is simply not the best one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAnnotation")]
pub struct Annotation {
    pub id: String,
    /// Free-form payload; for text responses this is the response string.
    pub coordinates: Value,
    pub is_best: bool,
    pub prompt_id: Option<PromptKey>,
}

impl Annotation {
    pub fn new(id: impl Into<String>, coordinates: Value) -> Self {
        Self {
            id: id.into(),
            coordinates,
            is_best: false,
            prompt_id: None,
        }
    }

    pub fn best(mut self, is_best: bool) -> Self {
        self.is_best = is_best;
        self
    }

    pub fn for_prompt(mut self, key: PromptKey) -> Self {
        self.prompt_id = Some(key);
        self
    }

    /// Whether this is the selected response for `key`.
    pub fn is_best_for(&self, key: &PromptKey) -> bool {
        self.is_best && self.prompt_id.as_ref() == Some(key)
    }

    /// Value written back to the table: strings verbatim, anything else as
    /// compact JSON.
    pub fn response_value(&self) -> String {
        match &self.coordinates {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawAnnotation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    coordinates: Value,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    system: RawSystemMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawSystemMetadata {
    #[serde(default, rename = "promptId")]
    prompt_id: Option<String>,
    #[serde(default)]
    attributes: Value,
}

impl From<RawAnnotation> for Annotation {
    fn from(raw: RawAnnotation) -> Self {
        let system = raw.metadata.system;
        let is_best = system
            .attributes
            .get(IS_BEST_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            id: raw.id,
            coordinates: raw.coordinates,
            is_best,
            prompt_id: system.prompt_id.map(PromptKey::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_best_annotation() {
        let raw = json!({
            "id": "ann-1",
            "type": "text",
            "coordinates": "hello",
            "metadata": {"system": {"promptId": "1", "attributes": {"isBest": true}}}
        });
        let ann: Annotation = serde_json::from_value(raw).unwrap();
        assert_eq!(ann.id, "ann-1");
        assert!(ann.is_best);
        assert!(ann.is_best_for(&PromptKey::new("1")));
        assert!(!ann.is_best_for(&PromptKey::new("2")));
        assert_eq!(ann.response_value(), "hello");
    }

    #[test]
    fn test_missing_attributes_default_to_not_best() {
        let cases = [
            json!({"id": "a", "coordinates": "x"}),
            json!({"id": "b", "coordinates": "x", "metadata": {}}),
            json!({"id": "c", "coordinates": "x", "metadata": {"system": {"promptId": "1"}}}),
            // Legacy list-style attributes carry no isBest flag.
            json!({"id": "d", "coordinates": "x", "metadata": {"system": {"attributes": ["isBest"]}}}),
        ];
        for raw in cases {
            let ann: Annotation = serde_json::from_value(raw).unwrap();
            assert!(!ann.is_best, "{} should not be best", ann.id);
        }
    }

    #[test]
    fn test_response_value_serializes_structured_coordinates() {
        let ann = Annotation::new("a", json!({"text": "hi"}));
        assert_eq!(ann.response_value(), r#"{"text":"hi"}"#);
    }
}
