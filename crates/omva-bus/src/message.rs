//! The bus envelope.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One named message on the bus.
///
/// Wire form: `{"type": "...", "data": {...}, "context": {...}}`. Both
/// `data` and `context` default to empty objects when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default = "empty_object")]
    pub context: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl BusMessage {
    /// Creates a message originating from this skill.
    pub fn new(msg_type: impl Into<String>, data: Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            data,
            context: json!({ "source": omva_types::SKILL_ID }),
        }
    }

    /// Parses a wire frame.
    pub fn from_json(text: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes to a wire frame.
    pub fn to_json(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_and_context_default_to_objects() {
        let msg = BusMessage::from_json(r#"{"type": "ovos.voiceid.list_users"}"#).unwrap();
        assert_eq!(msg.msg_type, "ovos.voiceid.list_users");
        assert!(msg.data.as_object().unwrap().is_empty());
        assert!(msg.context.as_object().unwrap().is_empty());
    }

    #[test]
    fn type_field_is_renamed_on_the_wire() {
        let msg = BusMessage::new("speak", json!({"utterance": "hi"}));
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "speak");
        assert_eq!(value["data"]["utterance"], "hi");
        assert_eq!(value["context"]["source"], omva_types::SKILL_ID);
    }

    #[test]
    fn frame_without_type_is_rejected() {
        assert!(BusMessage::from_json(r#"{"data": {}}"#).is_err());
    }
}
