//! Decisions produced by the autopilot or the reasoning backend

use crate::core::types::Direction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Move,
    Goto,
    Talk,
    Interact,
    Consume,
    PickUp,
    Drop,
    Craft,
    Trade,
    Rest,
    Sleep,
    Work,
    Inspect,
    Reflect,
    Attack,
    Idle,
}

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        ActionKind::Move,
        ActionKind::Goto,
        ActionKind::Talk,
        ActionKind::Interact,
        ActionKind::Consume,
        ActionKind::PickUp,
        ActionKind::Drop,
        ActionKind::Craft,
        ActionKind::Trade,
        ActionKind::Rest,
        ActionKind::Sleep,
        ActionKind::Work,
        ActionKind::Inspect,
        ActionKind::Reflect,
        ActionKind::Attack,
        ActionKind::Idle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Move => "MOVE",
            ActionKind::Goto => "GOTO",
            ActionKind::Talk => "TALK",
            ActionKind::Interact => "INTERACT",
            ActionKind::Consume => "CONSUME",
            ActionKind::PickUp => "PICK_UP",
            ActionKind::Drop => "DROP",
            ActionKind::Craft => "CRAFT",
            ActionKind::Trade => "TRADE",
            ActionKind::Rest => "REST",
            ActionKind::Sleep => "SLEEP",
            ActionKind::Work => "WORK",
            ActionKind::Inspect => "INSPECT",
            ActionKind::Reflect => "REFLECT",
            ActionKind::Attack => "ATTACK",
            ActionKind::Idle => "IDLE",
        }
    }

    /// Case-insensitive; spaces and dashes count as underscores.
    /// Unknown labels resolve to `Idle`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == normalized)
            .unwrap_or(ActionKind::Idle)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Autopilot,
    Backend,
    /// Substituted after a backend or parse failure
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub thought: String,
    pub action: ActionKind,
    pub target: Option<String>,
    pub direction: Option<Direction>,
    pub speech: Option<String>,
    /// Item offered in a trade
    pub offer: Option<String>,
    /// Item wanted in a trade
    pub want: Option<String>,
    /// Reflection text
    pub note: Option<String>,
    /// Weapon used in an attack
    pub item: Option<String>,
    pub provenance: Provenance,
}

impl Decision {
    pub fn new(action: ActionKind, thought: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action,
            target: None,
            direction: None,
            speech: None,
            offer: None,
            want: None,
            note: None,
            item: None,
            provenance: Provenance::Autopilot,
        }
    }

    pub fn idle(thought: impl Into<String>) -> Self {
        Self::new(ActionKind::Idle, thought)
    }

    pub fn moving(direction: Direction, thought: impl Into<String>) -> Self {
        Self::new(ActionKind::Move, thought).with_direction(direction)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_speech(mut self, speech: impl Into<String>) -> Self {
        self.speech = Some(speech.into());
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn target_or_empty(&self) -> &str {
        self.target.as_deref().unwrap_or("")
    }

    /// Build a decision from a parsed backend object. Missing or odd fields
    /// are tolerated: numbers become strings, unknown actions become idle and
    /// an unparseable direction is dropped.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |key: &str| -> Option<String> {
            match obj.get(key)? {
                Value::Null => None,
                Value::String(s) => {
                    let s = s.trim();
                    (!s.is_empty()).then(|| s.to_string())
                }
                Value::Bool(b) => Some(b.to_string()),
                Value::Number(n) => Some(n.to_string()),
                other => Some(other.to_string()),
            }
        };

        let action = field("action")
            .map(|a| ActionKind::from_label(&a))
            .unwrap_or(ActionKind::Idle);
        let direction = field("direction").and_then(|d| d.parse::<Direction>().ok());

        Some(Self {
            thought: field("thought").unwrap_or_default(),
            action,
            target: field("target"),
            direction,
            speech: field("speech"),
            offer: field("offer"),
            want: field("want"),
            note: field("note"),
            item: field("item"),
            provenance: Provenance::Backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_labels() {
        assert_eq!(ActionKind::from_label("pick up"), ActionKind::PickUp);
        assert_eq!(ActionKind::from_label(" consume "), ActionKind::Consume);
        assert_eq!(ActionKind::from_label("DANCE"), ActionKind::Idle);
        assert_eq!(ActionKind::from_label("BUY"), ActionKind::Idle);
        assert_eq!(ActionKind::PickUp.label(), "PICK_UP");
    }

    #[test]
    fn test_from_json_is_tolerant() {
        let value = json!({
            "thought": "I am thirsty",
            "action": "goto",
            "target": "Fountain",
            "direction": "up-ish",
            "speech": 42,
            "note": null,
        });
        let decision = Decision::from_json(&value).unwrap();
        assert_eq!(decision.action, ActionKind::Goto);
        assert_eq!(decision.target.as_deref(), Some("Fountain"));
        assert_eq!(decision.direction, None);
        assert_eq!(decision.speech.as_deref(), Some("42"));
        assert_eq!(decision.note, None);
        assert_eq!(decision.provenance, Provenance::Backend);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Decision::from_json(&json!([1, 2])).is_none());
        let empty = Decision::from_json(&json!({})).unwrap();
        assert_eq!(empty.action, ActionKind::Idle);
    }

    #[test]
    fn test_serializes_with_wire_labels() {
        let decision = Decision::moving(Direction::North, "Go");
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["action"], "MOVE");
        assert_eq!(value["direction"], "north");
        assert_eq!(value["provenance"], "autopilot");
    }
}
