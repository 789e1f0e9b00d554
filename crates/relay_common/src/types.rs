//! Core data model: catalog entities, utterances, intents, match results,
//! service calls, and routing decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trace::RoutingTrace;

/// Controllable entity domains. Entities outside this allowlist never enter
/// the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityDomain {
    Light,
    Switch,
    Fan,
    Cover,
    Climate,
    Lock,
    Scene,
    Script,
    InputBoolean,
}

impl EntityDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Fan => "fan",
            Self::Cover => "cover",
            Self::Climate => "climate",
            Self::Lock => "lock",
            Self::Scene => "scene",
            Self::Script => "script",
            Self::InputBoolean => "input_boolean",
        }
    }

    /// Parse from a domain string as reported by the entity source.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "switch" => Some(Self::Switch),
            "fan" => Some(Self::Fan),
            "cover" => Some(Self::Cover),
            "climate" => Some(Self::Climate),
            "lock" => Some(Self::Lock),
            "scene" => Some(Self::Scene),
            "script" => Some(Self::Script),
            "input_boolean" => Some(Self::InputBoolean),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entity exposed to the assistant. Immutable once built; the whole
/// catalog snapshot is replaced on refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub domain: EntityDomain,
    pub friendly_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Area name, if the host assigned one. Participates in match-candidate
    /// expansion like an alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
}

/// One turn's input. Created at orchestrator entry, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub raw_text: String,
    pub conversation_id: String,
    pub language: String,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    /// Build an utterance, generating a conversation id when the host
    /// pipeline did not supply one.
    pub fn new(raw_text: &str, conversation_id: Option<String>, language: Option<String>) -> Self {
        Self {
            raw_text: raw_text.to_string(),
            conversation_id: conversation_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            language: language.unwrap_or_else(|| "en".to_string()),
            received_at: Utc::now(),
        }
    }
}

/// Recognized action verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    TurnOn,
    TurnOff,
    Toggle,
    SetLevel,
    Unknown,
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
            Self::SetLevel => "set_level",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Verb plus target phrase, derived once per utterance by the intent
/// extractor. `verb` is `Unknown` only when no action token was recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentCandidate {
    pub verb: Verb,
    pub target_phrase: String,
    /// Numeric argument of set/dim commands.
    pub level: Option<f64>,
}

/// One scored catalog entity. Scores are comparable only within a single
/// matching pass.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub entity: CatalogEntity,
    pub score: f64,
    pub matched_alias: String,
}

/// A resolved service invocation for the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
}

/// Routing stages, in attempt order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Deterministic,
    Primary,
    Fallback,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of one stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Miss,
    Error,
}

impl StageOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Final result of routing one utterance. Built by the orchestrator,
/// finalized and returned exactly once.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub response: Option<String>,
    pub trace: RoutingTrace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_round_trip() {
        for s in [
            "light",
            "switch",
            "fan",
            "cover",
            "climate",
            "lock",
            "scene",
            "script",
            "input_boolean",
        ] {
            let domain = EntityDomain::from_str(s).unwrap();
            assert_eq!(domain.as_str(), s);
        }
        assert!(EntityDomain::from_str("sensor").is_none());
    }

    #[test]
    fn test_utterance_fills_conversation_id() {
        let u = Utterance::new("turn on the light", None, None);
        assert!(!u.conversation_id.is_empty());
        assert_eq!(u.language, "en");

        let u = Utterance::new("turn on the light", Some("abc".into()), Some("de".into()));
        assert_eq!(u.conversation_id, "abc");
        assert_eq!(u.language, "de");
    }

    #[test]
    fn test_entity_deserializes_without_optional_fields() {
        let e: CatalogEntity = serde_json::from_str(
            r#"{"id": "light.office_light", "domain": "light", "friendly_name": "Office Light"}"#,
        )
        .unwrap();
        assert!(e.aliases.is_empty());
        assert!(e.area.is_none());
    }
}
