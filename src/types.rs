//! Wire and result types.
//!
//! `Raw*` types mirror the Wit.ai `/message` response. `Normalized*` types are
//! the shape the dialog layer consumes (camelCase keys, optional fields
//! omitted rather than null).

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved entity label Wit.ai uses to report the detected intent.
pub const INTENT_LABEL: &str = "intent";

/// Match `type` that carries a flat, locatable `value`.
pub const VALUE_KIND: &str = "value";

// ── Raw response ─────────────────────────────────────────────────────────────

/// A single match under an entity label.
///
/// Wit.ai is not consistent about the shape: `"value"` matches carry a flat
/// `value`, others such as `"interval"` only carry `values`/`from`/`to`.
/// Anything not modelled explicitly is kept in `extra` so the match
/// round-trips verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntityMatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEntityMatch {
    /// Build a `"value"` match.
    pub fn value(value: &str, confidence: f64) -> Self {
        Self {
            kind: Some(VALUE_KIND.to_string()),
            confidence,
            value: Some(Value::String(value.to_string())),
            values: None,
            extra: Map::new(),
        }
    }

    /// Build an untyped match, the shape Wit.ai uses for intents.
    pub fn untyped(value: &str, confidence: f64) -> Self {
        Self {
            kind: None,
            ..Self::value(value, confidence)
        }
    }

    /// Whether this match is of type `"value"`.
    pub fn is_value(&self) -> bool {
        self.kind.as_deref() == Some(VALUE_KIND)
    }

    /// The flat value rendered as text.
    ///
    /// Strings come back as-is; numbers and booleans use their JSON text.
    /// Objects, arrays and null yield `None`.
    pub fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Entity labels in response order.
///
/// Backed by a `Vec` so label iteration order matches the JSON document,
/// which the normalized `entities` list depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMap(Vec<(String, Vec<RawEntityMatch>)>);

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a label, keeping its original position on replace.
    pub fn insert(&mut self, label: impl Into<String>, matches: Vec<RawEntityMatch>) {
        let label = label.into();
        match self.0.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = matches,
            None => self.0.push((label, matches)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, label: impl Into<String>, matches: Vec<RawEntityMatch>) -> Self {
        self.insert(label, matches);
        self
    }

    pub fn get(&self, label: &str) -> Option<&[RawEntityMatch]> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| m.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RawEntityMatch])> {
        self.0.iter().map(|(l, m)| (l.as_str(), m.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for EntityMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, matches) in &self.0 {
            map.serialize_entry(label, matches)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntityMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntityMapVisitor;

        impl<'de> Visitor<'de> for EntityMapVisitor {
            type Value = EntityMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of entity label to match list")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<EntityMap, E> {
                Ok(EntityMap::new())
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<EntityMap, E> {
                Ok(EntityMap::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<EntityMap, A::Error> {
                let mut map = EntityMap::new();
                while let Some((label, matches)) =
                    access.next_entry::<String, Vec<RawEntityMatch>>()?
                {
                    map.insert(label, matches);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(EntityMapVisitor)
    }
}

/// The body returned by `GET /message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawClassification {
    /// The text that was classified. Older API versions call it `_text`.
    #[serde(rename = "_text", alias = "text", default)]
    pub text: String,
    #[serde(default)]
    pub entities: EntityMap,
    /// Set by Wit.ai on failure (bad token, malformed params, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `msg_id`, `code` and anything else the provider sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawClassification {
    pub fn new(text: &str, entities: EntityMap) -> Self {
        Self {
            text: text.to_string(),
            entities,
            ..Self::default()
        }
    }

    /// A provider error response.
    pub fn failed(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// ── Normalized result ────────────────────────────────────────────────────────

/// One entry of [`NormalizedResult::intents`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: String,
    pub score: f64,
}

/// An entity as the dialog layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEntity {
    /// The source label.
    #[serde(rename = "type")]
    pub kind: String,
    /// The flat value; `None` for structured matches such as intervals.
    pub entity: Option<String>,
    /// The untouched provider match, for callers needing structured data.
    pub raw_entity: RawEntityMatch,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,
}

/// The recognizer's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub score: f64,
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intents: Option<Vec<IntentScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<NormalizedEntity>>,
}

impl Default for NormalizedResult {
    /// `{score: 0.0, intent: null}`: the dialog layer's "no match".
    fn default() -> Self {
        Self {
            score: 0.0,
            intent: None,
            intents: None,
            entities: None,
        }
    }
}

impl NormalizedResult {
    /// Whether this is the no-signal result.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Contexts ─────────────────────────────────────────────────────────────────

/// The incoming message of a dialog turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizeMessage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Per-turn context handed over by the dialog framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizeContext {
    #[serde(default)]
    pub message: RecognizeMessage,
}

impl RecognizeContext {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            message: RecognizeMessage {
                text: Some(text.into()),
            },
        }
    }

    /// The utterance, if present and non-empty.
    pub fn utterance(&self) -> Option<&str> {
        self.message.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Optional Wit.ai request context. Forwarded to the provider; never part of
/// the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifyContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl ClassifyContext {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
