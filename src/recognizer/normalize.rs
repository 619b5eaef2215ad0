//! Maps a raw Wit.ai classification onto the dialog layer's result shape.
//!
//! Wit.ai reports the intent as just another entity label (`"intent"`), so
//! the first step is always to split it off from the domain entities.

use crate::types::{
    IntentScore, NormalizedEntity, NormalizedResult, RawClassification, RawEntityMatch,
    INTENT_LABEL,
};

/// Intent reported when entities were found but no intent was.
pub const NONE_INTENT: &str = "none";

/// Score paired with [`NONE_INTENT`].
///
/// Must be positive: a zero score makes the dialog layer fall through to its
/// default handler and the entities are lost.
pub const NONE_INTENT_SCORE: f64 = 0.1;

/// Normalize a successful classification.
///
/// Error responses must be rejected by the caller before this point; the
/// `error` field is ignored here.
pub fn normalize(raw: &RawClassification) -> NormalizedResult {
    let mut result = NormalizedResult::default();

    let intent = raw
        .entities
        .get(INTENT_LABEL)
        .and_then(|matches| matches.first());
    let mut others = raw
        .entities
        .iter()
        .filter(|(label, _)| *label != INTENT_LABEL)
        .peekable();

    if intent.is_none() && others.peek().is_none() {
        return result;
    }

    if let Some(m) = intent {
        // An intent match without a usable value keeps its score but names
        // no intent, so the fallback below can still apply.
        let name = m.value_text();
        result.score = m.confidence;
        result.intents = name.as_ref().map(|name| {
            vec![IntentScore {
                intent: name.clone(),
                score: m.confidence,
            }]
        });
        result.intent = name;
    }

    if others.peek().is_some() {
        if result.intent.as_deref().map_or(true, str::is_empty) {
            result.intent = Some(NONE_INTENT.to_string());
            result.score = NONE_INTENT_SCORE;
        }

        let entities = others
            .flat_map(|(label, matches)| {
                matches
                    .iter()
                    .map(move |m| normalize_entity(label, m, &raw.text))
            })
            .collect();
        result.entities = Some(entities);
    }

    result
}

fn normalize_entity(label: &str, m: &RawEntityMatch, text: &str) -> NormalizedEntity {
    let mut entity = NormalizedEntity {
        kind: label.to_string(),
        entity: None,
        raw_entity: m.clone(),
        score: m.confidence,
        start_index: None,
        end_index: None,
    };

    if m.is_value() {
        if let Some(value) = m.value_text() {
            let (start, end) = locate(text, &value);
            entity.start_index = Some(start);
            entity.end_index = Some(end);
            entity.entity = Some(value);
        }
    }

    entity
}

/// First-occurrence span of `needle` in `haystack`, in chars, end inclusive.
///
/// When `needle` does not occur (resolved datetimes, normalized numbers) the
/// start is `-1` and the end is `len - 2`. Callers rely on this exact pair to
/// recognize unlocatable values.
pub fn locate(haystack: &str, needle: &str) -> (i64, i64) {
    let start = haystack
        .find(needle)
        .map(|byte_idx| haystack[..byte_idx].chars().count() as i64)
        .unwrap_or(-1);
    let len = needle.chars().count() as i64;
    (start, start + len - 1)
}
