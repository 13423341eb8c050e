use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::Error;
use crate::model::decode::{self, JsonMap};

/// The 27 wire identifiers the moderation API scores, in wire order.
///
/// The first 11 are the standard slash-delimited categories; the remaining 16
/// are the safety set, grouped into self-harm, violence, child-protection and
/// extremism quartets. [`Categories`] and [`CategoryScores`] both decode from
/// this single table so the flag and score namespaces cannot drift apart.
pub const ALL_CATEGORIES: [&str; 27] = [
    "hate",
    "hate/threatening",
    "harassment",
    "harassment/threatening",
    "self-harm",
    "self-harm/intent",
    "self-harm/instructions",
    "sexual",
    "sexual/minors",
    "violence",
    "violence/graphic",
    "self_harm_ideation",
    "self_harm_intent",
    "self_harm_instruction",
    "self_harm_support",
    "violence_general",
    "violence_severe",
    "violence_instruction",
    "violence_glorification",
    "child_sexual_content",
    "minor_sexualization",
    "child_grooming",
    "age_mention_risk",
    "extremism_violence_call",
    "extremism_propaganda",
    "extremism_support",
    "extremism_symbol_reference",
];

const CATEGORY_COUNT: usize = ALL_CATEGORIES.len();

fn category_index(id: &str) -> Option<usize> {
    ALL_CATEGORIES.iter().position(|known| *known == id)
}

/// Per-category boolean flags. Absent wire keys default to `false`;
/// identifiers outside [`ALL_CATEGORIES`] are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categories {
    flags: [bool; CATEGORY_COUNT],
}

impl Categories {
    pub(crate) fn from_map(map: &JsonMap) -> Result<Self, Error> {
        let mut flags = [false; CATEGORY_COUNT];
        for (slot, id) in flags.iter_mut().zip(ALL_CATEGORIES) {
            *slot = decode::bool_or(map, id, false)?;
        }
        Ok(Self { flags })
    }

    /// Decode from a raw wire mapping of identifier to truthy/falsy value.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        Self::from_map(decode::as_object(value, "categories")?)
    }

    /// Flag for a wire identifier; `None` when the identifier is unknown.
    pub fn get(&self, id: &str) -> Option<bool> {
        category_index(id).map(|idx| self.flags[idx])
    }

    /// Identifiers whose flag is set, in wire order.
    pub fn triggered(&self) -> Vec<&'static str> {
        ALL_CATEGORIES
            .iter()
            .zip(self.flags)
            .filter_map(|(id, flag)| flag.then_some(*id))
            .collect()
    }

    pub fn has_any(&self) -> bool {
        self.flags.iter().any(|flag| *flag)
    }
}

impl Serialize for Categories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CATEGORY_COUNT))?;
        for (id, flag) in ALL_CATEGORIES.iter().zip(self.flags) {
            map.serialize_entry(id, &flag)?;
        }
        map.end()
    }
}

/// Per-category confidence scores in `0.0..=1.0`. Absent wire keys default to
/// `0.0`; identifiers outside [`ALL_CATEGORIES`] are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryScores {
    scores: [f64; CATEGORY_COUNT],
}

impl CategoryScores {
    pub(crate) fn from_map(map: &JsonMap) -> Result<Self, Error> {
        let mut scores = [0.0; CATEGORY_COUNT];
        for (slot, id) in scores.iter_mut().zip(ALL_CATEGORIES) {
            *slot = decode::f64_or(map, id, 0.0)?;
        }
        Ok(Self { scores })
    }

    /// Decode from a raw wire mapping of identifier to score.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        Self::from_map(decode::as_object(value, "category_scores")?)
    }

    /// Score for a wire identifier; `None` when the identifier is unknown.
    pub fn get(&self, id: &str) -> Option<f64> {
        category_index(id).map(|idx| self.scores[idx])
    }

    /// All identifier/score pairs, in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        ALL_CATEGORIES.iter().zip(self.scores).map(|(id, s)| (*id, s))
    }

    /// Identifiers scoring strictly above `threshold`, in wire order.
    pub fn above(&self, threshold: f64) -> Vec<(&'static str, f64)> {
        self.iter().filter(|(_, score)| *score > threshold).collect()
    }

    /// Identifier with the maximum score, or `""` when every score is ≤ 0.
    pub fn highest_category(&self) -> &'static str {
        let mut best = "";
        let mut best_score = 0.0;
        for (id, score) in self.iter() {
            if score > best_score {
                best = id;
                best_score = score;
            }
        }
        best
    }

    pub fn highest_score(&self) -> f64 {
        self.iter()
            .map(|(_, score)| score)
            .fold(0.0, f64::max)
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CATEGORY_COUNT))?;
        for (id, score) in self.iter() {
            map.serialize_entry(id, &score)?;
        }
        map.end()
    }
}
