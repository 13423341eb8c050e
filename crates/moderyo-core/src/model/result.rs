use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::model::categories::{Categories, CategoryScores};
use crate::model::decode::{self, JsonMap};

/// The policy engine's verdict for an input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    #[default]
    Allow,
    Flag,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Flag => "FLAG",
            Decision::Block => "BLOCK",
        }
    }

    fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "ALLOW" => Ok(Decision::Allow),
            "FLAG" => Ok(Decision::Flag),
            "BLOCK" => Ok(Decision::Block),
            other => Err(Error::Decode(format!("unknown policy decision `{other}`"))),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse per-axis scores reported alongside the category breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimplifiedScores {
    pub toxicity: f64,
    pub hate: f64,
    pub harassment: f64,
    pub scam: f64,
    pub violence: f64,
    pub fraud: f64,
}

impl SimplifiedScores {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            toxicity: decode::f64_or(map, "toxicity", 0.0)?,
            hate: decode::f64_or(map, "hate", 0.0)?,
            harassment: decode::f64_or(map, "harassment", 0.0)?,
            scam: decode::f64_or(map, "scam", 0.0)?,
            violence: decode::f64_or(map, "violence", 0.0)?,
            fraud: decode::f64_or(map, "fraud", 0.0)?,
        })
    }
}

/// The rule that produced a policy decision, when the service reports one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggeredRule {
    pub id: Option<String>,
    pub rule_type: Option<String>,
    pub category: Option<String>,
    pub threshold: Option<f64>,
    pub actual_value: Option<f64>,
    pub matched: Option<String>,
}

impl TriggeredRule {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            id: decode::opt_str(map, "id")?,
            rule_type: decode::opt_str(map, "type")?,
            category: decode::opt_str(map, "category")?,
            threshold: decode::opt_f64(map, "threshold")?,
            actual_value: decode::opt_f64(map, "actual_value")?,
            matched: decode::opt_str(map, "matched")?,
        })
    }
}

/// A span of the input text that contributed to a policy decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlight {
    pub text: String,
    pub category: String,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
}

impl Highlight {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            text: decode::str_or(map, "text", "")?,
            category: decode::str_or(map, "category", "")?,
            start_index: decode::opt_i64(map, "start_index")?,
            end_index: decode::opt_i64(map, "end_index")?,
        })
    }
}

/// Enforced verdict plus the evidence behind it. Absent entirely when the
/// payload carries no `policy_decision` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
    pub severity: Option<String>,
    pub triggered_rule: Option<TriggeredRule>,
    pub highlights: Vec<Highlight>,
}

impl PolicyDecision {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        let decision = match decode::opt_str(map, "decision")? {
            Some(raw) => Decision::parse(&raw)?,
            None => Decision::default(),
        };
        Ok(Self {
            decision,
            rule_id: decode::opt_str(map, "rule_id")?,
            rule_name: decode::opt_str(map, "rule_name")?,
            reason: decode::opt_str(map, "reason")?,
            confidence: decode::opt_f64(map, "confidence")?,
            severity: decode::opt_str(map, "severity")?,
            triggered_rule: decode::opt_object(map, "triggered_rule")?
                .map(TriggeredRule::from_map)
                .transpose()?,
            highlights: decode::object_items(map, "highlights")?
                .into_iter()
                .map(Highlight::from_map)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectedPhrase {
    pub text: String,
    pub label: String,
}

impl DetectedPhrase {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            text: decode::str_or(map, "text", "")?,
            label: decode::str_or(map, "label", "")?,
        })
    }
}

/// Per-sentence signal from long-text mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentenceAnalysis {
    pub text: String,
    pub score: f64,
    pub flagged: bool,
    pub category: String,
}

impl SentenceAnalysis {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            text: decode::str_or(map, "text", "")?,
            score: decode::f64_or(map, "score", 0.0)?,
            flagged: decode::bool_or(map, "flagged", false)?,
            category: decode::str_or(map, "category", "")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LongTextHighlight {
    pub text: String,
    pub category: String,
    pub score: f64,
    pub sentence_index: Option<i64>,
}

impl LongTextHighlight {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            text: decode::str_or(map, "text", "")?,
            category: decode::str_or(map, "category", "")?,
            score: decode::f64_or(map, "score", 0.0)?,
            sentence_index: decode::opt_i64(map, "sentence_index")?,
        })
    }
}

/// How the service preprocessed a long-text request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingInfo {
    pub mode: Option<String>,
    pub original_char_count: Option<i64>,
    pub processed_char_count: Option<i64>,
    pub truncated: bool,
    pub inference_time_ms: Option<f64>,
}

impl ProcessingInfo {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            mode: decode::opt_str(map, "mode")?,
            original_char_count: decode::opt_i64(map, "original_char_count")?,
            processed_char_count: decode::opt_i64(map, "processed_char_count")?,
            truncated: decode::bool_or(map, "truncated", false)?,
            inference_time_ms: decode::opt_f64(map, "inference_time_ms")?,
        })
    }
}

/// Sentence-segmented analysis produced by long-text mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LongTextAnalysis {
    pub overall_toxicity: f64,
    pub max_toxicity: f64,
    pub top3_mean_toxicity: f64,
    pub decision_confidence: f64,
    pub signal_confidence: f64,
    pub sentences: Vec<SentenceAnalysis>,
    pub highlights: Vec<LongTextHighlight>,
    pub processing: Option<ProcessingInfo>,
}

impl LongTextAnalysis {
    fn from_map(map: &JsonMap) -> Result<Self, Error> {
        Ok(Self {
            overall_toxicity: decode::f64_or(map, "overall_toxicity", 0.0)?,
            max_toxicity: decode::f64_or(map, "max_toxicity", 0.0)?,
            top3_mean_toxicity: decode::f64_or(map, "top3_mean_toxicity", 0.0)?,
            decision_confidence: decode::f64_or(map, "decision_confidence", 0.0)?,
            signal_confidence: decode::f64_or(map, "signal_confidence", 0.0)?,
            sentences: decode::object_items(map, "sentences")?
                .into_iter()
                .map(SentenceAnalysis::from_map)
                .collect::<Result<_, _>>()?,
            highlights: decode::object_items(map, "highlights")?
                .into_iter()
                .map(LongTextHighlight::from_map)
                .collect::<Result<_, _>>()?,
            processing: decode::opt_object(map, "processing")?
                .map(ProcessingInfo::from_map)
                .transpose()?,
        })
    }
}

/// Decoded verdict for a single moderated input.
///
/// Built in one pass over the raw response body and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModerationResult {
    pub id: String,
    pub model: String,
    pub flagged: bool,
    pub categories: Categories,
    pub category_scores: CategoryScores,
    pub scores: SimplifiedScores,
    pub policy_decision: Option<PolicyDecision>,
    pub detected_phrases: Vec<DetectedPhrase>,
    pub long_text_analysis: Option<LongTextAnalysis>,
    /// Free-form abuse-signal mapping, passed through uninterpreted.
    pub abuse_signals: Option<serde_json::Map<String, Value>>,
    /// Verdict computed but not enforced (shadow mode).
    pub shadow_decision: Option<String>,
}

impl ModerationResult {
    /// Decode a response body.
    ///
    /// The service nests `flagged`/`categories`/`category_scores` either at
    /// the top level or inside a single-element `results` list; both shapes
    /// are accepted. The remaining fields are always read from the top-level
    /// object.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let top = decode::as_object(value, "moderation response")?;
        let item = match decode::field(top, "results").and_then(Value::as_array) {
            Some(results) if !results.is_empty() => {
                decode::as_object(&results[0], "`results` entry")?
            }
            _ => top,
        };

        // The service has emitted `detected_phrases` both at the top level
        // and inside the result item; prefer the top level.
        let detected_phrases = if decode::field(top, "detected_phrases").is_some() {
            decode::object_items(top, "detected_phrases")?
        } else {
            decode::object_items(item, "detected_phrases")?
        };

        Ok(Self {
            id: decode::str_or(top, "id", "")?,
            model: decode::str_or(top, "model", "")?,
            flagged: decode::bool_or(item, "flagged", false)?,
            categories: decode::opt_object(item, "categories")?
                .map(Categories::from_map)
                .transpose()?
                .unwrap_or_default(),
            category_scores: decode::opt_object(item, "category_scores")?
                .map(CategoryScores::from_map)
                .transpose()?
                .unwrap_or_default(),
            scores: decode::opt_object(top, "scores")?
                .map(SimplifiedScores::from_map)
                .transpose()?
                .unwrap_or_default(),
            policy_decision: decode::opt_object(top, "policy_decision")?
                .map(PolicyDecision::from_map)
                .transpose()?,
            detected_phrases: detected_phrases
                .into_iter()
                .map(DetectedPhrase::from_map)
                .collect::<Result<_, _>>()?,
            long_text_analysis: decode::opt_object(top, "long_text_analysis")?
                .map(LongTextAnalysis::from_map)
                .transpose()?,
            abuse_signals: decode::opt_object(top, "abuse_signals")?.cloned(),
            shadow_decision: decode::opt_str(top, "shadow_decision")?,
        })
    }

    /// True iff a policy decision is present and it is `BLOCK`.
    pub fn is_blocked(&self) -> bool {
        self.decision() == Some(Decision::Block)
    }

    /// True iff the raw `flagged` bit is set or the policy decision is `FLAG`.
    pub fn is_flagged(&self) -> bool {
        self.flagged || self.decision() == Some(Decision::Flag)
    }

    /// Neither blocked nor flagged. A result with no policy decision and
    /// `flagged == false` is allowed even without an explicit `ALLOW`.
    pub fn is_allowed(&self) -> bool {
        !self.is_blocked() && !self.is_flagged()
    }

    fn decision(&self) -> Option<Decision> {
        self.policy_decision.as_ref().map(|pd| pd.decision)
    }
}

/// Ordered results of a client-side batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchModerationResult {
    results: Vec<ModerationResult>,
}

impl BatchModerationResult {
    pub fn new(results: Vec<ModerationResult>) -> Self {
        Self { results }
    }

    /// Results in input order.
    pub fn results(&self) -> &[ModerationResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ModerationResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results with a `BLOCK` decision, in input order.
    pub fn blocked(&self) -> Vec<&ModerationResult> {
        self.results.iter().filter(|r| r.is_blocked()).collect()
    }

    /// Results that were blocked or flagged, in input order. Blocked results
    /// are always part of this subset.
    pub fn flagged(&self) -> Vec<&ModerationResult> {
        self.results
            .iter()
            .filter(|r| r.is_blocked() || r.is_flagged())
            .collect()
    }

    pub fn has_blocked(&self) -> bool {
        self.results.iter().any(ModerationResult::is_blocked)
    }
}

impl<'a> IntoIterator for &'a BatchModerationResult {
    type Item = &'a ModerationResult;
    type IntoIter = std::slice::Iter<'a, ModerationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
