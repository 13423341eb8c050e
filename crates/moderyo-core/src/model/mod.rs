//! Typed entities decoded from the moderation API's wire payloads.
//!
//! Decoding is a single pure pass over untyped JSON: missing keys produce
//! documented defaults, optional substructures decode to `None` rather than
//! zero-valued stand-ins, and list order is preserved throughout.

pub mod categories;
pub(crate) mod decode;
pub mod result;

pub use categories::{Categories, CategoryScores, ALL_CATEGORIES};
pub use result::{
    BatchModerationResult, Decision, DetectedPhrase, Highlight, LongTextAnalysis,
    LongTextHighlight, ModerationResult, PolicyDecision, ProcessingInfo, SentenceAnalysis,
    SimplifiedScores, TriggeredRule,
};
