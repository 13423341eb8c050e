//! Client SDK for the Moderyo content moderation API.
//!
//! The crate is a stateless request/response transformer: it builds the wire
//! request, executes it with bounded retry and backoff, classifies failures
//! into a closed error taxonomy, and decodes the heterogeneous JSON response
//! into a typed, decision-ready [`ModerationResult`].

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod transport;

pub use client::Client;
pub use config::{Config, ConfigBuilder};
pub use error::Error;
pub use model::{
    BatchModerationResult, Categories, CategoryScores, Decision, DetectedPhrase, Highlight,
    LongTextAnalysis, LongTextHighlight, ModerationResult, PolicyDecision, ProcessingInfo,
    SentenceAnalysis, SimplifiedScores, TriggeredRule, ALL_CATEGORIES,
};
pub use pipeline::ModerationOptions;
pub use transport::{HttpTransport, RawResponse, Transport};

/// SDK version, also reported in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
