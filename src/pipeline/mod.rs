//! Triage pipeline.
//!
//! Every fetched message flows through:
//! 1. `RelevanceRules::evaluate()`: persona criteria, no LLM
//! 2. `Classifier::classify()`: relevance, then response need
//! 3. `TriageEngine`: archive, keep, skip or draft a reply
//!
//! Prompt text lives in an immutable `Prompts` built from the persona.

pub mod classifier;
pub mod editor;
pub mod engine;
pub mod prompts;
pub mod rules;
pub mod types;

pub use classifier::{Answer, Classifier, LlmClassifier, parse_answer};
pub use editor::{DraftEditor, ExternalEditor};
pub use engine::TriageEngine;
pub use prompts::Prompts;
pub use rules::{RelevanceRules, RuleVerdict};
pub use types::{Decision, DraftSource, RunSummary, TriageAction};
