//! mail-triage: classify recent inbox mail and draft replies.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
