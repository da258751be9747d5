//! LLM integration for mail-triage.
//!
//! Talks to any OpenAI-compatible chat completions endpoint. The usual
//! target is a local LM Studio server (`http://localhost:1234/v1`).

pub mod openai_compat;
pub mod provider;

pub use openai_compat::OpenAiCompatProvider;
pub use provider::*;

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create a provider and check that its endpoint is reachable.
///
/// Returns `Ok(None)` when the endpoint cannot be reached. Callers run
/// without a classifier in that case. A configured model that the endpoint
/// does not list only produces a warning.
pub async fn connect(config: &LlmConfig) -> Result<Option<Arc<dyn LlmProvider>>, LlmError> {
    let provider = OpenAiCompatProvider::new(&config.base_url, config.api_key.clone(), &config.model)?;

    match provider.list_models().await {
        Ok(models) => {
            info!(models = ?models, "Local LLM models loaded");
            if !models.iter().any(|m| m == &config.model) {
                warn!(
                    model = %config.model,
                    "Configured model not found in loaded models"
                );
            }
            Ok(Some(Arc::new(provider)))
        }
        Err(e) => {
            warn!(
                url = %config.base_url,
                error = %e,
                "Could not connect to LLM endpoint, continuing without relevance filtering"
            );
            Ok(None)
        }
    }
}
