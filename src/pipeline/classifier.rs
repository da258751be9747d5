//! Yes/no message classification and reply generation over an LLM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ClassifierError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

/// Output cap for yes/no questions.
const CLASSIFY_MAX_TOKENS: u32 = 3;

/// Classification must be deterministic.
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Output cap for generated replies.
const REPLY_MAX_TOKENS: u32 = 150;

const REPLY_TEMPERATURE: f32 = 0.2;

/// Reply generation gives up after this long and the caller falls back.
const REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Interpretation of a yes/no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Unparseable,
}

/// Parse a classifier answer.
///
/// Case-insensitive match on a leading "yes"/"no" word after trimming
/// whitespace and leading punctuation (`**Yes**`, `'No'`, `"yes."`). The
/// word must end at a non-alphanumeric character or the end of input, so
/// "Not sure" and "Nope" are `Unparseable`.
pub fn parse_answer(raw: &str) -> Answer {
    let normalized = raw
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if is_word_prefix(&normalized, "yes") {
        Answer::Yes
    } else if is_word_prefix(&normalized, "no") {
        Answer::No
    } else {
        Answer::Unparseable
    }
}

fn is_word_prefix(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

/// Typed classification capability used by the triage engine.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Ask a yes/no question about `text` under `system_prompt`.
    async fn classify(&self, system_prompt: &str, text: &str) -> Result<bool, ClassifierError>;

    /// Generate a reply body. Bounded in length and time.
    async fn generate_reply(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ClassifierError>;
}

/// `Classifier` backed by a chat-completion provider.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, system_prompt: &str, text: &str) -> Result<bool, ClassifierError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(text),
        ])
        .with_max_tokens(CLASSIFY_MAX_TOKENS)
        .with_temperature(CLASSIFY_TEMPERATURE);

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            answer = %response.content.trim(),
            "Classifier answered"
        );

        match parse_answer(&response.content) {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            Answer::Unparseable => Err(ClassifierError::Unparseable(response.content)),
        }
    }

    async fn generate_reply(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ClassifierError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ])
        .with_max_tokens(REPLY_MAX_TOKENS)
        .with_temperature(REPLY_TEMPERATURE)
        .with_timeout(REPLY_TIMEOUT);

        let response = self.llm.complete(request).await?;
        let body = response.content.trim();
        if body.is_empty() {
            return Err(ClassifierError::Empty);
        }
        Ok(body.to_string())
    }
}
