//! Configuration types.
//!
//! Two layers: the per-user persona file (TOML) that feeds prompt and
//! signature text plus the optional relevance criteria, and the per-run
//! `RunConfig` assembled by the binary from CLI flags and environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Default lookback window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 1;

/// Default number of messages to process.
pub const DEFAULT_MAX_MESSAGES: u32 = 5;

/// Default OpenAI-compatible endpoint (LM Studio).
pub const DEFAULT_LLM_URL: &str = "http://localhost:1234/v1";

/// Default model name at the endpoint.
pub const DEFAULT_LLM_MODEL: &str = "google/gemma-3n-e4b";

/// Personal details and prompt customisation, loaded from `persona.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaConfig {
    /// Full name the assistant writes on behalf of.
    pub user_name: String,
    /// Phone number used in the default signature.
    #[serde(default)]
    pub user_phone: String,
    /// Sign-off line. Defaults to `"<user_name>, <user_phone>"`.
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub prompts: PromptOverrides,
    #[serde(default)]
    pub criteria: RelevanceCriteria,
}

/// Replacements for the built-in system prompts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptOverrides {
    pub reply: Option<String>,
    pub relevance: Option<String>,
    pub response: Option<String>,
}

/// Fast relevance rules evaluated before the classifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelevanceCriteria {
    /// Whole-word keywords in subject or snippet that mark a message relevant.
    #[serde(default)]
    pub important_keywords: Vec<String>,
    /// Sender domains that are always relevant.
    #[serde(default)]
    pub important_domains: Vec<String>,
    /// Sender domains that are never relevant.
    #[serde(default)]
    pub skip_domains: Vec<String>,
}

impl PersonaConfig {
    /// `<config dir>/mail-triage/persona.toml`, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mail-triage").join("persona.toml"))
    }

    /// Load and validate a persona file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingRequired {
                key: format!("persona file {}", path.display()),
                hint: "Copy persona.example.toml and fill in your details.".to_string(),
            });
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let persona: Self =
            toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        persona.validate()?;
        Ok(persona)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.user_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "user_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Sign-off used by both AI prompts and template replies.
    pub fn signature(&self) -> String {
        match self.signature.as_deref() {
            Some(sig) if !sig.trim().is_empty() => sig.to_string(),
            _ if self.user_phone.trim().is_empty() => self.user_name.clone(),
            _ => format!("{}, {}", self.user_name, self.user_phone),
        }
    }
}

/// Settings for one triage run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Look back this many days.
    pub window_days: u32,
    /// Max messages to process.
    pub max_messages: u32,
    /// Classifier endpoint. `None` runs without a classifier.
    pub llm: Option<LlmConfig>,
    /// Classify relevance (unset by `--no-filter`).
    pub filter_relevance: bool,
    /// Archive messages judged not relevant.
    pub archive_irrelevant: bool,
    /// Draft replies for messages that need a response.
    pub auto_draft: bool,
    /// Open each draft in `$EDITOR` before saving.
    pub review: bool,
    /// Gmail authorized-user token file.
    pub token_path: PathBuf,
    /// Persona TOML file.
    pub persona_path: PathBuf,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "days".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_messages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(ref llm) = self.llm
            && llm.model.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                key: "lm-model".to_string(),
                message: "must not be empty when an LLM URL is set".to_string(),
            });
        }
        Ok(())
    }

    /// The subset of settings the triage engine acts on.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window_days: self.window_days,
            max_messages: self.max_messages,
            filter_relevance: self.filter_relevance,
            archive_irrelevant: self.archive_irrelevant,
            auto_draft: self.auto_draft,
        }
    }
}

/// Validated, immutable settings handed to `TriageEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub window_days: u32,
    pub max_messages: u32,
    pub filter_relevance: bool,
    pub archive_irrelevant: bool,
    pub auto_draft: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            max_messages: DEFAULT_MAX_MESSAGES,
            filter_relevance: true,
            archive_irrelevant: false,
            auto_draft: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_config() -> RunConfig {
        RunConfig {
            window_days: 1,
            max_messages: 5,
            llm: None,
            filter_relevance: true,
            archive_irrelevant: false,
            auto_draft: false,
            review: false,
            token_path: PathBuf::from("token.json"),
            persona_path: PathBuf::from("persona.toml"),
        }
    }

    #[test]
    fn minimal_persona() {
        let persona = PersonaConfig::from_toml_str(
            r#"
            user_name = "Jane Doe"
            user_phone = "555-0100"
            "#,
        )
        .unwrap();
        assert_eq!(persona.signature(), "Jane Doe, 555-0100");
        assert!(persona.prompts.reply.is_none());
        assert!(persona.criteria.skip_domains.is_empty());
    }

    #[test]
    fn persona_with_criteria_and_overrides() {
        let persona = PersonaConfig::from_toml_str(
            r#"
            user_name = "Jane Doe"
            signature = "Jane"

            [prompts]
            reply = "Write a short reply."

            [criteria]
            important_keywords = ["urgent", "deadline"]
            skip_domains = ["newsletter.com"]
            "#,
        )
        .unwrap();
        assert_eq!(persona.signature(), "Jane");
        assert_eq!(persona.prompts.reply.as_deref(), Some("Write a short reply."));
        assert_eq!(persona.criteria.important_keywords.len(), 2);
        assert_eq!(persona.criteria.skip_domains, vec!["newsletter.com"]);
    }

    #[test]
    fn signature_without_phone() {
        let persona = PersonaConfig::from_toml_str(r#"user_name = "Jane Doe""#).unwrap();
        assert_eq!(persona.signature(), "Jane Doe");
    }

    #[test]
    fn empty_user_name_rejected() {
        let err = PersonaConfig::from_toml_str(r#"user_name = "  ""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = PersonaConfig::from_toml_str("user_name = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_persona_file_has_hint() {
        let dir = tempfile::tempdir().unwrap();
        let err = PersonaConfig::load(&dir.path().join("persona.toml")).unwrap_err();
        assert!(err.to_string().contains("persona.example.toml"));
    }

    #[test]
    fn persona_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.toml");
        std::fs::write(&path, "user_name = \"Jane Doe\"\nuser_phone = \"1\"\n").unwrap();
        let persona = PersonaConfig::load(&path).unwrap();
        assert_eq!(persona.user_name, "Jane Doe");
    }

    #[test]
    fn run_config_rejects_zero_window() {
        let mut config = run_config();
        config.window_days = 0;
        assert!(config.validate().is_err());
        config.window_days = 3;
        config.max_messages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_config_mirrors_flags() {
        let mut config = run_config();
        config.filter_relevance = false;
        config.archive_irrelevant = true;
        config.auto_draft = true;
        let engine = config.engine_config();
        assert!(!engine.filter_relevance);
        assert!(engine.archive_irrelevant);
        assert!(engine.auto_draft);
        assert_eq!(engine.max_messages, 5);
    }
}
