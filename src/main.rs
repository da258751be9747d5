use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::{info, warn};

use mail_triage::config::{
    DEFAULT_LLM_MODEL, DEFAULT_LLM_URL, DEFAULT_MAX_MESSAGES, DEFAULT_WINDOW_DAYS, PersonaConfig,
    RunConfig,
};
use mail_triage::llm::{self, LlmConfig};
use mail_triage::mail::GmailClient;
use mail_triage::mail::auth::TokenFile;
use mail_triage::pipeline::{ExternalEditor, LlmClassifier, Prompts, RelevanceRules, TriageEngine};

/// Client-wide HTTP timeout for mailbox and token calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "mail-triage", version)]
#[command(about = "Triage recent Gmail inbox messages and draft replies with a local LLM")]
struct Cli {
    /// Look back this many days
    #[arg(long, env = "TRIAGE_DAYS", default_value_t = DEFAULT_WINDOW_DAYS)]
    days: u32,

    /// Maximum number of messages to process
    #[arg(long, env = "TRIAGE_MAX", default_value_t = DEFAULT_MAX_MESSAGES)]
    max: u32,

    /// OpenAI-compatible endpoint; empty disables the classifier
    #[arg(long, env = "TRIAGE_LM_URL", default_value = DEFAULT_LLM_URL)]
    lm_url: String,

    /// Model name at the endpoint
    #[arg(long, env = "TRIAGE_LM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    lm_model: String,

    /// API key for the endpoint
    #[arg(long, env = "TRIAGE_LM_API_KEY", default_value = "lm-studio", hide_env_values = true)]
    lm_api_key: String,

    /// Treat every message as relevant
    #[arg(long)]
    no_filter: bool,

    /// Archive messages that are not relevant
    #[arg(long)]
    archive: bool,

    /// Draft replies for messages that need a response
    #[arg(long)]
    auto_draft: bool,

    /// Open each draft in $EDITOR before saving
    #[arg(long)]
    review: bool,

    /// Gmail authorized-user token file
    #[arg(long, env = "TRIAGE_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// Persona file (defaults to <config dir>/mail-triage/persona.toml)
    #[arg(long, env = "TRIAGE_PERSONA")]
    persona: Option<PathBuf>,
}

impl Cli {
    fn into_run_config(self) -> anyhow::Result<RunConfig> {
        let persona_path = match self.persona {
            Some(path) => path,
            None => PersonaConfig::default_path()
                .context("no config directory; pass --persona")?,
        };

        let lm_url = self.lm_url.trim();
        let llm = (!lm_url.is_empty()).then(|| LlmConfig {
            base_url: lm_url.to_string(),
            api_key: SecretString::from(self.lm_api_key),
            model: self.lm_model,
        });

        let config = RunConfig {
            window_days: self.days,
            max_messages: self.max,
            llm,
            filter_relevance: !self.no_filter,
            archive_irrelevant: self.archive,
            auto_draft: self.auto_draft,
            review: self.review,
            token_path: self.token,
            persona_path,
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_run_config()?;

    // ── Persona ─────────────────────────────────────────────────────────
    let persona = PersonaConfig::load(&config.persona_path)
        .with_context(|| format!("loading persona from {}", config.persona_path.display()))?;
    let prompts = Arc::new(Prompts::from_persona(&persona));
    let rules = RelevanceRules::from_criteria(&persona.criteria)
        .context("invalid relevance criteria in persona file")?;

    // ── Mailbox ─────────────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    let access_token = TokenFile::new(&config.token_path)
        .access_token(&http)
        .await
        .with_context(|| format!("authenticating with {}", config.token_path.display()))?;

    let gmail = GmailClient::connect(http, access_token)
        .await
        .context("connecting to Gmail")?;
    info!(account = %gmail.email_address(), "Connected to Gmail");

    // ── Classifier ──────────────────────────────────────────────────────
    let llm = match &config.llm {
        Some(llm_config) => llm::connect(llm_config).await?,
        None => {
            info!("No LLM endpoint configured, running without a classifier");
            None
        }
    };

    if config.auto_draft && llm.is_none() {
        warn!("--auto-draft has no effect without a reachable LLM endpoint");
    }

    let mut engine = TriageEngine::new(Arc::new(gmail), prompts, config.engine_config());
    if let Some(llm) = llm {
        engine = engine
            .with_classifier(Arc::new(LlmClassifier::new(llm)))
            .with_rules(rules);
    }
    if config.review {
        let editor = ExternalEditor::from_env().context("resolving $EDITOR")?;
        info!(editor = %editor.program(), "Reviewing drafts in editor");
        engine = engine.with_editor(Arc::new(editor));
    }

    // ── Run ─────────────────────────────────────────────────────────────
    let mut stdout = std::io::stdout();
    let summary = engine.run(&mut stdout).await.context("listing recent messages")?;

    write!(stdout, "{summary}")?;
    stdout.flush()?;
    Ok(())
}
