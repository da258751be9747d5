//! Interactive draft review in an external editor.

use std::io::Write;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::EditorError;

/// Editor used when `$EDITOR` is unset.
const FALLBACK_EDITOR: &str = "vi";

/// Lets the user revise a draft body before it is saved.
#[async_trait]
pub trait DraftEditor: Send + Sync {
    /// Return the revised body.
    async fn edit(&self, body: &str) -> Result<String, EditorError>;
}

/// Opens the body in a temp file with an external command and reads it back.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    program: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `$EDITOR` split on whitespace, or `vi`.
    pub fn from_env() -> Result<Self, EditorError> {
        let command = std::env::var("EDITOR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_EDITOR.to_string());
        Self::parse(&command)
    }

    fn parse(command: &str) -> Result<Self, EditorError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(EditorError::NoCommand)?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl DraftEditor for ExternalEditor {
    async fn edit(&self, body: &str) -> Result<String, EditorError> {
        let mut file = tempfile::Builder::new()
            .prefix("draft-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(body.as_bytes())?;
        file.flush()?;

        debug!(editor = %self.program, path = %file.path().display(), "Opening draft in editor");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .status()
            .await?;

        if !status.success() {
            return Err(EditorError::ExitStatus {
                command: self.program.clone(),
                status: status.to_string(),
            });
        }

        Ok(tokio::fs::read_to_string(file.path()).await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_arguments() {
        let editor = ExternalEditor::parse("code --wait").unwrap();
        assert_eq!(editor.program(), "code");
        assert_eq!(editor.args, vec!["--wait"]);
    }

    #[test]
    fn parse_rejects_blank_command() {
        assert!(matches!(
            ExternalEditor::parse("   "),
            Err(EditorError::NoCommand)
        ));
    }

    #[tokio::test]
    async fn untouched_file_returns_original_body() {
        let editor = ExternalEditor::new("true", vec![]);
        let body = editor.edit("Hi Alice,\n\nSounds good.").await.unwrap();
        assert_eq!(body, "Hi Alice,\n\nSounds good.");
    }

    #[tokio::test]
    async fn edited_file_is_read_back() {
        let editor = ExternalEditor::new(
            "sh",
            vec!["-c".into(), "printf 'Revised body' > \"$0\"".into()],
        );
        assert_eq!(editor.edit("original").await.unwrap(), "Revised body");
    }

    #[tokio::test]
    async fn failing_editor_is_an_error() {
        let editor = ExternalEditor::new("false", vec![]);
        assert!(matches!(
            editor.edit("body").await,
            Err(EditorError::ExitStatus { .. })
        ));
    }
}
