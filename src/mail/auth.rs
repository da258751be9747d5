//! Gmail OAuth2 token handling.
//!
//! Reads the authorized-user token file written by Google's installed-app
//! flow and refreshes the access token when it is missing or about to
//! expire. The interactive consent flow itself is not performed here: the
//! token file has to exist already.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AuthError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh when the token expires within this many seconds.
const EXPIRY_SKEW_SECS: i64 = 60;

/// On-disk authorized-user credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Fields we don't interpret (scopes, account, universe_domain, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// Parsed expiry timestamp, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }

    /// Whether the access token must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().is_none_or(str::is_empty) {
            return true;
        }
        match self.expires_at() {
            Some(expiry) => expiry - chrono::Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            None => false,
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A token file on disk.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<StoredToken, AuthError> {
        let unreadable = |reason: String| AuthError::TokenUnreadable {
            path: self.path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(&self.path).map_err(|e| unreadable(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))
    }

    /// Write the token back. On unix the file is restricted to the owner,
    /// including a pre-existing file with wider permissions.
    fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let persist = |e: std::io::Error| AuthError::Persist(e.to_string());
        let json =
            serde_json::to_string_pretty(token).map_err(|e| AuthError::Persist(e.to_string()))?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(persist)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(persist)?;
        }
        file.write_all(json.as_bytes()).map_err(persist)
    }

    /// Return a valid access token, refreshing and persisting it if needed.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<SecretString, AuthError> {
        let mut stored = self.load()?;

        if !stored.needs_refresh(Utc::now()) {
            debug!(path = %self.path.display(), "Using cached access token");
            if let Some(token) = stored.token.clone() {
                return Ok(SecretString::from(token));
            }
        }

        let refresh_token = stored
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::NoCredentials {
                path: self.path.display().to_string(),
            })?;

        let refreshed = refresh(http, &stored, &refresh_token).await?;
        let access = refreshed.access_token.clone();
        stored.token = Some(refreshed.access_token);
        stored.expiry = refreshed
            .expires_in
            .map(|secs| (Utc::now() + chrono::Duration::seconds(secs)).to_rfc3339());
        self.save(&stored)?;

        info!(path = %self.path.display(), "Refreshed Gmail access token");
        Ok(SecretString::from(access))
    }
}

async fn refresh(
    http: &reqwest::Client,
    stored: &StoredToken,
    refresh_token: &str,
) -> Result<RefreshResponse, AuthError> {
    let client_id = stored.client_id.as_deref().unwrap_or_default();
    let client_secret = stored.client_secret.as_deref().unwrap_or_default();
    let token_uri = stored.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);

    let params = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];

    let response = http
        .post(token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::RefreshFailed(format!("{status}: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::RefreshFailed(format!("invalid token response: {e}")))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn token(json: &str) -> StoredToken {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_google_authorized_user_file() {
        let stored = token(
            r#"{
                "token": "ya29.abc",
                "refresh_token": "1//xyz",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "secret",
                "scopes": ["https://www.googleapis.com/auth/gmail.modify"],
                "expiry": "2030-01-01T00:00:00.000000Z"
            }"#,
        );
        assert_eq!(stored.token.as_deref(), Some("ya29.abc"));
        assert!(stored.extra.contains_key("scopes"));
        assert!(stored.expires_at().is_some());
    }

    #[test]
    fn naive_expiry_treated_as_utc() {
        let stored = token(r#"{"token": "t", "expiry": "2030-06-01T12:30:00.123456"}"#);
        let expiry = stored.expires_at().unwrap();
        assert_eq!(expiry.to_rfc3339(), "2030-06-01T12:30:00.123456+00:00");
    }

    #[test]
    fn refresh_needed_when_expired_or_missing() {
        let now = Utc::now();
        let fresh = token(r#"{"token": "t", "expiry": "2999-01-01T00:00:00Z"}"#);
        assert!(!fresh.needs_refresh(now));

        let expired = token(r#"{"token": "t", "expiry": "2000-01-01T00:00:00Z"}"#);
        assert!(expired.needs_refresh(now));

        let missing = token(r#"{"refresh_token": "r"}"#);
        assert!(missing.needs_refresh(now));

        let no_expiry = token(r#"{"token": "t"}"#);
        assert!(!no_expiry.needs_refresh(now));
    }

    #[test]
    fn refresh_needed_within_skew() {
        let now = Utc::now();
        let soon = StoredToken {
            token: Some("t".into()),
            refresh_token: None,
            client_id: None,
            client_secret: None,
            token_uri: None,
            expiry: Some((now + chrono::Duration::seconds(30)).to_rfc3339()),
            extra: serde_json::Map::new(),
        };
        assert!(soon.needs_refresh(now));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let stored = token(r#"{"token": "t", "account": "", "universe_domain": "googleapis.com"}"#);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["universe_domain"], "googleapis.com");
        assert!(json.get("refresh_token").is_none());
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = TokenFile::new(dir.path().join("token.json"));
        let err = file.access_token(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenUnreadable { .. }));
    }

    #[tokio::test]
    async fn cached_token_returned_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "ya29.cached", "expiry": "2999-01-01T00:00:00Z"}"#)
            .unwrap();
        let token = TokenFile::new(&path)
            .access_token(&reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "ya29.cached");
    }

    #[tokio::test]
    async fn expired_without_refresh_token_has_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "old", "expiry": "2000-01-01T00:00:00Z"}"#).unwrap();
        let err = TokenFile::new(&path)
            .access_token(&reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn saved_token_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let file = TokenFile::new(&path);
        file.save(&token(r#"{"token": "ya29.new", "refresh_token": "1//r"}"#))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let saved = file.load().unwrap();
        assert_eq!(saved.token.as_deref(), Some("ya29.new"));
    }

    #[cfg(unix)]
    #[test]
    fn new_token_file_is_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        TokenFile::new(&path).save(&token(r#"{"token": "t"}"#)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
