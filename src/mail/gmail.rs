//! Gmail v1 REST API client.

use async_trait::async_trait;
use base64::Engine;
use lettre::message::Mailbox as Recipient;
use lettre::message::header::ContentType;
use lettre::{Address, Message};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::MailError;
use crate::mail::Mailbox;
use crate::mail::types::{
    DraftRef, DraftRequest, MessageMeta, NO_SUBJECT, Sender, decode_entities,
};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const INBOX_LABEL: &str = "INBOX";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(rename = "emailAddress")]
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftList {
    #[serde(default)]
    drafts: Vec<RawDraft>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    id: String,
    #[serde(default)]
    message: Option<RawDraftMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraftMessage {
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedDraft {
    id: String,
}

impl RawMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    fn into_meta(self) -> MessageMeta {
        let subject = self
            .header("Subject")
            .map(str::to_string)
            .unwrap_or_else(|| NO_SUBJECT.to_string());
        let sender = Sender::parse(self.header("From").unwrap_or_default());
        let message_id = self.header("Message-ID").map(str::to_string);
        MessageMeta {
            snippet: decode_entities(&self.snippet),
            id: self.id,
            thread_id: self.thread_id,
            subject,
            sender,
            message_id,
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Gmail API client authenticated as one user.
pub struct GmailClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
    /// The account's own address, used as the draft `From`.
    email_address: String,
}

impl GmailClient {
    /// Create a client and look up the account's address.
    pub async fn connect(http: Client, access_token: SecretString) -> Result<Self, MailError> {
        Self::connect_at(http, access_token, GMAIL_API_BASE).await
    }

    /// Like `connect`, against a different API base URL.
    pub async fn connect_at(
        http: Client,
        access_token: SecretString,
        base_url: &str,
    ) -> Result<Self, MailError> {
        let mut client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            email_address: String::new(),
        };
        let profile: Profile = client
            .send_json("profile", client.get("/profile"))
            .await?;
        client.email_address = profile.email_address;
        Ok(client)
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(self.access_token.expose_secret())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.access_token.expose_secret())
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, MailError> {
        let response = request.send().await.map_err(|e| MailError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, MailError> {
        let response = self.send(endpoint, request).await?;
        response.json().await.map_err(|e| MailError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_recent(&self, window_days: u32, limit: u32) -> Result<Vec<String>, MailError> {
        let query = format!("newer_than:{window_days}d");
        let request = self.get("/messages").query(&[
            ("labelIds", INBOX_LABEL),
            ("q", query.as_str()),
            ("maxResults", limit.to_string().as_str()),
        ]);
        let list: MessageList = self.send_json("messages.list", request).await?;
        debug!(count = list.messages.len(), query = %query, "Listed recent messages");
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<MessageMeta, MailError> {
        let request = self.get(&format!("/messages/{id}")).query(&[
            ("format", "metadata"),
            ("metadataHeaders", "Subject"),
            ("metadataHeaders", "From"),
            ("metadataHeaders", "Message-ID"),
        ]);
        let raw: RawMessage = self.send_json("messages.get", request).await?;
        Ok(raw.into_meta())
    }

    async fn archive(&self, id: &str) -> Result<(), MailError> {
        let request = self
            .post(&format!("/messages/{id}/modify"))
            .json(&serde_json::json!({ "removeLabelIds": [INBOX_LABEL] }));
        self.send("messages.modify", request).await?;
        Ok(())
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRef>, MailError> {
        let mut drafts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.get("/drafts");
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: DraftList = self.send_json("drafts.list", request).await?;
            drafts.extend(page.drafts.into_iter().map(|d| DraftRef {
                draft_id: d.id,
                thread_id: d.message.and_then(|m| m.thread_id),
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(drafts)
    }

    async fn create_draft(&self, draft: &DraftRequest) -> Result<String, MailError> {
        let raw = encode_raw(&build_mime(&self.email_address, draft)?);

        let mut message = serde_json::json!({ "raw": raw });
        if let Some(ref thread_id) = draft.thread_id {
            message["threadId"] = serde_json::Value::String(thread_id.clone());
        }

        let request = self
            .post("/drafts")
            .json(&serde_json::json!({ "message": message }));
        let created: CreatedDraft = self.send_json("drafts.create", request).await?;
        Ok(created.id)
    }
}

// ── MIME construction ───────────────────────────────────────────────

/// Build the RFC 5322 bytes of a plain-text reply draft.
pub fn build_mime(from: &str, draft: &DraftRequest) -> Result<Vec<u8>, MailError> {
    let from = from
        .parse::<Recipient>()
        .map_err(|e| MailError::DraftBuild(format!("Invalid from address {from:?}: {e}")))?;
    let to = recipient(&draft.to)?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(draft.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    if let Some(ref message_id) = draft.in_reply_to {
        builder = builder
            .in_reply_to(message_id.clone())
            .references(message_id.clone());
    }

    let message = builder
        .body(draft.body.clone())
        .map_err(|e| MailError::DraftBuild(e.to_string()))?;
    Ok(message.formatted())
}

/// The parsed sender as a lettre mailbox. Only the bare address has to be
/// valid; the display name is re-encoded by lettre.
fn recipient(sender: &Sender) -> Result<Recipient, MailError> {
    let address = sender.address.parse::<Address>().map_err(|e| {
        MailError::DraftBuild(format!("Invalid recipient {:?}: {e}", sender.raw))
    })?;
    Ok(Recipient::new(sender.name.clone(), address))
}

/// Gmail's `raw` field: URL-safe base64 of the whole message.
pub fn encode_raw(mime: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(mime)
}
