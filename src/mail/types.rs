//! Mailbox data types: fetched message metadata, drafts, senders.

use std::sync::LazyLock;

use mail_parser::MessageParser;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder subject for messages without a `Subject` header.
pub const NO_SUBJECT: &str = "(no subject)";

/// Parsed `From` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Display name, if the header carried one.
    pub name: Option<String>,
    /// Bare address (may be empty for malformed headers).
    pub address: String,
    /// The header value as received.
    pub raw: String,
}

impl Sender {
    /// Parse a `From` header value such as `"Alice Smith" <alice@example.com>`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        parse_with_mail_parser(raw).unwrap_or_else(|| parse_fallback(raw))
    }

    /// Name to greet the sender with: display name, else the address.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.address.is_empty() => &self.address,
            _ => &self.raw,
        }
    }
}

fn parse_with_mail_parser(raw: &str) -> Option<Sender> {
    let header = format!("From: {raw}\r\n\r\n");
    let message = MessageParser::default().parse_headers(header.as_bytes())?;
    let addr = match message.from()? {
        mail_parser::Address::List(addrs) => addrs.first()?,
        mail_parser::Address::Group(groups) => groups.first()?.addresses.first()?,
    };
    let address = addr.address.as_deref()?.trim().to_string();
    if !address.contains('@') {
        return None;
    }
    let name = addr
        .name
        .as_deref()
        .map(|n| n.trim().trim_matches('"').trim().to_string())
        .filter(|n| !n.is_empty());
    Some(Sender {
        name,
        address,
        raw: raw.to_string(),
    })
}

fn parse_fallback(raw: &str) -> Sender {
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if close > open => {
            let name = raw[..open].trim().trim_matches('"').trim();
            Sender {
                name: (!name.is_empty()).then(|| name.to_string()),
                address: raw[open + 1..close].trim().to_string(),
                raw: raw.to_string(),
            }
        }
        _ if raw.contains('@') => Sender {
            name: None,
            address: raw.to_string(),
            raw: raw.to_string(),
        },
        _ => Sender {
            name: (!raw.is_empty()).then(|| raw.to_string()),
            address: String::new(),
            raw: raw.to_string(),
        },
    }
}

/// Metadata of one inbox message. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMeta {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub sender: Sender,
    /// Short plain-text body excerpt.
    pub snippet: String,
    /// RFC 5322 `Message-ID` header, if present.
    pub message_id: Option<String>,
}

impl MessageMeta {
    /// Text handed to the classifier: the snippet, or the subject when the
    /// snippet is empty.
    pub fn classification_text(&self) -> &str {
        if self.snippet.trim().is_empty() {
            &self.subject
        } else {
            &self.snippet
        }
    }
}

/// An existing draft, as far as thread matching is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRef {
    pub draft_id: String,
    pub thread_id: Option<String>,
}

/// A reply draft to persist.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    /// Recipient, the original sender.
    pub to: Sender,
    pub subject: String,
    pub body: String,
    pub thread_id: Option<String>,
    /// `Message-ID` of the message being answered.
    pub in_reply_to: Option<String>,
}

impl DraftRequest {
    /// Build a reply to `message` with the given body.
    pub fn reply_to(message: &MessageMeta, body: String) -> Self {
        Self {
            to: message.sender.clone(),
            subject: reply_subject(&message.subject),
            body,
            thread_id: message.thread_id.clone(),
            in_reply_to: message.message_id.clone(),
        }
    }
}

/// `Re: <subject>`, without stacking prefixes.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"))
    {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);").unwrap());

/// Decode the HTML entities Gmail leaves in message snippets.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_with_quoted_name() {
        let sender = Sender::parse(r#""Alice Smith" <alice@example.com>"#);
        assert_eq!(sender.name.as_deref(), Some("Alice Smith"));
        assert_eq!(sender.address, "alice@example.com");
        assert_eq!(sender.display_name(), "Alice Smith");
    }

    #[test]
    fn sender_with_plain_name() {
        let sender = Sender::parse("Bob Jones <bob@example.com>");
        assert_eq!(sender.name.as_deref(), Some("Bob Jones"));
        assert_eq!(sender.address, "bob@example.com");
    }

    #[test]
    fn bare_address_greets_by_address() {
        let sender = Sender::parse("carol@example.com");
        assert_eq!(sender.name, None);
        assert_eq!(sender.address, "carol@example.com");
        assert_eq!(sender.display_name(), "carol@example.com");
    }

    #[test]
    fn fallback_keeps_raw_header() {
        let sender = parse_fallback("Dave <dave at example>");
        assert_eq!(sender.name.as_deref(), Some("Dave"));
        assert_eq!(sender.address, "dave at example");
        assert_eq!(sender.raw, "Dave <dave at example>");
    }

    #[test]
    fn sender_with_comment_name() {
        let sender = Sender::parse("alice@example.com (Alice Smith)");
        assert_eq!(sender.address, "alice@example.com");
    }

    #[test]
    fn sender_with_unquoted_comma_name() {
        let sender = Sender::parse("Smith, Alice <alice@example.com>");
        assert_eq!(sender.address, "alice@example.com");
    }

    #[test]
    fn empty_sender_display_name_is_empty() {
        let sender = Sender::parse("");
        assert_eq!(sender.display_name(), "");
    }

    #[test]
    fn classification_text_prefers_snippet() {
        let mut meta = MessageMeta {
            id: "m1".into(),
            thread_id: Some("t1".into()),
            subject: "Budget review".into(),
            sender: Sender::parse("alice@example.com"),
            snippet: "Can you send the numbers?".into(),
            message_id: None,
        };
        assert_eq!(meta.classification_text(), "Can you send the numbers?");
        meta.snippet = "   ".into();
        assert_eq!(meta.classification_text(), "Budget review");
    }

    #[test]
    fn reply_subject_prefixes_once() {
        assert_eq!(reply_subject("Lunch"), "Re: Lunch");
        assert_eq!(reply_subject("Re: Lunch"), "Re: Lunch");
        assert_eq!(reply_subject("RE: Lunch"), "RE: Lunch");
        assert_eq!(reply_subject("Reports"), "Re: Reports");
    }

    #[test]
    fn draft_request_threads_reply() {
        let meta = MessageMeta {
            id: "m1".into(),
            thread_id: Some("t1".into()),
            subject: "Offsite".into(),
            sender: Sender::parse("Alice <alice@example.com>"),
            snippet: "Are you coming?".into(),
            message_id: Some("<abc@mail.example.com>".into()),
        };
        let req = DraftRequest::reply_to(&meta, "Yes!".into());
        assert_eq!(req.to.address, "alice@example.com");
        assert_eq!(req.to.name.as_deref(), Some("Alice"));
        assert_eq!(req.subject, "Re: Offsite");
        assert_eq!(req.thread_id.as_deref(), Some("t1"));
        assert_eq!(req.in_reply_to.as_deref(), Some("<abc@mail.example.com>"));
    }

    #[test]
    fn decodes_snippet_entities() {
        assert_eq!(
            decode_entities("Don&#39;t forget &amp; bring &quot;docs&quot; &lt;3"),
            "Don't forget & bring \"docs\" <3"
        );
        assert_eq!(decode_entities("caf&#xE9;"), "café");
        assert_eq!(decode_entities("&bogus; stays"), "&bogus; stays");
    }
}
