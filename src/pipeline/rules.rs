//! Relevance rules evaluated before the classifier.
//!
//! Built from the persona's `[criteria]` table:
//! - skip domains → not relevant
//! - important domains → relevant
//! - important keywords in subject or snippet → relevant
//!
//! A match decides relevance without a classifier call. No match defers to
//! the classifier.

use regex::Regex;
use tracing::debug;

use crate::config::RelevanceCriteria;
use crate::mail::MessageMeta;

/// Which part of a message a rule matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleField {
    /// The sender's address domain.
    SenderDomain,
    /// Subject and snippet.
    Content,
}

/// Verdict of a matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    NotRelevant { reason: String },
    Relevant { reason: String },
}

impl RuleVerdict {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Self::Relevant { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::NotRelevant { reason } | Self::Relevant { reason } => reason,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    field: RuleField,
    reason: String,
}

impl Rule {
    fn matches(&self, message: &MessageMeta) -> bool {
        match self.field {
            RuleField::SenderDomain => sender_domain(message)
                .is_some_and(|domain| self.regex.is_match(domain)),
            RuleField::Content => {
                self.regex.is_match(&message.subject) || self.regex.is_match(&message.snippet)
            }
        }
    }
}

/// Ordered relevance rules. Skip rules win over important rules.
#[derive(Debug, Clone, Default)]
pub struct RelevanceRules {
    skip_rules: Vec<Rule>,
    important_rules: Vec<Rule>,
}

impl RelevanceRules {
    /// No rules: every message defers to the classifier.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_criteria(criteria: &RelevanceCriteria) -> Result<Self, regex::Error> {
        let mut rules = Self::empty();
        for domain in &criteria.skip_domains {
            rules.add_skip_domain(domain)?;
        }
        for domain in &criteria.important_domains {
            rules.add_important_domain(domain)?;
        }
        for keyword in &criteria.important_keywords {
            rules.add_important_keyword(keyword)?;
        }
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.skip_rules.is_empty() && self.important_rules.is_empty()
    }

    /// Senders at `domain` or any subdomain are never relevant.
    pub fn add_skip_domain(&mut self, domain: &str) -> Result<(), regex::Error> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Ok(());
        }
        self.skip_rules.push(Rule {
            regex: domain_regex(domain)?,
            field: RuleField::SenderDomain,
            reason: format!("skip domain {domain}"),
        });
        Ok(())
    }

    /// Senders at `domain` or any subdomain are always relevant.
    pub fn add_important_domain(&mut self, domain: &str) -> Result<(), regex::Error> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Ok(());
        }
        self.important_rules.push(Rule {
            regex: domain_regex(domain)?,
            field: RuleField::SenderDomain,
            reason: format!("important domain {domain}"),
        });
        Ok(())
    }

    /// Messages mentioning `keyword` as a whole word are relevant. Keywords
    /// that start or end in punctuation (`C++`, `.NET`) are not anchored on
    /// that side.
    pub fn add_important_keyword(&mut self, keyword: &str) -> Result<(), regex::Error> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(());
        }
        self.important_rules.push(Rule {
            regex: keyword_regex(keyword)?,
            field: RuleField::Content,
            reason: format!("important keyword {keyword:?}"),
        });
        Ok(())
    }

    /// Returns a verdict if any rule matches, `None` to defer.
    pub fn evaluate(&self, message: &MessageMeta) -> Option<RuleVerdict> {
        if let Some(rule) = self.skip_rules.iter().find(|r| r.matches(message)) {
            debug!(id = %message.id, reason = %rule.reason, "Message matched skip rule");
            return Some(RuleVerdict::NotRelevant {
                reason: rule.reason.clone(),
            });
        }

        if let Some(rule) = self.important_rules.iter().find(|r| r.matches(message)) {
            debug!(id = %message.id, reason = %rule.reason, "Message matched important rule");
            return Some(RuleVerdict::Relevant {
                reason: rule.reason.clone(),
            });
        }

        None
    }
}

fn normalize_domain(domain: &str) -> &str {
    domain.trim().trim_start_matches('@')
}

fn domain_regex(domain: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)(^|\.){}$", regex::escape(domain)))
}

fn keyword_regex(keyword: &str) -> Result<Regex, regex::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let boundary = |c: Option<char>| if c.is_some_and(is_word) { r"\b" } else { "" };
    Regex::new(&format!(
        "(?i){}{}{}",
        boundary(keyword.chars().next()),
        regex::escape(keyword),
        boundary(keyword.chars().next_back()),
    ))
}

fn sender_domain(message: &MessageMeta) -> Option<&str> {
    message
        .sender
        .address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::Sender;

    fn make_message(from: &str, subject: &str, snippet: &str) -> MessageMeta {
        MessageMeta {
            id: "test-1".into(),
            thread_id: Some("t1".into()),
            subject: subject.into(),
            sender: Sender::parse(from),
            snippet: snippet.into(),
            message_id: None,
        }
    }

    fn rules() -> RelevanceRules {
        RelevanceRules::from_criteria(&RelevanceCriteria {
            important_keywords: vec!["urgent".into(), "deadline".into()],
            important_domains: vec!["@university.edu".into()],
            skip_domains: vec!["newsletter.com".into()],
        })
        .unwrap()
    }

    #[test]
    fn skip_domain_not_relevant() {
        let msg = make_message("News <weekly@newsletter.com>", "This week", "Top stories");
        assert!(matches!(
            rules().evaluate(&msg),
            Some(RuleVerdict::NotRelevant { .. })
        ));
    }

    #[test]
    fn skip_domain_covers_subdomains() {
        let msg = make_message("promo@mail.newsletter.com", "Sale", "50% off");
        assert!(matches!(
            rules().evaluate(&msg),
            Some(RuleVerdict::NotRelevant { .. })
        ));
    }

    #[test]
    fn domain_suffix_is_not_a_subdomain() {
        let msg = make_message("bob@notnewsletter.com", "Hi", "Hello");
        assert!(rules().evaluate(&msg).is_none());
    }

    #[test]
    fn important_domain_relevant() {
        let msg = make_message("Dean <dean@cs.University.edu>", "Faculty meeting", "Agenda");
        let verdict = rules().evaluate(&msg).unwrap();
        assert!(verdict.is_relevant());
        assert_eq!(verdict.reason(), "important domain university.edu");
    }

    #[test]
    fn keyword_whole_word_in_subject_or_snippet() {
        let rules = rules();
        let in_subject = make_message("a@example.com", "URGENT: server down", "");
        let in_snippet = make_message("a@example.com", "Status", "the deadline is Friday");
        let partial = make_message("a@example.com", "Deadlines page", "nonurgent stuff");
        assert!(rules.evaluate(&in_subject).unwrap().is_relevant());
        assert!(rules.evaluate(&in_snippet).unwrap().is_relevant());
        assert!(rules.evaluate(&partial).is_none());
    }

    #[test]
    fn skip_rules_checked_before_important_rules() {
        let msg = make_message("deals@newsletter.com", "Urgent: last chance", "");
        assert!(matches!(
            rules().evaluate(&msg),
            Some(RuleVerdict::NotRelevant { .. })
        ));
    }

    #[test]
    fn empty_rules_defer_everything() {
        let rules = RelevanceRules::empty();
        assert!(rules.is_empty());
        let msg = make_message("deals@newsletter.com", "Urgent", "");
        assert!(rules.evaluate(&msg).is_none());
    }

    #[test]
    fn blank_entries_ignored() {
        let rules = RelevanceRules::from_criteria(&RelevanceCriteria {
            important_keywords: vec!["  ".into()],
            important_domains: vec![],
            skip_domains: vec!["@".into()],
        })
        .unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn keyword_is_matched_literally() {
        let mut rules = RelevanceRules::empty();
        rules.add_important_keyword("on-call").unwrap();
        rules.add_important_keyword("v1.2").unwrap();
        let on_call = make_message("a@example.com", "Rota", "Who is on-call tonight?");
        let version = make_message("a@example.com", "Release", "v102 is out");
        assert!(rules.evaluate(&on_call).is_some());
        assert!(rules.evaluate(&version).is_none());
    }

    #[test]
    fn punctuated_keywords_match() {
        let mut rules = RelevanceRules::empty();
        rules.add_important_keyword("C++").unwrap();
        rules.add_important_keyword(".NET").unwrap();
        let cpp = make_message("a@example.com", "Hiring", "Senior C++ engineer wanted");
        let dotnet = make_message("a@example.com", "Migration", "Moving the API to .NET 8");
        assert!(rules.evaluate(&cpp).is_some());
        assert!(rules.evaluate(&dotnet).is_some());
    }

    #[test]
    fn word_side_of_punctuated_keyword_is_still_anchored() {
        let mut rules = RelevanceRules::empty();
        rules.add_important_keyword("C++").unwrap();
        rules.add_important_keyword(".NET").unwrap();
        let message = make_message("a@example.com", "Misc", "ObjC++ and ASP.NETCore notes");
        assert!(rules.evaluate(&message).is_none());
    }
}
