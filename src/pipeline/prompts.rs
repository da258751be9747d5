//! Prompt construction.
//!
//! All prompt text is derived once from the persona and carried by an
//! immutable `Prompts` value that the engine borrows for the whole run.

use crate::config::PersonaConfig;
use crate::mail::MessageMeta;

/// System prompts and reply text for one user.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub persona: String,
    pub reply_system: String,
    pub relevance_system: String,
    pub response_system: String,
    pub signature: String,
}

impl Prompts {
    pub fn from_persona(persona: &PersonaConfig) -> Self {
        let name = persona.user_name.as_str();
        let signature = persona.signature();
        let assistant = format!("You are {name}'s email assistant.");

        let reply_system = persona
            .prompts
            .reply
            .clone()
            .unwrap_or_else(|| default_reply_prompt(&assistant, &signature));
        let relevance_system = persona
            .prompts
            .relevance
            .clone()
            .unwrap_or_else(|| default_relevance_prompt(name));
        let response_system = persona
            .prompts
            .response
            .clone()
            .unwrap_or_else(|| default_response_prompt(name));

        Self {
            persona: assistant,
            reply_system,
            relevance_system,
            response_system,
            signature,
        }
    }

    /// Deterministic reply used when AI generation is unavailable or fails.
    pub fn template_reply(&self, sender_name: &str, subject: &str) -> String {
        format!(
            "Hi {sender_name},\n\n\
             Thanks for your message about '{subject}'. \
             I'll review and get back to you shortly.\n\n\
             Best regards,\n\
             {}",
            self.signature
        )
    }
}

/// User content for the reply-generation call.
pub fn reply_user_prompt(message: &MessageMeta) -> String {
    format!(
        "From: {}\nSubject: {}\nContent: {}\n\nGenerate a professional reply:",
        message.sender.raw, message.subject, message.snippet
    )
}

fn default_reply_prompt(assistant: &str, signature: &str) -> String {
    format!(
        "{assistant} Generate a professional, friendly email reply. \
         Structure: greeting, brief acknowledgment, relevant response (1-2 sentences), \
         clear next step or question. \
         Sign off: {signature}. \
         Keep it concise but complete - aim for 3-4 sentences total."
    )
}

fn default_relevance_prompt(name: &str) -> String {
    format!(
        "You are an email relevance classifier. Consider an email relevant if it:\n\
         - Contains important updates or announcements that {name} should be aware of\n\
         - Is from a professional contact or organization {name} works with\n\
         - Contains information about projects, events, or initiatives {name} is involved in\n\
         - Has time-sensitive information that could affect {name}'s work or commitments\n\
         - Contains important news or updates from organizations {name} is part of\n\
         - Is from a colleague, supervisor, or professional contact\n\
         \n\
         Consider an email NOT relevant if it:\n\
         - Is purely promotional/spam\n\
         - Is an automated notification (password reset, shipping updates, etc.)\n\
         - Is a mass newsletter or marketing email\n\
         - Contains only routine system-generated content\n\
         - Is a generic announcement with no personal relevance\n\
         \n\
         Reply with exactly 'Yes' if the email is important for {name} to see, otherwise reply 'No'."
    )
}

fn default_response_prompt(name: &str) -> String {
    format!(
        "You are an email response classifier. Consider an email needs a response if it:\n\
         - Directly asks {name} for specific action or response\n\
         - Requests {name}'s personal input, decision, or participation\n\
         - Contains a deadline or time-sensitive request for {name}\n\
         - Asks {name} to attend a meeting or event\n\
         - Requests {name}'s expertise, approval, or signature\n\
         - Contains a direct question that only {name} can answer\n\
         - Asks for confirmation or acknowledgment\n\
         \n\
         Consider an email does NOT need a response if it:\n\
         - Is informational only (no action required)\n\
         - Is a general announcement or update\n\
         - Is a newsletter or mass communication\n\
         - Contains only status updates or notifications\n\
         - Is a thank you or acknowledgment email\n\
         \n\
         Reply with exactly 'Yes' if the email requires {name}'s response or action, otherwise reply 'No'."
    )
}
