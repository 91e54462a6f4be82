//! Outbound mail: SMTP transport via lettre plus outreach composition.
//!
//! Every send goes to the injected test-mode recipient, never to the
//! discovered contact address.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::error::MailError;
use crate::llm::LlmProvider;
use crate::model::Contact;

/// Outbound mail transport.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP transport built from configuration.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn send_blocking(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| MailError::SendFailed(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let email = Message::builder()
            .from(from.parse().map_err(|e| MailError::InvalidAddress {
                address: self.config.from_address.clone(),
                reason: format!("{e}"),
            })?)
            .to(to.parse().map_err(|e| MailError::InvalidAddress {
                address: to.to_string(),
                reason: format!("{e}"),
            })?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        transport
            .send(&email)
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        info!(to, subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.send_blocking(to, subject, body)
    }
}

/// A composed outreach message.
#[derive(Debug, Clone)]
pub struct OutreachEmail {
    pub subject: String,
    pub body: String,
}

/// Composes a personalized outreach email for one contact, with a
/// deterministic fallback when the model call fails.
pub struct OutreachComposer {
    llm: Arc<dyn LlmProvider>,
    from_name: String,
}

impl OutreachComposer {
    pub fn new(llm: Arc<dyn LlmProvider>, from_name: String) -> Self {
        Self { llm, from_name }
    }

    pub async fn compose(&self, contact: &Contact) -> OutreachEmail {
        let prompt = self.build_prompt(contact);
        match self.llm.complete(&prompt).await {
            Ok(reply) => parse_reply(&reply).unwrap_or_else(|| {
                warn!(contact = %contact.name, "unparsable outreach reply, using fallback");
                self.fallback(contact)
            }),
            Err(e) => {
                warn!(contact = %contact.name, error = %e, "outreach generation failed, using fallback");
                self.fallback(contact)
            }
        }
    }

    fn build_prompt(&self, contact: &Contact) -> String {
        format!(
            "Write a short, professional B2B cold outreach email about fire \
             protection services.\n\n\
             RECIPIENT: {name}, {title} at {domain}\n\
             SENDER: {from_name}\n\n\
             RULES:\n\
             1. Under 150 words.\n\
             2. One concrete reason their role makes fire safety compliance relevant.\n\
             3. End with a low-pressure call to action.\n\n\
             Reply in exactly this format:\n\
             Subject: <subject line>\n\n\
             <body>",
            name = contact.name,
            title = if contact.title.is_empty() {
                "decision maker"
            } else {
                &contact.title
            },
            domain = contact.domain,
            from_name = self.from_name,
        )
    }

    fn fallback(&self, contact: &Contact) -> OutreachEmail {
        OutreachEmail {
            subject: format!("Fire safety compliance at {}", contact.domain),
            body: format!(
                "Hi {first},\n\n\
                 I work with businesses like yours on fire protection compliance \
                 and wanted to reach out in case a short conversation would be \
                 useful. Happy to share what similar organisations are doing.\n\n\
                 Best,\n{from}",
                first = contact.first_name,
                from = self.from_name,
            ),
        }
    }
}

/// Parse a `Subject: …` header off the model's reply; the rest is the body.
fn parse_reply(reply: &str) -> Option<OutreachEmail> {
    let trimmed = reply.trim();
    let rest = trimmed.strip_prefix("Subject:")?;
    let (subject, body) = rest.split_once('\n')?;
    let subject = subject.trim();
    let body = body.trim();
    if subject.is_empty() || body.is_empty() {
        return None;
    }
    Some(OutreachEmail {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_splits_subject_and_body() {
        let reply = "Subject: Quick question about site safety\n\nHi Jane,\n\nBody text.";
        let email = parse_reply(reply).unwrap();
        assert_eq!(email.subject, "Quick question about site safety");
        assert!(email.body.starts_with("Hi Jane,"));
    }

    #[test]
    fn parse_reply_rejects_missing_subject() {
        assert!(parse_reply("Hi Jane, no subject here").is_none());
        assert!(parse_reply("Subject: only a subject").is_none());
    }
}
