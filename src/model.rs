//! Core pipeline types: contacts and sent-mail records.

use serde::Serialize;

/// Where a contact was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Linkedin,
    Website,
}

/// How a contact's email address was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSource {
    /// The scraping provider returned the address directly.
    Provider,
    /// Produced by replaying a learned pattern template.
    Pattern,
    /// Found by probing the fixed candidate list (1-based candidate index).
    Candidate(usize),
    /// Harvested verbatim from page content.
    Harvested,
}

/// A discovered person, enriched in place as the pipeline proceeds.
#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub description: String,
    pub email: Option<String>,
    pub email_source: Option<EmailSource>,
    /// Relevance score in 0..=100, used only to rank.
    pub relevance: u8,
    /// Priority tier used to order pattern probing.
    pub priority: u8,
    pub source: ContactSource,
    pub domain: String,
}

impl Contact {
    /// Build a contact from a full name, splitting out first/last tokens.
    /// Returns `None` for names without at least two tokens.
    pub fn from_name(
        name: &str,
        title: &str,
        domain: &str,
        source: ContactSource,
    ) -> Option<Self> {
        let tokens: Vec<&str> = name.split_whitespace().collect();
        if tokens.len() < 2 {
            return None;
        }
        let first_name = tokens[0].to_string();
        let last_name = tokens[tokens.len() - 1].to_string();
        Some(Self {
            name: tokens.join(" "),
            first_name,
            last_name,
            title: title.to_string(),
            description: String::new(),
            email: None,
            email_source: None,
            relevance: 0,
            priority: 0,
            source,
            domain: domain.to_string(),
        })
    }

    /// Record a verified address on this contact. The first accepted address
    /// wins; later calls on a contact that already holds one are ignored.
    pub fn set_email(&mut self, email: String, source: EmailSource) {
        if self.email.is_none() {
            self.email = Some(email);
            self.email_source = Some(source);
        }
    }
}

/// Record of one outreach email handed to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct SentEmail {
    pub contact_name: String,
    pub contact_email: String,
    pub recipient: String,
    pub subject: String,
    pub delivered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_splits_first_and_last() {
        let c = Contact::from_name("John Smith", "Director", "example.com", ContactSource::Linkedin)
            .unwrap();
        assert_eq!(c.first_name, "John");
        assert_eq!(c.last_name, "Smith");
    }

    #[test]
    fn from_name_uses_final_token_as_last_name() {
        let c = Contact::from_name(
            "Mary Jane Watson",
            "Analyst",
            "example.com",
            ContactSource::Website,
        )
        .unwrap();
        assert_eq!(c.first_name, "Mary");
        assert_eq!(c.last_name, "Watson");
    }

    #[test]
    fn from_name_rejects_single_token() {
        assert!(Contact::from_name("Cher", "", "example.com", ContactSource::Website).is_none());
    }

    #[test]
    fn set_email_keeps_first_address() {
        let mut c =
            Contact::from_name("John Smith", "", "example.com", ContactSource::Linkedin).unwrap();
        c.set_email("j.smith@example.com".into(), EmailSource::Provider);
        c.set_email("john@example.com".into(), EmailSource::Pattern);
        assert_eq!(c.email.as_deref(), Some("j.smith@example.com"));
        assert_eq!(c.email_source, Some(EmailSource::Provider));
    }
}
