//! Staff extraction from raw page text via the LLM.
//!
//! The page text is narrowed to keyword-anchored sections before being
//! forwarded, the model's free-text reply is parsed for a JSON array, and
//! obvious non-person entries are dropped locally.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::LlmProvider;

/// Pages shorter than this are too unreliable to extract from.
pub const MIN_CONTENT_LEN: usize = 2000;

/// Hard cap on the amount of text forwarded to the model.
pub const MAX_FORWARD_LEN: usize = 100_000;

/// Lines kept around each keyword-anchored line.
const SECTION_CONTEXT_LINES: usize = 50;

/// Anchors that mark staff-related sections.
const SECTION_KEYWORDS: &[&str] = &[
    "about us",
    "team",
    "staff",
    "our people",
    "leadership",
    "meet the team",
    "our team",
    "employees",
    "directors",
];

/// Tokens that mark an organization name rather than a person.
const ORG_NAME_TOKENS: &[&str] = &[
    "ltd",
    "limited",
    "inc",
    "corp",
    "group",
    "company",
    "llc",
    "plc",
    "team",
    "department",
    "marketing",
    "sales",
    "support",
    "admin",
    "office",
];

/// One entry parsed from the model's reply.
#[derive(Debug, Clone, Deserialize)]
pub struct StaffEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "title")]
    pub position: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// LLM-backed staff extractor.
pub struct StaffExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl StaffExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Extract staff entries from raw page text.
    ///
    /// Data errors (short input, model failure, unparsable reply) yield an
    /// empty list, never an error.
    pub async fn extract(&self, page_text: &str, domain: &str) -> Vec<StaffEntry> {
        if page_text.len() < MIN_CONTENT_LEN {
            debug!(len = page_text.len(), "page text too short for extraction");
            return Vec::new();
        }

        let content = staff_sections(page_text);
        let prompt = build_prompt(&content, domain);

        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "staff extraction call failed");
                return Vec::new();
            }
        };

        parse_reply(&reply)
            .into_iter()
            .filter(|entry| looks_like_person(&entry.name))
            .collect()
    }
}

fn build_prompt(content: &str, domain: &str) -> String {
    format!(
        "Extract staff from this {domain} content.\n\n\
         RULES:\n\
         1. Find ONLY current employees of {domain}\n\
         2. Need: Full name + Job title\n\
         3. EXCLUDE: Clients, testimonials, external people\n\
         4. EXCLUDE: Company names mistaken as people\n\
         5. Require: First name + Last name (minimum)\n\n\
         Return JSON: [{{\"name\": \"Full Name\", \"position\": \"Job Title\", \
         \"email\": \"\", \"link\": \"\"}}]\n\
         If none found: []\n\n\
         Content:\n{content}"
    )
}

/// Narrow page text to keyword-anchored sections with surrounding context,
/// capped at [`MAX_FORWARD_LEN`]. Falls back to the (capped) whole text when
/// no anchor matches.
pub fn staff_sections(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![false; lines.len()];
    let mut anchored = false;

    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if SECTION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            anchored = true;
            let start = i.saturating_sub(SECTION_CONTEXT_LINES);
            let end = (i + SECTION_CONTEXT_LINES + 1).min(lines.len());
            for flag in &mut keep[start..end] {
                *flag = true;
            }
        }
    }

    let selected = if anchored {
        lines
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(line, _)| *line)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    };

    truncate_chars(&selected, MAX_FORWARD_LEN)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Parse a JSON array of entries out of the model's free-text reply.
/// An unparsable reply yields an empty list.
pub fn parse_reply(reply: &str) -> Vec<StaffEntry> {
    let Some(start) = reply.find('[') else {
        return Vec::new();
    };
    let Some(end) = reply.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<StaffEntry>>(&reply[start..=end]) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "could not parse staff entries from model reply");
            Vec::new()
        }
    }
}

/// Two-token minimum plus an organization-name check over the tokens.
pub fn looks_like_person(name: &str) -> bool {
    let tokens: Vec<String> = name
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() < 2 {
        return false;
    }
    !tokens
        .iter()
        .any(|token| ORG_NAME_TOKENS.contains(&token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_filter_requires_two_tokens() {
        assert!(!looks_like_person("Madonna"));
        assert!(looks_like_person("Jane Doe"));
    }

    #[test]
    fn person_filter_rejects_org_names() {
        assert!(!looks_like_person("Acme Holdings Ltd"));
        assert!(!looks_like_person("Crewsaders Group"));
        assert!(!looks_like_person("Sales Team"));
        assert!(!looks_like_person("Widget Company Inc."));
    }

    #[test]
    fn person_filter_keeps_names_containing_suffix_substrings() {
        // "Altdorf" contains "ltd" as a substring; token matching keeps it.
        assert!(looks_like_person("Hans Altdorf"));
    }

    #[test]
    fn parse_reply_extracts_embedded_array() {
        let reply = r#"Here are the staff I found:
[{"name": "Jane Doe", "position": "Managing Director", "email": "", "link": ""},
 {"name": "John Smith", "title": "Operations Manager"}]
Let me know if you need more."#;
        let entries = parse_reply(reply);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Jane Doe");
        assert_eq!(entries[1].position, "Operations Manager");
    }

    #[test]
    fn parse_reply_handles_garbage() {
        assert!(parse_reply("no json here").is_empty());
        assert!(parse_reply("[{broken").is_empty());
        assert!(parse_reply("]").is_empty());
    }

    #[test]
    fn sections_keep_context_window() {
        let mut lines: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        lines[120] = "Meet the Team".to_string();
        let narrowed = staff_sections(&lines.join("\n"));
        assert!(narrowed.contains("line 70"));
        assert!(narrowed.contains("line 170"));
        assert!(!narrowed.contains("line 60"));
        assert!(!narrowed.contains("line 180"));
    }

    #[test]
    fn sections_fall_back_to_whole_text() {
        let text = "nothing relevant\nat all";
        assert_eq!(staff_sections(text), text);
    }

    #[test]
    fn sections_respect_forwarding_cap() {
        let text = "team\n".repeat(50_000);
        assert!(staff_sections(&text).len() <= MAX_FORWARD_LEN);
    }
}
