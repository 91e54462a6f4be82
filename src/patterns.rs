//! Candidate email generation and pattern templates.
//!
//! The candidate list is a fixed, ordered set of 33 naming conventions; its
//! order doubles as a low-priority tiebreaker (earlier entries preferred).
//! A template abstracts one accepted address into placeholders so it can be
//! replayed for other people on the same domain.

use std::fmt;

/// Normalize a name part for address construction: lower-case, letters only.
fn normalize(part: &str) -> String {
    part.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect()
}

/// Generate the fixed, ordered list of 33 candidate addresses for a person.
///
/// Covers dotted, concatenated, and initial-based forms with dot, underscore
/// and hyphen separators in both first-last and last-first order, plus
/// first-only, last-only, initials-only, and a final `info@domain` catch-all.
/// The list is not deduplicated: degenerate names may produce colliding
/// entries, and the count stays 33. Returns an empty list when either name
/// part normalizes to nothing.
pub fn candidate_emails(first_name: &str, last_name: &str, domain: &str) -> Vec<String> {
    let first = normalize(first_name);
    let last = normalize(last_name);
    if first.is_empty() || last.is_empty() {
        return Vec::new();
    }
    let f = &first[..1];
    let l = &last[..1];

    let locals = [
        format!("{first}.{last}"),
        first.clone(),
        last.clone(),
        format!("{first}{last}"),
        format!("{first}_{last}"),
        format!("{first}-{last}"),
        format!("{f}{last}"),
        format!("{f}.{last}"),
        format!("{f}_{last}"),
        format!("{f}-{last}"),
        format!("{first}{l}"),
        format!("{first}.{l}"),
        format!("{first}_{l}"),
        format!("{first}-{l}"),
        format!("{last}{first}"),
        format!("{last}.{first}"),
        format!("{last}_{first}"),
        format!("{last}-{first}"),
        format!("{last}{f}"),
        format!("{last}.{f}"),
        format!("{last}_{f}"),
        format!("{last}-{f}"),
        format!("{f}{l}"),
        format!("{f}.{l}"),
        format!("{f}_{l}"),
        format!("{f}-{l}"),
        format!("{l}{f}"),
        format!("{l}.{f}"),
        format!("{l}_{f}"),
        format!("{l}-{f}"),
        f.to_string(),
        l.to_string(),
        "info".to_string(),
    ];

    locals
        .into_iter()
        .map(|local| format!("{local}@{domain}"))
        .collect()
}

/// One piece of a learned template's local part.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    First,
    Last,
    FirstInitial,
    LastInitial,
}

/// A reusable email pattern derived from one accepted address.
///
/// Displays as e.g. `{f}.{last}@{domain}`. Read-only once learned; shared
/// across all contacts on the same domain for the remainder of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    segments: Vec<Segment>,
}

impl EmailTemplate {
    /// Abstract an accepted address into a template.
    ///
    /// Each of the full first name, full last name, first initial, and last
    /// initial replaces its first literal occurrence in the local part.
    /// Longer literals are replaced first so that names which are substrings
    /// of each other (e.g. "Ed Edwards") cannot corrupt the template, and a
    /// placeholder once inserted is never re-matched. Returns `None` when
    /// nothing in the local part matches the name (no generalizable pattern).
    pub fn learn(
        accepted_email: &str,
        first_name: &str,
        last_name: &str,
        domain: &str,
    ) -> Option<Self> {
        let local = accepted_email.split('@').next()?.to_lowercase();
        if local.is_empty() || !accepted_email.to_lowercase().ends_with(&domain.to_lowercase()) {
            return None;
        }
        let first = normalize(first_name);
        let last = normalize(last_name);
        if first.is_empty() || last.is_empty() {
            return None;
        }

        // Full names ordered longest-first, then the two initials.
        let mut keys: Vec<(String, Segment)> = vec![
            (first.clone(), Segment::First),
            (last.clone(), Segment::Last),
        ];
        keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        keys.push((first[..1].to_string(), Segment::FirstInitial));
        keys.push((last[..1].to_string(), Segment::LastInitial));

        let mut segments = vec![Segment::Literal(local)];
        for (needle, replacement) in keys {
            replace_first(&mut segments, &needle, replacement);
        }

        if segments.iter().all(|s| matches!(s, Segment::Literal(_))) {
            return None;
        }
        Some(Self { segments })
    }

    /// Replay the template for another person on the same domain.
    /// Returns `None` when either name part normalizes to nothing.
    pub fn apply(&self, first_name: &str, last_name: &str, domain: &str) -> Option<String> {
        let first = normalize(first_name);
        let last = normalize(last_name);
        if first.is_empty() || last.is_empty() {
            return None;
        }
        let mut local = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => local.push_str(text),
                Segment::First => local.push_str(&first),
                Segment::Last => local.push_str(&last),
                Segment::FirstInitial => local.push_str(&first[..1]),
                Segment::LastInitial => local.push_str(&last[..1]),
            }
        }
        Some(format!("{local}@{domain}"))
    }
}

/// Split the first literal segment containing `needle` around a placeholder.
fn replace_first(segments: &mut Vec<Segment>, needle: &str, replacement: Segment) {
    for index in 0..segments.len() {
        let Segment::Literal(text) = &segments[index] else {
            continue;
        };
        let Some(at) = text.find(needle) else {
            continue;
        };
        let prefix = text[..at].to_string();
        let suffix = text[at + needle.len()..].to_string();

        let mut rebuilt = Vec::with_capacity(3);
        if !prefix.is_empty() {
            rebuilt.push(Segment::Literal(prefix));
        }
        rebuilt.push(replacement);
        if !suffix.is_empty() {
            rebuilt.push(Segment::Literal(suffix));
        }
        segments.splice(index..=index, rebuilt);
        return;
    }
}

impl fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "{text}")?,
                Segment::First => write!(f, "{{first}}")?,
                Segment::Last => write!(f, "{{last}}")?,
                Segment::FirstInitial => write!(f, "{{f}}")?,
                Segment::LastInitial => write!(f, "{{l}}")?,
            }
        }
        write!(f, "@{{domain}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_exactly_thirty_three_candidates() {
        let candidates = candidate_emails("John", "Smith", "example.com");
        assert_eq!(candidates.len(), 33);
    }

    #[test]
    fn final_candidate_is_always_info() {
        let candidates = candidate_emails("Jane", "Doe", "widgets.co.uk");
        assert_eq!(candidates.last().unwrap(), "info@widgets.co.uk");
    }

    #[test]
    fn candidates_are_syntactically_valid() {
        for candidate in candidate_emails("Mary-Anne", "O'Brien", "example.com") {
            let (local, domain) = candidate.split_once('@').expect("one @ per address");
            assert!(!local.is_empty());
            assert_eq!(domain, "example.com");
            assert!(
                local
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '.' || c == '_' || c == '-'),
                "unexpected character in {candidate}"
            );
        }
    }

    #[test]
    fn empty_name_part_yields_no_candidates() {
        assert!(candidate_emails("", "Smith", "example.com").is_empty());
        assert!(candidate_emails("John", "123", "example.com").is_empty());
    }

    #[test]
    fn learn_initial_dot_last() {
        let template =
            EmailTemplate::learn("j.smith@example.com", "John", "Smith", "example.com").unwrap();
        assert_eq!(template.to_string(), "{f}.{last}@{domain}");
    }

    #[test]
    fn learned_template_applies_to_new_name() {
        let template =
            EmailTemplate::learn("j.smith@example.com", "John", "Smith", "example.com").unwrap();
        assert_eq!(
            template.apply("Jane", "Doe", "example.com").unwrap(),
            "j.doe@example.com"
        );
    }

    #[test]
    fn round_trip_reproduces_accepted_address() {
        for accepted in [
            "john.smith@example.com",
            "jsmith@example.com",
            "smith.john@example.com",
            "johns@example.com",
            "j_s@example.com",
        ] {
            let template =
                EmailTemplate::learn(accepted, "John", "Smith", "example.com").unwrap();
            assert_eq!(
                template.apply("John", "Smith", "example.com").as_deref(),
                Some(accepted),
                "template {template} did not round-trip",
            );
        }
    }

    #[test]
    fn substring_names_round_trip() {
        // "ed" is a prefix of "edwards"; longest-first replacement keeps the
        // template intact where naive first-name-first replacement would
        // leave "{first}wards".
        let template = EmailTemplate::learn("edwards@example.com", "Ed", "Edwards", "example.com")
            .unwrap();
        assert_eq!(template.to_string(), "{last}@{domain}");
        assert_eq!(
            template.apply("Ed", "Edwards", "example.com").as_deref(),
            Some("edwards@example.com")
        );

        let dotted =
            EmailTemplate::learn("ed.edwards@example.com", "Ed", "Edwards", "example.com").unwrap();
        assert_eq!(dotted.to_string(), "{first}.{last}@{domain}");
        assert_eq!(
            dotted.apply("Ed", "Edwards", "example.com").as_deref(),
            Some("ed.edwards@example.com")
        );
    }

    #[test]
    fn learn_rejects_unrelated_local_part() {
        assert!(EmailTemplate::learn("info@example.com", "Quinn", "Zhao", "example.com").is_none());
    }

    #[test]
    fn apply_rejects_empty_names() {
        let template =
            EmailTemplate::learn("j.smith@example.com", "John", "Smith", "example.com").unwrap();
        assert!(template.apply("", "Doe", "example.com").is_none());
    }
}
