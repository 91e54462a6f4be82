//! Keyword heuristics for ranking contacts.
//!
//! Two independent scores: a relevance score over free text (used to rank
//! outreach targets) and a priority tier over job titles (used to order
//! pattern probing). Both are additive keyword tables, nothing more.

/// Keywords worth +10 relevance each: fire/safety/compliance terms and
/// decision-maker roles.
const HIGH_RELEVANCE: &[&str] = &[
    "fire",
    "safety",
    "compliance",
    "risk",
    "health",
    "facilities",
    "facility",
    "maintenance",
    "security",
    "operations",
    "director",
    "manager",
    "owner",
    "founder",
    "ceo",
    "managing",
];

/// Keywords worth +5 relevance each: generic office and technical terms.
const MEDIUM_RELEVANCE: &[&str] = &[
    "office",
    "admin",
    "business",
    "assistant",
    "project",
    "coordinator",
    "specialist",
    "consultant",
    "technical",
    "site",
    "estate",
    "property",
];

/// Score a contact's relevance from name, title, and description.
///
/// Starts at a 50 baseline, adds 10 per high-relevance keyword and 5 per
/// medium-relevance keyword found anywhere in the concatenated lower-cased
/// text, clamped to 100. Purely additive; no field weighting.
pub fn relevance_score(name: &str, title: &str, description: &str) -> u8 {
    let text = format!("{name} {title} {description}").to_lowercase();
    let mut score: i32 = 50;
    for keyword in HIGH_RELEVANCE {
        if text.contains(keyword) {
            score += 10;
        }
    }
    for keyword in MEDIUM_RELEVANCE {
        if text.contains(keyword) {
            score += 5;
        }
    }
    score.clamp(0, 100) as u8
}

/// Priority tier for pattern probing: contacts more likely to hold a
/// company mailbox are probed first. Higher is earlier.
pub fn pattern_test_priority(title: &str) -> u8 {
    if title.trim().is_empty() {
        return 0;
    }
    let t = title.to_lowercase();

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| t.contains(k));

    // Senior leadership
    if contains_any(&["ceo", "owner", "founder", "director", "managing"]) {
        return 90;
    }
    // Management
    if contains_any(&["manager", "head", "lead", "supervisor"]) {
        return 80;
    }
    // Core business roles
    if contains_any(&["specialist", "coordinator", "analyst", "consultant"]) {
        return 60;
    }
    // Support roles
    if contains_any(&["assistant", "support", "associate", "officer", "representative"]) {
        return 40;
    }
    // Contract/freelance
    if contains_any(&["freelance", "contractor", "brand ambassador"]) {
        return 20;
    }
    // Students and temporary roles
    if contains_any(&["student", "intern", "graduate", "university"]) {
        return 10;
    }

    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_fifty() {
        assert_eq!(relevance_score("Zz Qq", "", ""), 50);
    }

    #[test]
    fn high_keyword_adds_ten() {
        assert_eq!(relevance_score("Zz Qq", "Fire Warden", ""), 60);
    }

    #[test]
    fn medium_keyword_adds_five() {
        assert_eq!(relevance_score("Zz Qq", "Office Junior", ""), 55);
    }

    #[test]
    fn score_is_monotone_in_added_keywords() {
        let mut text = String::new();
        let mut previous = relevance_score("Zz Qq", &text, "");
        for keyword in ["fire", "safety", "compliance", "facilities", "office", "project"] {
            text.push(' ');
            text.push_str(keyword);
            let current = relevance_score("Zz Qq", &text, "");
            assert!(current >= previous, "score dropped after adding {keyword}");
            previous = current;
        }
    }

    #[test]
    fn score_clamps_at_one_hundred() {
        let everything = HIGH_RELEVANCE.join(" ") + " " + &MEDIUM_RELEVANCE.join(" ");
        assert_eq!(relevance_score("Zz Qq", &everything, &everything), 100);
    }

    #[test]
    fn priority_tiers() {
        assert_eq!(pattern_test_priority("Managing Director"), 90);
        assert_eq!(pattern_test_priority("Operations Manager"), 80);
        assert_eq!(pattern_test_priority("Data Analyst"), 60);
        assert_eq!(pattern_test_priority("Office Assistant"), 40);
        assert_eq!(pattern_test_priority("Freelance Designer"), 20);
        assert_eq!(pattern_test_priority("Marketing Intern"), 10);
        assert_eq!(pattern_test_priority("Beekeeper"), 30);
        assert_eq!(pattern_test_priority(""), 0);
    }
}
