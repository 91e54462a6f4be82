//! Website crawl: page capture, LinkedIn URL discovery, email harvesting.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use tracing::info;

use crate::accounts::Account;
use crate::error::ScrapeError;
use crate::scrape::{ActorRunClient, PageCapture, SiteScraper};

const WEBSITE_ACTOR_ID: &str = "apify~web-scraper";

/// Page anchors likely to hold staff listings, requested alongside the
/// homepage.
const STAFF_ANCHORS: &[&str] = &[
    "#team",
    "#people",
    "#staff",
    "#leadership",
    "#our-team",
    "#management",
    "#about",
    "#meet-the-team",
    "#our-people",
];

/// HTTP website crawler over the scraping service.
pub struct HttpSiteScraper {
    runs: ActorRunClient,
}

impl HttpSiteScraper {
    pub fn new() -> Self {
        Self::with_base_url("https://api.apify.com".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            runs: ActorRunClient::new(base_url),
        }
    }
}

impl Default for HttpSiteScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteScraper for HttpSiteScraper {
    async fn crawl(&self, account: &Account, url: &str) -> Result<Vec<PageCapture>, ScrapeError> {
        let home = normalize_url(url);
        let base = home.trim_end_matches('/');
        let mut start_urls = vec![json!({ "url": home })];
        for anchor in STAFF_ANCHORS {
            start_urls.push(json!({ "url": format!("{base}/{anchor}") }));
        }

        let input = json!({
            "startUrls": start_urls,
            "useChrome": true,
            "useStealth": true,
            "ignoreHttpsErrors": true,
            "injectJQuery": true,
            "waitUntil": ["networkidle2", "domcontentloaded"],
            "maxRequestsPerCrawl": start_urls.len().max(5),
            "maxDepth": 0,
            "maxRequestRetries": 1,
            "keepUrlFragments": true,
            "proxyConfiguration": { "useApifyProxy": true },
            "pageFunction": PAGE_FUNCTION,
        });

        let items = self.runs.run_to_items(account, WEBSITE_ACTOR_ID, &input).await?;
        info!(pages = items.len(), url = %home, "website crawl finished");

        Ok(items
            .into_iter()
            .map(|item| PageCapture {
                url: item
                    .get("url")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                text: item
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                links: item
                    .get("links")
                    .and_then(|v| v.as_array())
                    .map(|links| {
                        links
                            .iter()
                            .filter_map(|l| l.as_str())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }
}

/// Page function shipped to the actor: visible text plus all link hrefs.
const PAGE_FUNCTION: &str = r#"
async function pageFunction(context) {
    const out = { url: location.href, text: "", links: [] };
    out.text = (document.body && document.body.innerText) || "";
    out.links = Array.from(document.querySelectorAll("a[href]"))
        .map((a) => a.href)
        .filter(Boolean);
    return out;
}
"#;

/// Normalize a target URL: force a scheme and a `www.` host.
pub fn normalize_url(url: &str) -> String {
    let with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    let Some((scheme, rest)) = with_scheme.split_once("://") else {
        return with_scheme;
    };
    if rest.starts_with("www.") {
        return with_scheme;
    }
    format!("{scheme}://www.{rest}")
}

/// Extract the bare domain (host without `www.`) from a URL.
pub fn domain_of(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    host.trim_start_matches("www.").to_lowercase()
}

/// Find the company's LinkedIn page among captured links.
pub fn find_linkedin_url(captures: &[PageCapture]) -> Option<String> {
    captures
        .iter()
        .flat_map(|capture| capture.links.iter())
        .find(|link| {
            let lower = link.to_lowercase();
            lower.contains("linkedin.com/company/") || lower.contains("linkedin.com/school/")
        })
        .map(|link| link.trim_end_matches('/').to_string())
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});

/// Local parts that mark an address as not worth contacting.
const SKIP_LOCAL_KEYWORDS: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "example",
    "test",
    "spam",
    "newsletter",
    "marketing",
];

/// Harvest candidate business addresses directly from page text.
pub fn harvest_emails(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut found = Vec::new();
    for m in EMAIL_RE.find_iter(text) {
        let email = m.as_str().to_lowercase();
        if is_business_email(&email) && seen.insert(email.clone()) {
            found.push(email);
        }
    }
    found
}

/// Filter out spam traps, autoresponders, and bulk mailboxes.
pub fn is_business_email(email: &str) -> bool {
    let lower = email.to_lowercase();
    if SKIP_LOCAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return false;
    }
    let Some((_, domain)) = lower.split_once('@') else {
        return false;
    };
    domain.contains('.')
}

/// Synthesize a display name from an address's local part
/// (`jane.doe@…` → "Jane Doe").
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let separator = ['.', '_', '-']
        .into_iter()
        .find(|sep| local.contains(*sep));

    let parts: Vec<&str> = match separator {
        Some(sep) => local.split(sep).filter(|p| p.len() > 1).collect(),
        None => vec![local],
    };

    parts
        .iter()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(links: &[&str]) -> PageCapture {
        PageCapture {
            url: "https://www.example.com".into(),
            text: String::new(),
            links: links.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn normalize_adds_scheme_and_www() {
        assert_eq!(normalize_url("example.com"), "https://www.example.com");
        assert_eq!(
            normalize_url("https://example.com/about"),
            "https://www.example.com/about"
        );
        assert_eq!(
            normalize_url("https://www.example.com"),
            "https://www.example.com"
        );
    }

    #[test]
    fn domain_strips_scheme_and_www() {
        assert_eq!(domain_of("https://www.example.co.uk/about?x=1"), "example.co.uk");
        assert_eq!(domain_of("example.com"), "example.com");
    }

    #[test]
    fn finds_company_linkedin_link() {
        let captures = vec![
            capture(&["https://twitter.com/acme"]),
            capture(&[
                "https://www.example.com/contact",
                "https://www.linkedin.com/company/acme-ltd/",
            ]),
        ];
        assert_eq!(
            find_linkedin_url(&captures).as_deref(),
            Some("https://www.linkedin.com/company/acme-ltd")
        );
    }

    #[test]
    fn ignores_personal_linkedin_profiles() {
        let captures = vec![capture(&["https://www.linkedin.com/in/jane-doe/"])];
        assert_eq!(find_linkedin_url(&captures), None);
    }

    #[test]
    fn harvests_and_filters_addresses() {
        let text = "Contact jane.doe@acme.com or noreply@acme.com; \
                    newsletter@acme.com and JANE.DOE@ACME.COM too.";
        let found = harvest_emails(text);
        assert_eq!(found, vec!["jane.doe@acme.com".to_string()]);
    }

    #[test]
    fn business_email_filter() {
        assert!(is_business_email("dave@acme.co.uk"));
        assert!(!is_business_email("donotreply@acme.com"));
        assert!(!is_business_email("test@acme.com"));
    }

    #[test]
    fn name_from_email_splits_separators() {
        assert_eq!(name_from_email("jane.doe@acme.com"), "Jane Doe");
        assert_eq!(name_from_email("john_smith@acme.com"), "John Smith");
        assert_eq!(name_from_email("dave@acme.com"), "Dave");
    }
}
