//! LinkedIn employee listing via the scraping service's company actor.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::accounts::Account;
use crate::error::ScrapeError;
use crate::scrape::{ActorRunClient, EmployeeProfile, EmployeeScraper};

const EMPLOYEES_ACTOR_ID: &str = "harvestapi~linkedin-company-employees";

/// Cap on employee rows requested per run.
const MAX_EMPLOYEES: usize = 30;

/// HTTP employee-listing client over the scraping service.
pub struct HttpEmployeeScraper {
    runs: ActorRunClient,
}

impl HttpEmployeeScraper {
    pub fn new() -> Self {
        Self::with_base_url("https://api.apify.com".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            runs: ActorRunClient::new(base_url),
        }
    }
}

impl Default for HttpEmployeeScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmployeeScraper for HttpEmployeeScraper {
    async fn company_employees(
        &self,
        account: &Account,
        linkedin_url: &str,
    ) -> Result<Vec<EmployeeProfile>, ScrapeError> {
        let input = json!({
            "companies": [linkedin_url],
            "maxItems": MAX_EMPLOYEES,
            "mode": "full_email",
            "includeEmails": true,
            "timeout": 120,
        });

        let items = self
            .runs
            .run_to_items(account, EMPLOYEES_ACTOR_ID, &input)
            .await?;
        info!(profiles = items.len(), linkedin_url, "employee listing finished");

        Ok(items.iter().map(profile_from_item).collect())
    }
}

fn string_field(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| item.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn profile_from_item(item: &Value) -> EmployeeProfile {
    let email = string_field(item, &["email", "emailAddress", "contactEmail"]);
    let profile_url = string_field(item, &["linkedinUrl", "profileUrl"]);
    EmployeeProfile {
        first_name: string_field(item, &["firstName"]),
        last_name: string_field(item, &["lastName"]),
        headline: {
            let headline = string_field(item, &["headline", "position"]);
            if headline.is_empty() {
                "Employee".to_string()
            } else {
                headline
            }
        },
        email: (!email.is_empty()).then_some(email),
        profile_url: (!profile_url.is_empty()).then_some(profile_url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_parses_provider_fields() {
        let item = json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "headline": "Operations Director",
            "email": "jane.doe@acme.com",
            "linkedinUrl": "https://www.linkedin.com/in/jane-doe",
        });
        let profile = profile_from_item(&item);
        assert_eq!(profile.full_name(), "Jane Doe");
        assert_eq!(profile.email.as_deref(), Some("jane.doe@acme.com"));
        assert_eq!(profile.headline, "Operations Director");
    }

    #[test]
    fn profile_defaults_missing_fields() {
        let item = json!({ "firstName": "Sam", "lastName": "Patel" });
        let profile = profile_from_item(&item);
        assert_eq!(profile.headline, "Employee");
        assert_eq!(profile.email, None);
        assert_eq!(profile.profile_url, None);
    }

    #[test]
    fn profile_uses_alternate_email_keys() {
        let item = json!({
            "firstName": "Ana",
            "lastName": "Silva",
            "contactEmail": "ana@acme.com",
        });
        let profile = profile_from_item(&item);
        assert_eq!(profile.email.as_deref(), Some("ana@acme.com"));
    }
}
