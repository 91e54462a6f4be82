//! Clients for the third-party scraping service.
//!
//! Both phases drive the same actor-run API: start a run, poll it to a
//! terminal status, then page through the result dataset. The service's
//! internals are opaque; these clients own only the HTTP plumbing.

pub mod linkedin;
pub mod website;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::accounts::Account;
use crate::error::ScrapeError;

/// One captured page: rendered text plus outbound links.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub url: String,
    pub text: String,
    pub links: Vec<String>,
}

/// One employee row from the LinkedIn listing actor.
#[derive(Debug, Clone)]
pub struct EmployeeProfile {
    pub first_name: String,
    pub last_name: String,
    pub headline: String,
    pub email: Option<String>,
    pub profile_url: Option<String>,
}

impl EmployeeProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Website-crawl phase of the scraping service.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    /// Crawl the site and return rendered page captures.
    async fn crawl(&self, account: &Account, url: &str) -> Result<Vec<PageCapture>, ScrapeError>;
}

/// LinkedIn employee-listing phase of the scraping service.
#[async_trait]
pub trait EmployeeScraper: Send + Sync {
    /// List the company's employees from its LinkedIn page.
    async fn company_employees(
        &self,
        account: &Account,
        linkedin_url: &str,
    ) -> Result<Vec<EmployeeProfile>, ScrapeError>;
}

const RUN_POLL_INTERVAL: Duration = Duration::from_secs(3);
const RUN_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const DATASET_PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    default_dataset_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: RunData,
}

/// Shared actor-run plumbing: start, wait, fetch.
pub(crate) struct ActorRunClient {
    client: reqwest::Client,
    base_url: String,
}

impl ActorRunClient {
    pub(crate) fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Start an actor run and return its run id.
    async fn start_run(
        &self,
        account: &Account,
        actor_id: &str,
        input: &Value,
    ) -> Result<String, ScrapeError> {
        let response = self
            .client
            .post(format!("{}/v2/acts/{actor_id}/runs", self.base_url))
            .bearer_auth(account.token.expose_secret())
            .json(input)
            .timeout(Duration::from_secs(180))
            .send()
            .await
            .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Http {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let envelope: RunEnvelope = response
            .json()
            .await
            .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;
        info!(run_id = %envelope.data.id, actor_id, "actor run started");
        Ok(envelope.data.id)
    }

    /// Poll a run until it reaches a terminal status or the wait times out.
    /// Returns the dataset id on success.
    async fn wait_for_run(&self, account: &Account, run_id: &str) -> Result<String, ScrapeError> {
        let deadline = tokio::time::Instant::now() + RUN_WAIT_TIMEOUT;
        let mut last_status = String::new();

        loop {
            let response = self
                .client
                .get(format!("{}/v2/actor-runs/{run_id}", self.base_url))
                .bearer_auth(account.token.expose_secret())
                .timeout(Duration::from_secs(60))
                .send()
                .await
                .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;

            let envelope: RunEnvelope = response
                .json()
                .await
                .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;
            let data = envelope.data;

            if data.status != last_status {
                debug!(run_id, status = %data.status, "actor run status");
                last_status = data.status.clone();
            }

            match data.status.as_str() {
                "SUCCEEDED" => {
                    return data.default_dataset_id.ok_or_else(|| ScrapeError::RunFailed {
                        status: "SUCCEEDED without dataset".to_string(),
                    });
                }
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ScrapeError::RunFailed {
                        status: data.status,
                    });
                }
                _ => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::RunFailed {
                    status: format!("wait timeout in status {}", data.status),
                });
            }
            tokio::time::sleep(RUN_POLL_INTERVAL).await;
        }
    }

    /// Page through a dataset's items.
    async fn fetch_items(
        &self,
        account: &Account,
        dataset_id: &str,
    ) -> Result<Vec<Value>, ScrapeError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let response = self
                .client
                .get(format!("{}/v2/datasets/{dataset_id}/items", self.base_url))
                .query(&[
                    ("format", "json".to_string()),
                    ("clean", "true".to_string()),
                    ("offset", offset.to_string()),
                    ("limit", DATASET_PAGE_SIZE.to_string()),
                ])
                .bearer_auth(account.token.expose_secret())
                .timeout(Duration::from_secs(120))
                .send()
                .await
                .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;

            let batch: Vec<Value> = response
                .json()
                .await
                .map_err(|e| ScrapeError::RequestFailed(e.to_string()))?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            items.extend(batch);
            if batch_len < DATASET_PAGE_SIZE {
                break;
            }
            offset += batch_len;
        }

        Ok(items)
    }

    /// Run an actor start-to-finish and return its dataset items.
    pub(crate) async fn run_to_items(
        &self,
        account: &Account,
        actor_id: &str,
        input: &Value,
    ) -> Result<Vec<Value>, ScrapeError> {
        let run_id = self.start_run(account, actor_id, input).await?;
        let dataset_id = self.wait_for_run(account, &run_id).await?;
        self.fetch_items(account, &dataset_id).await
    }
}
