//! Email deliverability gate over a remote verification API.
//!
//! `VerificationGate::verify` is total: it always returns an accept/reject
//! boolean and never propagates an error. External failures degrade to the
//! configured default verdict, accept in optimistic mode (the shipped
//! policy) and reject in pessimistic mode.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::VerifyError;

/// How long a quota read stays fresh.
const QUOTA_CACHE_TTL: Duration = Duration::from_secs(30);

/// Below this many remaining credits the gate stops spending them.
const QUOTA_LOW_WATER_MARK: u64 = 10;

/// Local parts accepted outright on catch-all domains.
const KNOWN_FIRST_NAMES: &[&str] = &[
    "kathleen", "jane", "stacey", "john", "mary", "david", "sarah", "michael", "emma",
];

/// Role keywords that mark a shared business mailbox as worth keeping.
const ROLE_KEYWORDS: &[&str] = &[
    "info",
    "contact",
    "admin",
    "support",
    "sales",
    "marketing",
    "hr",
    "finance",
    "office",
    "reception",
    "manager",
    "director",
    "ceo",
    "cto",
    "cfo",
    "owner",
    "hello",
    "enquiry",
];

/// One deliverability check result from the remote API.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub result: String,
    /// Remaining quota as reported in the same payload (authoritative).
    pub credits: Option<u64>,
}

/// Remote deliverability API.
#[async_trait]
pub trait VerifierApi: Send + Sync {
    /// Check one address. Consumes quota.
    async fn check(&self, email: &str) -> Result<CheckResponse, VerifyError>;

    /// Read the remaining quota balance. Free.
    async fn credits(&self) -> Result<u64, VerifyError>;
}

/// HTTP client for the verification vendor.
pub struct HttpVerifier {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_base_url(api_key, "https://api.millionverifier.com".to_string())
    }

    pub fn with_base_url(api_key: SecretString, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl VerifierApi for HttpVerifier {
    async fn check(&self, email: &str) -> Result<CheckResponse, VerifyError> {
        let response = self
            .client
            .get(format!("{}/api/v3/", self.base_url))
            .query(&[
                ("api", self.api_key.expose_secret()),
                ("email", email),
                ("timeout", "10"),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::Http {
                status: response.status().as_u16(),
            });
        }
        response
            .json::<CheckResponse>()
            .await
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))
    }

    async fn credits(&self) -> Result<u64, VerifyError> {
        #[derive(Deserialize)]
        struct CreditsResponse {
            #[serde(default)]
            credits: u64,
        }

        let response = self
            .client
            .get(format!("{}/api/v3/credits", self.base_url))
            .query(&[("api", self.api_key.expose_secret())])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::Http {
                status: response.status().as_u16(),
            });
        }
        let body = response
            .json::<CreditsResponse>()
            .await
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))?;
        Ok(body.credits)
    }
}

#[derive(Debug, Default)]
struct QuotaCache {
    credits: Option<u64>,
    refreshed_at: Option<Instant>,
}

/// Accept/reject gate over the remote verifier.
pub struct VerificationGate {
    api: Option<Arc<dyn VerifierApi>>,
    /// Degraded-path verdict: `true` accepts on failure, `false` rejects.
    optimistic: bool,
    cache: Mutex<QuotaCache>,
}

impl VerificationGate {
    pub fn new(api: Arc<dyn VerifierApi>, optimistic: bool) -> Self {
        Self {
            api: Some(api),
            optimistic,
            cache: Mutex::new(QuotaCache::default()),
        }
    }

    /// A gate with no credential configured: every verdict is the default.
    pub fn unconfigured(optimistic: bool) -> Self {
        Self {
            api: None,
            optimistic,
            cache: Mutex::new(QuotaCache::default()),
        }
    }

    /// Verify one address. Total: never errors, never panics.
    pub async fn verify(&self, email: &str) -> bool {
        let Some(api) = &self.api else {
            warn!(email, "no verifier credential configured, using default verdict");
            return self.optimistic;
        };

        // Spend no credits when the balance is already at the low-water mark.
        let credits = self.cached_credits(api.as_ref()).await;
        if credits < QUOTA_LOW_WATER_MARK {
            warn!(email, credits, "verifier quota low, using default verdict");
            return self.optimistic;
        }

        match api.check(email).await {
            Ok(outcome) => {
                if let Some(remaining) = outcome.credits {
                    self.store_credits(remaining);
                }
                self.judge(email, &outcome)
            }
            Err(e) => {
                warn!(email, error = %e, "verifier call failed, using default verdict");
                self.optimistic
            }
        }
    }

    /// Decision table over the (quality, result) pair.
    fn judge(&self, email: &str, outcome: &CheckResponse) -> bool {
        let quality = outcome.quality.trim().to_lowercase();
        let result = outcome.result.trim().to_lowercase();
        debug!(email, %quality, %result, "verifier outcome");

        if quality == "good" && (result == "ok" || result == "deliverable") {
            return true;
        }
        if quality == "risky" && (result == "catch_all" || result == "catch-all") {
            let verdict = local_part_looks_real(email);
            info!(email, verdict, "catch-all domain, applied local-part heuristic");
            return verdict;
        }
        if result == "invalid" || result == "disposable" || quality == "bad" {
            return false;
        }

        // Unknown combination: fall back to the same local-part heuristic.
        let verdict = local_part_looks_real(email);
        info!(email, %quality, %result, verdict, "unknown verifier status, applied heuristic");
        verdict
    }

    async fn cached_credits(&self, api: &dyn VerifierApi) -> u64 {
        {
            let cache = self.cache.lock().expect("quota cache poisoned");
            if let (Some(credits), Some(refreshed_at)) = (cache.credits, cache.refreshed_at) {
                if refreshed_at.elapsed() < QUOTA_CACHE_TTL {
                    return credits;
                }
            }
        }

        match api.credits().await {
            Ok(credits) => {
                self.store_credits(credits);
                credits
            }
            Err(e) => {
                warn!(error = %e, "verifier quota read failed");
                let cache = self.cache.lock().expect("quota cache poisoned");
                cache.credits.unwrap_or(0)
            }
        }
    }

    fn store_credits(&self, credits: u64) {
        let mut cache = self.cache.lock().expect("quota cache poisoned");
        cache.credits = Some(credits);
        cache.refreshed_at = Some(Instant::now());
    }
}

/// Heuristic over the local part for addresses the remote check cannot
/// settle: known first names, plausible first names (alphabetic, three or
/// more letters once separators are stripped), and shared business mailboxes.
fn local_part_looks_real(email: &str) -> bool {
    let local = email.split('@').next().unwrap_or("").to_lowercase();
    let stripped: String = local
        .chars()
        .filter(|c| *c != '.' && *c != '_' && *c != '-')
        .collect();

    if KNOWN_FIRST_NAMES.contains(&stripped.as_str()) {
        return true;
    }
    if stripped.len() >= 3 && stripped.chars().all(|c| c.is_ascii_alphabetic()) {
        return true;
    }
    ROLE_KEYWORDS.iter().any(|keyword| local.contains(keyword))
}
