//! Account pool for the quota-limited scraping service.
//!
//! Selection is dollar-denominated for the website-crawl phase and
//! call-count-denominated for the LinkedIn phase. Quota eligibility is
//! checked before the liveness probe so exhausted accounts never trigger
//! network probes, and every selection appends a credit-log snapshot.

pub mod usage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ScraperCredential;
use crate::error::AccountError;
use usage::{AccountUsage, CreditLogEntry, UsageStore};

/// Default monthly call allowance per account for the LinkedIn phase.
pub const DEFAULT_CALL_LIMIT: u32 = 8;

/// One credentialed scraping-service account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: u8,
    pub label: String,
    pub token: SecretString,
    pub active: bool,
}

impl From<ScraperCredential> for Account {
    fn from(credential: ScraperCredential) -> Self {
        Self {
            id: credential.slot,
            label: credential.label,
            token: credential.token,
            active: true,
        }
    }
}

/// Which quota dimension governs a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCriterion {
    /// Remaining monthly dollars (website-crawl phase).
    Dollars,
    /// Remaining call allowance tracked locally (LinkedIn phase).
    Calls,
}

impl PoolCriterion {
    fn as_str(self) -> &'static str {
        match self {
            Self::Dollars => "dollars",
            Self::Calls => "calls",
        }
    }
}

/// Dollar-denominated monthly quota as reported by the service.
#[derive(Debug, Clone, Copy)]
pub struct DollarQuota {
    pub used: Decimal,
    pub limit: Decimal,
}

impl DollarQuota {
    pub fn remaining(&self) -> Decimal {
        self.limit - self.used
    }
}

/// Remote quota reads and the liveness probe for one account.
#[async_trait]
pub trait QuotaApi: Send + Sync {
    /// Real-time read of the account's monthly dollar usage.
    async fn usage(&self, account: &Account) -> Result<DollarQuota, AccountError>;

    /// Free, non-consuming probe that the credential still works.
    async fn ping(&self, account: &Account) -> bool;
}

/// HTTP client for the scraping service's account endpoints.
pub struct HttpQuotaApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuotaApi {
    pub fn new() -> Self {
        Self::with_base_url("https://api.apify.com".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

impl Default for HttpQuotaApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuotaApi for HttpQuotaApi {
    async fn usage(&self, account: &Account) -> Result<DollarQuota, AccountError> {
        #[derive(Deserialize)]
        struct LimitsEnvelope {
            data: LimitsData,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LimitsData {
            limits: Limits,
            current: Current,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Limits {
            max_monthly_usage_usd: Decimal,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Current {
            monthly_usage_usd: Decimal,
        }

        let response = self
            .client
            .get(format!("{}/v2/users/me/limits", self.base_url))
            .bearer_auth(account.token.expose_secret())
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| AccountError::QuotaReadFailed {
                account: account.label.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AccountError::QuotaReadFailed {
                account: account.label.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let envelope: LimitsEnvelope =
            response
                .json()
                .await
                .map_err(|e| AccountError::QuotaReadFailed {
                    account: account.label.clone(),
                    reason: e.to_string(),
                })?;

        Ok(DollarQuota {
            used: envelope.data.current.monthly_usage_usd,
            limit: envelope.data.limits.max_monthly_usage_usd,
        })
    }

    async fn ping(&self, account: &Account) -> bool {
        self.client
            .get(format!("{}/v2/acts", self.base_url))
            .query(&[("limit", "1")])
            .bearer_auth(account.token.expose_secret())
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Pool of accounts with quota-aware selection.
pub struct AccountPool {
    accounts: Vec<Account>,
    api: Arc<dyn QuotaApi>,
    store: Arc<dyn UsageStore>,
    credit_threshold: Decimal,
    call_limit: u32,
}

impl AccountPool {
    pub fn new(
        credentials: Vec<ScraperCredential>,
        api: Arc<dyn QuotaApi>,
        store: Arc<dyn UsageStore>,
        credit_threshold: Decimal,
    ) -> Self {
        let accounts: Vec<Account> = credentials.into_iter().map(Account::from).collect();
        info!(count = accounts.len(), "loaded scraping-service accounts");
        Self {
            accounts,
            api,
            store,
            credit_threshold,
            call_limit: DEFAULT_CALL_LIMIT,
        }
    }

    pub fn with_call_limit(mut self, call_limit: u32) -> Self {
        self.call_limit = call_limit;
        self
    }

    /// The statically configured fallback credential used when the pool
    /// reports no capacity: the first loaded account.
    pub fn fallback_account(&self) -> Option<Account> {
        self.accounts.first().cloned()
    }

    /// Select the single best-eligible account for `criterion`.
    ///
    /// Quota eligibility is evaluated before the liveness probe; a failed
    /// quota read excludes the account for this selection only. Returns
    /// `AccountError::NoCapacity` when nothing qualifies.
    pub async fn select(&self, criterion: PoolCriterion) -> Result<Account, AccountError> {
        match criterion {
            PoolCriterion::Dollars => self.select_by_dollars().await,
            PoolCriterion::Calls => self.select_by_calls().await,
        }
    }

    async fn select_by_dollars(&self) -> Result<Account, AccountError> {
        let mut eligible: Vec<(&Account, DollarQuota)> = Vec::new();

        for account in self.accounts.iter().filter(|a| a.active) {
            let quota = match self.api.usage(account).await {
                Ok(quota) => quota,
                Err(e) => {
                    warn!(account = %account.label, error = %e, "quota read failed, skipping");
                    continue;
                }
            };

            // Eligible only while remaining balance stays above the floor
            // implied by the configured threshold.
            let floor = quota.limit - self.credit_threshold;
            if quota.remaining() <= floor {
                debug!(
                    account = %account.label,
                    remaining = %quota.remaining(),
                    %floor,
                    "below credit threshold, skipping"
                );
                continue;
            }

            if !self.api.ping(account).await {
                warn!(account = %account.label, "liveness probe failed, skipping");
                continue;
            }

            eligible.push((account, quota));
        }

        let Some((best, quota)) = eligible
            .into_iter()
            .max_by(|a, b| a.1.remaining().cmp(&b.1.remaining()))
        else {
            return Err(AccountError::NoCapacity {
                criterion: PoolCriterion::Dollars.as_str().to_string(),
                threshold: self.credit_threshold,
            });
        };

        info!(
            account = %best.label,
            remaining = %quota.remaining(),
            "selected account (dollar mode)"
        );

        let entry = CreditLogEntry {
            timestamp: Utc::now(),
            account: best.label.clone(),
            used_usd: quota.used,
            limit_usd: quota.limit,
            remaining_usd: quota.remaining(),
        };
        if let Err(e) = self.store.append_credit_log(entry).await {
            warn!(error = %e, "could not append credit log entry");
        }

        Ok(best.clone())
    }

    async fn select_by_calls(&self) -> Result<Account, AccountError> {
        let month = Utc::now().format("%Y-%m").to_string();
        let mut usage = self.store.load().await.unwrap_or_default();

        let mut eligible: Vec<(&Account, u32, u32)> = Vec::new();

        for account in self.accounts.iter().filter(|a| a.active) {
            let entry = usage
                .entry(account.id.to_string())
                .or_insert_with(|| AccountUsage::new(self.call_limit, &month));
            entry.roll_over(&month);

            let remaining = entry.remaining();
            if remaining == 0 {
                debug!(account = %account.label, "call allowance exhausted, skipping");
                continue;
            }

            if !self.api.ping(account).await {
                warn!(account = %account.label, "liveness probe failed, skipping");
                continue;
            }

            eligible.push((account, remaining, rand::random()));
        }

        // Persist any month roll-overs applied above.
        if let Err(e) = self.store.save(&usage).await {
            warn!(error = %e, "could not persist usage counters");
        }

        let Some((best, remaining, _)) = eligible
            .into_iter()
            .max_by_key(|(_, remaining, tiebreak)| (*remaining, *tiebreak))
        else {
            return Err(AccountError::NoCapacity {
                criterion: PoolCriterion::Calls.as_str().to_string(),
                threshold: Decimal::ZERO,
            });
        };

        info!(account = %best.label, remaining, "selected account (call mode)");
        Ok(best.clone())
    }

    /// Record one consumed call against an account and persist the counters.
    pub async fn record_call(&self, account: &Account) -> Result<(), AccountError> {
        let month = Utc::now().format("%Y-%m").to_string();
        let mut usage = self.store.load().await?;
        let entry = usage
            .entry(account.id.to_string())
            .or_insert_with(|| AccountUsage::new(self.call_limit, &month));
        entry.roll_over(&month);
        entry.calls_used += 1;
        info!(
            account = %account.label,
            used = entry.calls_used,
            limit = entry.calls_limit,
            "recorded scrape call"
        );
        self.store.save(&usage).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use rust_decimal_macros::dec;
    use usage::MemoryStore;

    /// Scripted quota API that counts liveness probes.
    struct FakeQuotaApi {
        quotas: Mutex<std::collections::HashMap<u8, Result<DollarQuota, ()>>>,
        alive: bool,
        pings: AtomicUsize,
    }

    impl FakeQuotaApi {
        fn new(alive: bool) -> Self {
            Self {
                quotas: Mutex::new(std::collections::HashMap::new()),
                alive,
                pings: AtomicUsize::new(0),
            }
        }

        fn set_quota(&self, id: u8, used: Decimal, limit: Decimal) {
            self.quotas
                .lock()
                .unwrap()
                .insert(id, Ok(DollarQuota { used, limit }));
        }

        fn set_unreadable(&self, id: u8) {
            self.quotas.lock().unwrap().insert(id, Err(()));
        }
    }

    #[async_trait]
    impl QuotaApi for FakeQuotaApi {
        async fn usage(&self, account: &Account) -> Result<DollarQuota, AccountError> {
            match self.quotas.lock().unwrap().get(&account.id) {
                Some(Ok(quota)) => Ok(*quota),
                _ => Err(AccountError::QuotaReadFailed {
                    account: account.label.clone(),
                    reason: "scripted failure".into(),
                }),
            }
        }

        async fn ping(&self, _account: &Account) -> bool {
            self.pings.fetch_add(1, Ordering::SeqCst);
            self.alive
        }
    }

    fn credentials(n: u8) -> Vec<ScraperCredential> {
        (1..=n)
            .map(|slot| ScraperCredential {
                slot,
                label: format!("Account_{slot}"),
                token: SecretString::from(format!("token-{slot}")),
            })
            .collect()
    }

    #[tokio::test]
    async fn dollar_mode_picks_most_remaining() {
        let api = Arc::new(FakeQuotaApi::new(true));
        api.set_quota(1, dec!(2.00), dec!(5.00));
        api.set_quota(2, dec!(0.50), dec!(5.00));
        api.set_quota(3, dec!(4.00), dec!(5.00));

        let store = Arc::new(MemoryStore::new());
        let pool = AccountPool::new(credentials(3), api, Arc::clone(&store) as _, dec!(4.85));

        let selected = pool.select(PoolCriterion::Dollars).await.unwrap();
        assert_eq!(selected.id, 2);
        // A usage-log entry was appended for the chosen account.
        assert_eq!(store.log_len(), 1);
    }

    #[tokio::test]
    async fn dollar_mode_all_below_threshold_probes_nothing() {
        let api = Arc::new(FakeQuotaApi::new(true));
        // threshold 4.85 on a 5.00 limit → eligible only while used < 4.85
        api.set_quota(1, dec!(4.90), dec!(5.00));
        api.set_quota(2, dec!(4.99), dec!(5.00));

        let pool = AccountPool::new(
            credentials(2),
            Arc::clone(&api) as _,
            Arc::new(MemoryStore::new()),
            dec!(4.85),
        );

        let err = pool.select(PoolCriterion::Dollars).await.unwrap_err();
        assert!(matches!(err, AccountError::NoCapacity { .. }));
        assert_eq!(api.pings.load(Ordering::SeqCst), 0, "no liveness probes expected");
    }

    #[tokio::test]
    async fn dollar_mode_failed_quota_read_excludes_account() {
        let api = Arc::new(FakeQuotaApi::new(true));
        api.set_unreadable(1);
        api.set_quota(2, dec!(1.00), dec!(5.00));

        let pool = AccountPool::new(
            credentials(2),
            api,
            Arc::new(MemoryStore::new()),
            dec!(4.85),
        );
        let selected = pool.select(PoolCriterion::Dollars).await.unwrap();
        assert_eq!(selected.id, 2);
    }

    #[tokio::test]
    async fn dollar_mode_dead_accounts_fail_selection() {
        let api = Arc::new(FakeQuotaApi::new(false));
        api.set_quota(1, dec!(1.00), dec!(5.00));

        let pool = AccountPool::new(
            credentials(1),
            api,
            Arc::new(MemoryStore::new()),
            dec!(4.85),
        );
        let err = pool.select(PoolCriterion::Dollars).await.unwrap_err();
        assert!(matches!(err, AccountError::NoCapacity { .. }));
    }

    #[tokio::test]
    async fn call_mode_skips_exhausted_accounts() {
        let api = Arc::new(FakeQuotaApi::new(true));
        let store = Arc::new(MemoryStore::new());

        let mut usage = std::collections::HashMap::new();
        let month = Utc::now().format("%Y-%m").to_string();
        usage.insert(
            "1".to_string(),
            AccountUsage {
                calls_used: 8,
                calls_limit: 8,
                last_reset: month.clone(),
            },
        );
        usage.insert("2".to_string(), AccountUsage::new(8, &month));
        store.save(&usage).await.unwrap();

        let pool = AccountPool::new(credentials(2), api, store, dec!(4.85));
        let selected = pool.select(PoolCriterion::Calls).await.unwrap();
        assert_eq!(selected.id, 2);
    }

    #[tokio::test]
    async fn call_mode_no_allowance_is_no_capacity() {
        let api = Arc::new(FakeQuotaApi::new(true));
        let store = Arc::new(MemoryStore::new());

        let month = Utc::now().format("%Y-%m").to_string();
        let mut usage = std::collections::HashMap::new();
        usage.insert(
            "1".to_string(),
            AccountUsage {
                calls_used: 8,
                calls_limit: 8,
                last_reset: month,
            },
        );
        store.save(&usage).await.unwrap();

        let pool = AccountPool::new(credentials(1), api, store, dec!(4.85));
        let err = pool.select(PoolCriterion::Calls).await.unwrap_err();
        assert!(matches!(err, AccountError::NoCapacity { .. }));
    }

    #[tokio::test]
    async fn record_call_increments_and_persists() {
        let api = Arc::new(FakeQuotaApi::new(true));
        let store = Arc::new(MemoryStore::new());
        let pool = AccountPool::new(credentials(1), api, Arc::clone(&store) as _, dec!(4.85));

        let account = pool.select(PoolCriterion::Calls).await.unwrap();
        pool.record_call(&account).await.unwrap();
        pool.record_call(&account).await.unwrap();

        let usage = store.load().await.unwrap();
        assert_eq!(usage.get("1").unwrap().calls_used, 2);
    }

    #[tokio::test]
    async fn call_mode_resets_on_month_roll_over() {
        let api = Arc::new(FakeQuotaApi::new(true));
        let store = Arc::new(MemoryStore::new());

        let mut usage = std::collections::HashMap::new();
        usage.insert(
            "1".to_string(),
            AccountUsage {
                calls_used: 8,
                calls_limit: 8,
                last_reset: "1999-01".to_string(),
            },
        );
        store.save(&usage).await.unwrap();

        let pool = AccountPool::new(credentials(1), api, Arc::clone(&store) as _, dec!(4.85));
        let selected = pool.select(PoolCriterion::Calls).await.unwrap();
        assert_eq!(selected.id, 1, "stale month must reset the counter");

        let usage = store.load().await.unwrap();
        assert_eq!(usage.get("1").unwrap().calls_used, 0);
    }
}
