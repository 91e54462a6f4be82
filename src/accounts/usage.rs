//! Persistence for account usage counters and the credit-monitoring log.
//!
//! The pool talks to an injected `UsageStore` so production writes JSON
//! files under the data dir while tests run against the in-memory backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::AccountError;

/// The credit log keeps only this many most-recent snapshots.
pub const CREDIT_LOG_CAPACITY: usize = 100;

/// Call-count usage for one account. `last_reset` is the `YYYY-MM` month the
/// counter was last zeroed; a new month resets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUsage {
    pub calls_used: u32,
    pub calls_limit: u32,
    pub last_reset: String,
}

impl AccountUsage {
    pub fn new(calls_limit: u32, month: &str) -> Self {
        Self {
            calls_used: 0,
            calls_limit,
            last_reset: month.to_string(),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.calls_limit.saturating_sub(self.calls_used)
    }

    /// Zero the counter when the tracked month has rolled over.
    pub fn roll_over(&mut self, month: &str) {
        if self.last_reset != month {
            self.calls_used = 0;
            self.last_reset = month.to_string();
        }
    }
}

/// One appended quota snapshot for a selected account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub account: String,
    pub used_usd: Decimal,
    pub limit_usd: Decimal,
    pub remaining_usd: Decimal,
}

/// Storage backend for usage counters and the credit log.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Load all usage counters. A missing file is an empty map.
    async fn load(&self) -> Result<HashMap<String, AccountUsage>, AccountError>;

    /// Persist all usage counters.
    async fn save(&self, usage: &HashMap<String, AccountUsage>) -> Result<(), AccountError>;

    /// Append one credit snapshot, truncating to the most recent
    /// [`CREDIT_LOG_CAPACITY`] entries.
    async fn append_credit_log(&self, entry: CreditLogEntry) -> Result<(), AccountError>;
}

/// JSON files under the data directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn usage_path(&self) -> PathBuf {
        self.dir.join("usage_tracking.json")
    }

    fn credit_log_path(&self) -> PathBuf {
        self.dir.join("credit_monitoring_log.json")
    }
}

#[async_trait]
impl UsageStore for JsonFileStore {
    async fn load(&self) -> Result<HashMap<String, AccountUsage>, AccountError> {
        let path = self.usage_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, usage: &HashMap<String, AccountUsage>) -> Result<(), AccountError> {
        fs::create_dir_all(&self.dir).await?;
        let raw = serde_json::to_string_pretty(usage)?;
        fs::write(self.usage_path(), raw).await?;
        Ok(())
    }

    async fn append_credit_log(&self, entry: CreditLogEntry) -> Result<(), AccountError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.credit_log_path();

        let mut entries: Vec<CreditLogEntry> = if path.exists() {
            let raw = fs::read_to_string(&path).await?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        entries.push(entry);
        if entries.len() > CREDIT_LOG_CAPACITY {
            let drop = entries.len() - CREDIT_LOG_CAPACITY;
            entries.drain(..drop);
        }

        let raw = serde_json::to_string_pretty(&entries)?;
        fs::write(&path, raw).await?;
        Ok(())
    }
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryStore {
    usage: Mutex<HashMap<String, AccountUsage>>,
    log: Mutex<Vec<CreditLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_len(&self) -> usize {
        self.log.lock().expect("log lock").len()
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn load(&self) -> Result<HashMap<String, AccountUsage>, AccountError> {
        Ok(self.usage.lock().expect("usage lock").clone())
    }

    async fn save(&self, usage: &HashMap<String, AccountUsage>) -> Result<(), AccountError> {
        *self.usage.lock().expect("usage lock") = usage.clone();
        Ok(())
    }

    async fn append_credit_log(&self, entry: CreditLogEntry) -> Result<(), AccountError> {
        let mut log = self.log.lock().expect("log lock");
        log.push(entry);
        if log.len() > CREDIT_LOG_CAPACITY {
            let drop = log.len() - CREDIT_LOG_CAPACITY;
            log.drain(..drop);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(n: i64) -> CreditLogEntry {
        CreditLogEntry {
            timestamp: Utc::now(),
            account: format!("Account_{n}"),
            used_usd: dec!(1.00),
            limit_usd: dec!(5.00),
            remaining_usd: dec!(4.00),
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_usage() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        let mut usage = HashMap::new();
        usage.insert("1".to_string(), AccountUsage::new(8, "2026-08"));
        usage.insert(
            "2".to_string(),
            AccountUsage {
                calls_used: 3,
                calls_limit: 8,
                last_reset: "2026-08".to_string(),
            },
        );
        store.save(&usage).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, usage);
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credit_log_truncates_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().to_path_buf());

        for n in 0..(CREDIT_LOG_CAPACITY as i64 + 20) {
            store.append_credit_log(snapshot(n)).await.unwrap();
        }

        let raw = std::fs::read_to_string(dir.path().join("credit_monitoring_log.json")).unwrap();
        let entries: Vec<CreditLogEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries.len(), CREDIT_LOG_CAPACITY);
        // Oldest entries were dropped, newest kept.
        assert_eq!(entries.last().unwrap().account, "Account_119");
        assert_eq!(entries.first().unwrap().account, "Account_20");
    }

    #[test]
    fn usage_rolls_over_on_new_month() {
        let mut usage = AccountUsage {
            calls_used: 7,
            calls_limit: 8,
            last_reset: "2026-07".to_string(),
        };
        usage.roll_over("2026-08");
        assert_eq!(usage.calls_used, 0);
        assert_eq!(usage.last_reset, "2026-08");

        usage.calls_used = 2;
        usage.roll_over("2026-08");
        assert_eq!(usage.calls_used, 2, "same month must not reset");
    }
}
