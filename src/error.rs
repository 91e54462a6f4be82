//! Error types for leadscout.

use rust_decimal::Decimal;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {0}")]
    MissingEnvVars(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Account pool errors.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("No account with capacity above threshold {threshold} for {criterion}")]
    NoCapacity { criterion: String, threshold: Decimal },

    #[error("Quota read failed for {account}: {reason}")]
    QuotaReadFailed { account: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Email verification transport errors. The gate itself never surfaces
/// these to callers; they degrade to the configured default verdict.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Verifier request failed: {0}")]
    RequestFailed(String),

    #[error("Verifier returned HTTP {status}")]
    Http { status: u16 },

    #[error("Verifier credential not configured")]
    NoCredential,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scraping-service errors.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Scraper request failed: {0}")]
    RequestFailed(String),

    #[error("Scraper returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Scraper run finished with status {status}")]
    RunFailed { status: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    SendFailed(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
