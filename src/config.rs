//! Configuration, sourced from the environment.
//!
//! All credentials are read once at startup; a missing required value aborts
//! before any network activity. Optional knobs fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default credit threshold for dollar-mode account selection.
pub const DEFAULT_CREDIT_THRESHOLD: Decimal = dec!(4.85);

/// Pause between workflow phases.
pub const DEFAULT_PHASE_COOLDOWN: Duration = Duration::from_secs(3);

/// SMTP transport configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_name: String,
    pub from_address: String,
}

/// One credentialed slot for the scraping service.
#[derive(Debug, Clone)]
pub struct ScraperCredential {
    pub slot: u8,
    pub label: String,
    pub token: SecretString,
}

/// Full pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Numbered scraping-service credentials, in slot order.
    pub scraper_credentials: Vec<ScraperCredential>,
    /// Deliverability-check API key.
    pub verifier_api_key: SecretString,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Outbound mail transport.
    pub smtp: SmtpConfig,
    /// Every outreach email goes to this address (test-mode recipient).
    pub outreach_recipient: String,
    /// Directory for the usage file, credit log, and run reports.
    pub data_dir: PathBuf,
    /// Minimum remaining balance for dollar-mode account eligibility.
    pub credit_threshold: Decimal,
    /// When true, external verification failures degrade to "accept".
    pub optimistic_verification: bool,
    /// Pause inserted between workflow phases.
    pub phase_cooldown: Duration,
}

impl Settings {
    /// Build settings from environment variables.
    ///
    /// Required: at least one `SCRAPER_TOKEN_<n>` (or `SCRAPER_TOKEN`),
    /// `VERIFIER_API_KEY`, `OPENAI_API_KEY`, `SMTP_HOST`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `OUTREACH_RECIPIENT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let scraper_credentials = load_scraper_credentials();

        let mut missing = Vec::new();
        if scraper_credentials.is_empty() {
            missing.push("SCRAPER_TOKEN_1");
        }

        let verifier_api_key = require(&mut missing, "VERIFIER_API_KEY");
        let llm_api_key = require(&mut missing, "OPENAI_API_KEY");
        let smtp_host = require(&mut missing, "SMTP_HOST");
        let smtp_username = require(&mut missing, "SMTP_USERNAME");
        let smtp_password = require(&mut missing, "SMTP_PASSWORD");
        let outreach_recipient = require(&mut missing, "OUTREACH_RECIPIENT");

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing.join(", ")));
        }

        let smtp_port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let smtp_username = smtp_username.expect("checked above");
        let from_address =
            std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| smtp_username.clone());
        let from_name =
            std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Leadscout Outreach".to_string());

        let model =
            std::env::var("LEADSCOUT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let data_dir = std::env::var("LEADSCOUT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        // Pessimistic mode is opt-in; the shipped policy is optimistic
        // degradation on verifier failure.
        let optimistic_verification = std::env::var("LEADSCOUT_PESSIMISTIC")
            .map(|v| v != "1" && !v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Ok(Self {
            scraper_credentials,
            verifier_api_key: SecretString::from(verifier_api_key.expect("checked above")),
            llm: LlmConfig {
                backend: LlmBackend::OpenAi,
                api_key: SecretString::from(llm_api_key.expect("checked above")),
                model,
            },
            smtp: SmtpConfig {
                host: smtp_host.expect("checked above"),
                port: smtp_port,
                username: smtp_username,
                password: SecretString::from(smtp_password.expect("checked above")),
                from_name,
                from_address,
            },
            outreach_recipient: outreach_recipient.expect("checked above"),
            data_dir,
            credit_threshold: DEFAULT_CREDIT_THRESHOLD,
            optimistic_verification,
            phase_cooldown: DEFAULT_PHASE_COOLDOWN,
        })
    }
}

fn require(missing: &mut Vec<&'static str>, key: &'static str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            missing.push(key);
            None
        }
    }
}

/// Load numbered scraping-service credentials (`SCRAPER_TOKEN_1..=10`),
/// falling back to a single unnumbered `SCRAPER_TOKEN` slot.
fn load_scraper_credentials() -> Vec<ScraperCredential> {
    let mut credentials = Vec::new();
    for slot in 1..=10u8 {
        if let Ok(token) = std::env::var(format!("SCRAPER_TOKEN_{slot}")) {
            let token = token.trim().trim_matches('"').trim_matches('\'').to_string();
            if token.is_empty() {
                continue;
            }
            credentials.push(ScraperCredential {
                slot,
                label: format!("Account_{slot}"),
                token: SecretString::from(token),
            });
        }
    }

    if credentials.is_empty() {
        if let Ok(token) = std::env::var("SCRAPER_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                credentials.push(ScraperCredential {
                    slot: 0,
                    label: "Main_Account".to_string(),
                    token: SecretString::from(token),
                });
            }
        }
    }

    credentials
}
