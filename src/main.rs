use std::sync::Arc;

use clap::Parser;
use rust_decimal::Decimal;

use leadscout::accounts::{AccountPool, HttpQuotaApi};
use leadscout::accounts::usage::JsonFileStore;
use leadscout::config::Settings;
use leadscout::extract::StaffExtractor;
use leadscout::llm::create_provider;
use leadscout::mail::{OutreachComposer, SmtpMailer};
use leadscout::scrape::linkedin::HttpEmployeeScraper;
use leadscout::scrape::website::HttpSiteScraper;
use leadscout::verifier::{HttpVerifier, VerificationGate};
use leadscout::workflow::Workflow;

#[derive(Parser)]
#[command(name = "leadscout")]
#[command(about = "Lead-generation pipeline: website → LinkedIn → verified emails → outreach")]
#[command(version)]
struct Cli {
    /// Target website URL
    #[arg(long)]
    url: String,

    /// Minimum remaining balance for dollar-mode account eligibility
    #[arg(long, default_value = "4.85")]
    credit_threshold: Decimal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  Set the missing variables in the environment or .env file");
            std::process::exit(1);
        }
    };
    settings.credit_threshold = cli.credit_threshold;

    eprintln!("leadscout v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Target: {}", cli.url);
    eprintln!("   Accounts: {}", settings.scraper_credentials.len());
    eprintln!("   Credit threshold: ${}", settings.credit_threshold);
    eprintln!("   Model: {}", settings.llm.model);
    eprintln!("   Test recipient: {}\n", settings.outreach_recipient);

    let llm = create_provider(&settings.llm)?;

    let store = Arc::new(JsonFileStore::new(settings.data_dir.clone()));
    let pool = AccountPool::new(
        settings.scraper_credentials.clone(),
        Arc::new(HttpQuotaApi::new()),
        store,
        settings.credit_threshold,
    );

    let gate = VerificationGate::new(
        Arc::new(HttpVerifier::new(settings.verifier_api_key.clone())),
        settings.optimistic_verification,
    );

    let workflow = Workflow {
        pool,
        site: Arc::new(HttpSiteScraper::new()),
        employees: Arc::new(HttpEmployeeScraper::new()),
        gate,
        extractor: StaffExtractor::new(Arc::clone(&llm)),
        composer: OutreachComposer::new(Arc::clone(&llm), settings.smtp.from_name.clone()),
        transport: Arc::new(SmtpMailer::new(settings.smtp.clone())),
        recipient: settings.outreach_recipient.clone(),
        cooldown: settings.phase_cooldown,
    };

    let report = workflow.run(&cli.url).await;

    // Persist the run report next to the usage files.
    let report_path = settings
        .data_dir
        .join(format!("run_{}.json", report.id.simple()));
    if let Err(e) = tokio::fs::create_dir_all(&settings.data_dir).await {
        eprintln!("Warning: could not create data dir: {e}");
    } else if let Err(e) =
        tokio::fs::write(&report_path, serde_json::to_string_pretty(&report)?).await
    {
        eprintln!("Warning: could not write run report: {e}");
    } else {
        eprintln!("Report saved: {}", report_path.display());
    }

    // ── Summary ─────────────────────────────────────────────────────────
    println!("\nWorkflow summary");
    println!("   Website: {}", report.website_url);
    println!("   Website staff found: {}", report.website_staff.len());
    println!(
        "   LinkedIn URL: {}",
        report.linkedin_url.as_deref().unwrap_or("not found")
    );
    println!("   Path: {:?}", report.path);
    println!("   Status: {}", report.status.as_str());
    println!("   Outreach emails sent: {}", report.emails_sent.len());
    for sent in &report.emails_sent {
        println!(
            "      {} <{}>: \"{}\" ({})",
            sent.contact_name,
            sent.contact_email,
            sent.subject,
            if sent.delivered { "sent" } else { "failed" }
        );
    }
    if let Some(error) = &report.error {
        println!("   Error: {error}");
    }

    Ok(())
}
