//! Workflow orchestration: website scrape → LinkedIn pipeline (or website
//! fallback) → outreach.
//!
//! Strictly sequential. Each phase's failure is caught at this boundary and
//! becomes a fallback path or a terminal status; nothing below retries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::{AccountPool, PoolCriterion};
use crate::extract::{self, StaffExtractor};
use crate::mail::{MailTransport, OutreachComposer};
use crate::model::{Contact, ContactSource, EmailSource, SentEmail};
use crate::patterns::{candidate_emails, EmailTemplate};
use crate::scoring::{pattern_test_priority, relevance_score};
use crate::scrape::website::{domain_of, find_linkedin_url, harvest_emails, name_from_email};
use crate::scrape::{EmployeeScraper, PageCapture, SiteScraper};
use crate::verifier::VerificationGate;

/// How many top-priority contacts are probed against the candidate list
/// before giving up on learning a pattern.
const MAX_PATTERN_PROBES: usize = 5;

/// How many ranked contacts receive outreach.
const MAX_OUTREACH_TARGETS: usize = 3;

/// Terminal (and initial) workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Started,
    FailedNoLinkedin,
    FailedNoContacts,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::FailedNoLinkedin => "failed_no_linkedin",
            Self::FailedNoContacts => "failed_no_contacts",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Which branch produced the final contact list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPath {
    Unknown,
    LinkedinPipeline,
    WebsiteFallback,
}

/// Result of one workflow run.
#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub id: Uuid,
    pub website_url: String,
    pub domain: String,
    pub linkedin_url: Option<String>,
    pub website_staff: Vec<Contact>,
    pub contacts: Vec<Contact>,
    pub emails_sent: Vec<SentEmail>,
    pub path: WorkflowPath,
    pub status: WorkflowStatus,
    pub error: Option<String>,
}

impl WorkflowReport {
    fn new(website_url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            website_url: website_url.to_string(),
            domain: domain_of(website_url),
            linkedin_url: None,
            website_staff: Vec::new(),
            contacts: Vec::new(),
            emails_sent: Vec::new(),
            path: WorkflowPath::Unknown,
            status: WorkflowStatus::Started,
            error: None,
        }
    }
}

/// The orchestrator. Owns every collaborator behind its trait seam.
pub struct Workflow {
    pub pool: AccountPool,
    pub site: Arc<dyn SiteScraper>,
    pub employees: Arc<dyn EmployeeScraper>,
    pub gate: VerificationGate,
    pub extractor: StaffExtractor,
    pub composer: OutreachComposer,
    pub transport: Arc<dyn MailTransport>,
    /// Test-mode recipient; every outreach email goes here.
    pub recipient: String,
    /// Pause between phases.
    pub cooldown: Duration,
}

impl Workflow {
    /// Run the full pipeline for one website.
    pub async fn run(&self, website_url: &str) -> WorkflowReport {
        let mut report = WorkflowReport::new(website_url);
        info!(url = website_url, domain = %report.domain, "workflow started");

        // ── Phase 1: website scrape ─────────────────────────────────
        let captures = match self.website_phase(&mut report).await {
            Ok(captures) => captures,
            Err(message) => {
                report.status = WorkflowStatus::Failed;
                report.error = Some(message);
                return report;
            }
        };

        let page_text: String = captures
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        report.website_staff = self.website_staff(&page_text, &report.domain).await;
        report.linkedin_url = find_linkedin_url(&captures);

        let Some(linkedin_url) = report.linkedin_url.clone() else {
            info!("no LinkedIn page found, terminating");
            report.status = WorkflowStatus::FailedNoLinkedin;
            return report;
        };

        // Rate-limiting courtesy delay between phases.
        tokio::time::sleep(self.cooldown).await;

        // ── Phase 2: LinkedIn pipeline, website fallback on failure ─
        let domain = report.domain.clone();
        let targets = match self.linkedin_pipeline(&linkedin_url, &domain).await {
            Ok(targets) if !targets.is_empty() => {
                report.path = WorkflowPath::LinkedinPipeline;
                targets
            }
            Ok(_) => {
                info!("LinkedIn pipeline found no contacts, using website fallback");
                report.path = WorkflowPath::WebsiteFallback;
                self.website_fallback(&report.website_staff, &page_text, &domain)
                    .await
            }
            Err(message) => {
                warn!(error = %message, "LinkedIn pipeline failed, using website fallback");
                report.path = WorkflowPath::WebsiteFallback;
                self.website_fallback(&report.website_staff, &page_text, &domain)
                    .await
            }
        };

        if targets.is_empty() {
            report.status = WorkflowStatus::FailedNoContacts;
            return report;
        }
        report.contacts = targets;

        // ── Phase 3: outreach ───────────────────────────────────────
        report.emails_sent = self.outreach_phase(&report.contacts).await;
        report.status = WorkflowStatus::Completed;
        info!(
            sent = report.emails_sent.len(),
            path = ?report.path,
            "workflow completed"
        );
        report
    }

    /// Select an account (dollar mode, static fallback) and crawl the site.
    async fn website_phase(&self, report: &mut WorkflowReport) -> Result<Vec<PageCapture>, String> {
        let account = match self.pool.select(PoolCriterion::Dollars).await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "no pooled capacity, trying static fallback credential");
                self.pool
                    .fallback_account()
                    .ok_or_else(|| format!("website phase: {e}"))?
            }
        };

        self.site
            .crawl(&account, &report.website_url)
            .await
            .map_err(|e| format!("website crawl: {e}"))
    }

    /// Extract website staff as contacts (no emails yet).
    async fn website_staff(&self, page_text: &str, domain: &str) -> Vec<Contact> {
        let entries = self.extractor.extract(page_text, domain).await;
        entries
            .iter()
            .filter_map(|entry| {
                Contact::from_name(&entry.name, &entry.position, domain, ContactSource::Website)
            })
            .map(|mut contact| {
                contact.priority = pattern_test_priority(&contact.title);
                contact.relevance = relevance_score(&contact.name, &contact.title, "");
                contact
            })
            .collect()
    }

    /// Scrape employees, learn and replay an email pattern, rank targets.
    async fn linkedin_pipeline(
        &self,
        linkedin_url: &str,
        domain: &str,
    ) -> Result<Vec<Contact>, String> {
        let account = self
            .pool
            .select(PoolCriterion::Calls)
            .await
            .map_err(|e| format!("linkedin account: {e}"))?;

        let profiles = self
            .employees
            .company_employees(&account, linkedin_url)
            .await
            .map_err(|e| format!("employee listing: {e}"))?;

        if let Err(e) = self.pool.record_call(&account).await {
            warn!(error = %e, "could not record scrape call");
        }

        let mut provider_emails: Vec<(usize, String)> = Vec::new();
        let mut contacts: Vec<Contact> = Vec::new();
        for profile in &profiles {
            let name = profile.full_name();
            if !extract::looks_like_person(&name) {
                info!(%name, "skipping non-person listing entry");
                continue;
            }
            let Some(mut contact) =
                Contact::from_name(&name, &profile.headline, domain, ContactSource::Linkedin)
            else {
                continue;
            };
            contact.priority = pattern_test_priority(&contact.title);
            contact.relevance = relevance_score(&contact.name, &contact.title, "");
            if let Some(email) = &profile.email {
                provider_emails.push((contacts.len(), email.to_lowercase()));
            }
            contacts.push(contact);
        }

        // A template only ever derives from an accepted verification: check
        // provider-supplied addresses first, then probe candidates by
        // priority until one address verifies.
        let mut template: Option<EmailTemplate> = None;
        for (index, email) in provider_emails {
            if !self.gate.verify(&email).await {
                continue;
            }
            let contact = &mut contacts[index];
            contact.set_email(email.clone(), EmailSource::Provider);
            if template.is_none() {
                template = EmailTemplate::learn(
                    &email,
                    &contact.first_name,
                    &contact.last_name,
                    domain,
                );
                if let Some(t) = &template {
                    info!(template = %t, "learned pattern from provider email");
                }
            }
        }

        if template.is_none() {
            template = self.probe_candidates(&mut contacts, domain).await;
        }

        if let Some(template) = &template {
            self.apply_template(template, &mut contacts, domain).await;
        }

        Ok(select_targets(&contacts))
    }

    /// Probe the fixed candidate list on the highest-priority contacts until
    /// one address verifies; learn the template from it.
    async fn probe_candidates(
        &self,
        contacts: &mut [Contact],
        domain: &str,
    ) -> Option<EmailTemplate> {
        let mut order: Vec<usize> = (0..contacts.len())
            .filter(|&i| contacts[i].email.is_none())
            .collect();
        order.sort_by(|&a, &b| contacts[b].priority.cmp(&contacts[a].priority));

        for &index in order.iter().take(MAX_PATTERN_PROBES) {
            let (first, last) = (
                contacts[index].first_name.clone(),
                contacts[index].last_name.clone(),
            );
            let candidates = candidate_emails(&first, &last, domain);
            info!(
                contact = %contacts[index].name,
                count = candidates.len(),
                "probing candidate addresses"
            );
            for (position, candidate) in candidates.iter().enumerate() {
                if !self.gate.verify(candidate).await {
                    continue;
                }
                contacts[index]
                    .set_email(candidate.clone(), EmailSource::Candidate(position + 1));
                let template = EmailTemplate::learn(candidate, &first, &last, domain);
                if let Some(t) = &template {
                    info!(template = %t, candidate = %candidate, "learned pattern from candidate");
                }
                return template;
            }
        }
        None
    }

    /// Replay the learned template for contacts still missing an address.
    /// Every produced candidate re-passes the gate before being kept.
    async fn apply_template(
        &self,
        template: &EmailTemplate,
        contacts: &mut [Contact],
        domain: &str,
    ) {
        for contact in contacts.iter_mut().filter(|c| c.email.is_none()) {
            let Some(candidate) =
                template.apply(&contact.first_name, &contact.last_name, domain)
            else {
                continue;
            };
            if self.gate.verify(&candidate).await {
                info!(contact = %contact.name, email = %candidate, "pattern applied");
                contact.set_email(candidate, EmailSource::Pattern);
            }
        }
    }

    /// Fallback: website staff plus addresses harvested from page content.
    async fn website_fallback(
        &self,
        website_staff: &[Contact],
        page_text: &str,
        domain: &str,
    ) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = website_staff.to_vec();

        // Probe the single top-priority person, then replay any learned
        // pattern over the rest.
        if let Some(template) = self.probe_candidates(&mut contacts, domain).await {
            self.apply_template(&template, &mut contacts, domain).await;
        }

        for email in harvest_emails(page_text) {
            if contacts.iter().any(|c| c.email.as_deref() == Some(email.as_str())) {
                continue;
            }
            if !self.gate.verify(&email).await {
                continue;
            }
            let name = name_from_email(&email);
            let tokens: Vec<&str> = name.split_whitespace().collect();
            let mut contact = Contact {
                name: name.clone(),
                first_name: tokens.first().unwrap_or(&"").to_string(),
                last_name: tokens.get(1..).and_then(|t| t.last()).unwrap_or(&"").to_string(),
                title: String::new(),
                description: String::new(),
                email: None,
                email_source: None,
                relevance: relevance_score(&name, "", ""),
                priority: 0,
                source: ContactSource::Website,
                domain: domain.to_string(),
            };
            contact.set_email(email, EmailSource::Harvested);
            contacts.push(contact);
        }

        select_targets(&contacts)
    }

    /// Compose and send one outreach email per target, all to the injected
    /// recipient. Send failures are recorded, never propagated.
    async fn outreach_phase(&self, targets: &[Contact]) -> Vec<SentEmail> {
        let mut sent = Vec::new();
        for contact in targets {
            let Some(contact_email) = &contact.email else {
                continue;
            };
            let email = self.composer.compose(contact).await;
            let delivered = match self
                .transport
                .send(&self.recipient, &email.subject, &email.body)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(contact = %contact.name, error = %e, "outreach send failed");
                    false
                }
            };
            sent.push(SentEmail {
                contact_name: contact.name.clone(),
                contact_email: contact_email.clone(),
                recipient: self.recipient.clone(),
                subject: email.subject,
                delivered,
            });
        }
        sent
    }
}

/// Rank contacts holding a verified address by relevance and keep the top
/// few; candidate-list order already acts as the low-priority tiebreaker
/// through the stable sort.
fn select_targets(contacts: &[Contact]) -> Vec<Contact> {
    let mut with_emails: Vec<Contact> = contacts
        .iter()
        .filter(|c| c.email.is_some())
        .cloned()
        .collect();
    with_emails.sort_by(|a, b| b.relevance.cmp(&a.relevance));
    with_emails.truncate(MAX_OUTREACH_TARGETS);
    with_emails
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, relevance: u8, email: Option<&str>) -> Contact {
        let mut c =
            Contact::from_name(name, "Role", "example.com", ContactSource::Linkedin).unwrap();
        c.relevance = relevance;
        if let Some(email) = email {
            c.set_email(email.to_string(), EmailSource::Provider);
        }
        c
    }

    #[test]
    fn select_targets_ranks_by_relevance_and_caps() {
        let contacts = vec![
            contact("Al Aa", 55, Some("al@example.com")),
            contact("Bo Bb", 90, Some("bo@example.com")),
            contact("Cy Cc", 70, Some("cy@example.com")),
            contact("Di Dd", 100, None),
            contact("Ed Ee", 60, Some("ed@example.com")),
        ];
        let targets = select_targets(&contacts);
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].name, "Bo Bb");
        assert_eq!(targets[1].name, "Cy Cc");
        assert_eq!(targets[2].name, "Ed Ee");
    }

    #[test]
    fn select_targets_skips_contacts_without_email() {
        let contacts = vec![contact("Di Dd", 100, None)];
        assert!(select_targets(&contacts).is_empty());
    }

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(WorkflowStatus::FailedNoLinkedin.as_str(), "failed_no_linkedin");
        assert_eq!(WorkflowStatus::Completed.as_str(), "completed");
        assert_eq!(WorkflowStatus::FailedNoContacts.as_str(), "failed_no_contacts");
    }
}
