use regex::Regex;
use tracing::{debug, info, warn};

use crate::models::{Company, JobOffer};
use crate::pipeline::PipelineContext;

/// DevOps and SRE postings, in the spellings careers sites put in their URLs.
pub const DEFAULT_ROLE_PATTERN: &str = r"(?i)(devops|dev_ops|dev-ops|devsecops|dev_sec_ops|dev-sec-ops|sre|site_reliability_engineer|site-reliability-engineer)";

/// Decides which careers-page links are postings for the roles we track.
#[derive(Debug, Clone)]
pub struct RoleFilter {
    pattern: Regex,
}

impl RoleFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

impl Default for RoleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ROLE_PATTERN).expect("default role pattern is valid")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MiningOutcome {
    pub links: usize,
    pub matched: usize,
    pub inserted: usize,
}

/// Scan one company's careers page and store every matching posting.
/// Failures are logged, never returned.
pub async fn mine_company(ctx: &PipelineContext, company: &Company) -> MiningOutcome {
    let mut outcome = MiningOutcome::default();

    if company.job_page_url.is_empty() {
        info!(company = %company.name, "No careers page, skipping offer mining");
        return outcome;
    }

    info!(company = %company.name, url = %company.job_page_url, "Mining job offers");
    let links = match ctx.providers.job_links.lookup(&company.job_page_url).await {
        Ok(Some(links)) => links,
        Ok(None) => {
            info!(company = %company.name, "Careers page could not be loaded");
            return outcome;
        }
        Err(e) => {
            warn!(company = %company.name, error = %e, "Failed to list careers page links");
            return outcome;
        }
    };
    outcome.links = links.len();

    for link in links.iter().filter(|link| ctx.settings.role_filter.matches(link)) {
        outcome.matched += 1;
        match ctx.db.insert_offer(&JobOffer::new(&company.name, link)) {
            Ok(true) => {
                outcome.inserted += 1;
                info!(company = %company.name, offer = %link, "New job offer");
            }
            Ok(false) => debug!(offer = %link, "Offer already known"),
            Err(e) => warn!(company = %company.name, offer = %link, error = %e, "Failed to store offer"),
        }
    }

    outcome
}
