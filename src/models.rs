use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    pub is_top_500: bool,
    // URL fields are "" when unknown
    pub website_url: String,
    pub linkedin_url: String,
    pub wttj_url: String,
    pub job_page_url: String,
}

impl Company {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn field(&self, field: CompanyField) -> &str {
        match field {
            CompanyField::Website => &self.website_url,
            CompanyField::LinkedIn => &self.linkedin_url,
            CompanyField::JobsBoard => &self.wttj_url,
            CompanyField::Careers => &self.job_page_url,
        }
    }

    pub fn is_fully_enriched(&self) -> bool {
        CompanyField::ALL.iter().all(|f| !self.field(*f).is_empty())
    }
}

/// The enrichable URL columns of a company row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyField {
    Website,
    LinkedIn,
    JobsBoard,
    Careers,
}

impl CompanyField {
    pub const ALL: [CompanyField; 4] = [
        CompanyField::Website,
        CompanyField::LinkedIn,
        CompanyField::JobsBoard,
        CompanyField::Careers,
    ];

    pub fn column(self) -> &'static str {
        match self {
            CompanyField::Website => "website_url",
            CompanyField::LinkedIn => "linkedin_url",
            CompanyField::JobsBoard => "wttj_url",
            CompanyField::Careers => "job_page_url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOffer {
    pub offer_url: String,
    pub company_name: String,
    pub discovered_at: Option<String>,
}

impl JobOffer {
    pub fn new(company_name: &str, offer_url: &str) -> Self {
        Self {
            offer_url: offer_url.to_string(),
            company_name: company_name.to_string(),
            discovered_at: None,
        }
    }
}

/// Website and professional-network URLs as returned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteProfile {
    pub website: String,
    pub linkedin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStage {
    Pending,
    LookupsJoined,
    /// Careers page persisted, or found already set.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Field(s) were empty and a value was written.
    Enriched,
    /// Everything this stage could write was already populated, no call made.
    Skipped,
    NotFound,
    Failed(String),
}

/// One company's pass through the stage machine. Never persisted.
#[derive(Debug, Clone)]
pub struct EnrichmentTask {
    pub company: Company,
    pub stage: EnrichmentStage,
    pub website: StageOutcome,
    pub jobs_board: StageOutcome,
    pub careers: StageOutcome,
}

impl EnrichmentTask {
    pub fn new(company: Company) -> Self {
        Self {
            company,
            stage: EnrichmentStage::Pending,
            website: StageOutcome::NotFound,
            jobs_board: StageOutcome::NotFound,
            careers: StageOutcome::NotFound,
        }
    }
}
