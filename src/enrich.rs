use tracing::{debug, info, warn};

use crate::links::normalize_url;
use crate::models::{Company, CompanyField, EnrichmentStage, EnrichmentTask, StageOutcome};
use crate::pipeline::PipelineContext;

/// Drive one company through every stage. Never fails: each stage logs its
/// own errors and records them on the returned task.
pub async fn enrich_company(ctx: &PipelineContext, name: &str) -> EnrichmentTask {
    let company = match ctx.db.get_company(name) {
        Ok(Some(company)) => company,
        Ok(None) => return abandoned(name, "company is not stored"),
        Err(e) => {
            warn!(company = %name, error = %e, "Failed to load company");
            return abandoned(name, &e.to_string());
        }
    };

    let mut task = EnrichmentTask::new(company);
    if task.company.is_fully_enriched() {
        debug!(company = %name, "Already enriched");
        task.website = StageOutcome::Skipped;
        task.jobs_board = StageOutcome::Skipped;
        task.careers = StageOutcome::Skipped;
        task.stage = EnrichmentStage::Complete;
        return task;
    }

    info!(company = %name, "Enriching company");
    let (website, jobs_board) = tokio::join!(
        lookup_website(ctx, &task.company),
        lookup_jobs_board(ctx, &task.company),
    );
    task.website = website;
    task.jobs_board = jobs_board;
    task.stage = EnrichmentStage::LookupsJoined;

    match ctx.db.get_company(name) {
        Ok(Some(company)) => task.company = company,
        Ok(None) => {
            warn!(company = %name, "Company was deleted during enrichment");
            task.careers = StageOutcome::Failed("company is not stored".to_string());
            task.stage = EnrichmentStage::Complete;
            return task;
        }
        Err(e) => warn!(company = %name, error = %e, "Failed to reload company, using stale copy"),
    }

    task.careers = resolve_careers(ctx, &mut task.company).await;
    task.stage = EnrichmentStage::Complete;

    info!(
        company = %name,
        website = ?task.website,
        jobs_board = ?task.jobs_board,
        careers = ?task.careers,
        "Company enriched"
    );
    task
}

fn abandoned(name: &str, reason: &str) -> EnrichmentTask {
    let mut task = EnrichmentTask::new(Company::named(name));
    task.website = StageOutcome::Failed(reason.to_string());
    task.jobs_board = StageOutcome::Failed(reason.to_string());
    task.careers = StageOutcome::Failed(reason.to_string());
    task.stage = EnrichmentStage::Complete;
    task
}

/// Website and professional-network URL from the registry, behind the
/// rate-limit policy.
async fn lookup_website(ctx: &PipelineContext, company: &Company) -> StageOutcome {
    if !company.website_url.is_empty() && !company.linkedin_url.is_empty() {
        return StageOutcome::Skipped;
    }

    let registry = ctx.providers.registry.as_ref();
    let key = company.name.as_str();
    let found = ctx
        .settings
        .rate_limit
        .run(key, move || registry.lookup(key))
        .await;

    let profile = match found {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            debug!(company = %company.name, provider = registry.name(), "No registry entry");
            return StageOutcome::NotFound;
        }
        Err(e) => {
            warn!(company = %company.name, provider = registry.name(), error = %e, "Registry lookup failed");
            return StageOutcome::Failed(e.to_string());
        }
    };

    let mut outcome = StageOutcome::NotFound;
    for (field, value) in [
        (CompanyField::Website, profile.website),
        (CompanyField::LinkedIn, profile.linkedin),
    ] {
        match fill_field(ctx, company, field, &value) {
            StageOutcome::Enriched if outcome == StageOutcome::NotFound => outcome = StageOutcome::Enriched,
            failed @ StageOutcome::Failed(_) => outcome = failed,
            _ => {}
        }
    }
    outcome
}

/// Jobs-board profile, validated by the provider against the company name.
async fn lookup_jobs_board(ctx: &PipelineContext, company: &Company) -> StageOutcome {
    if !company.wttj_url.is_empty() {
        return StageOutcome::Skipped;
    }

    let provider = ctx.providers.jobs_board.as_ref();
    match provider.lookup(&company.name).await {
        Ok(Some(url)) => fill_field(ctx, company, CompanyField::JobsBoard, &url),
        Ok(None) => {
            debug!(company = %company.name, provider = provider.name(), "No jobs board profile");
            StageOutcome::NotFound
        }
        Err(e) => {
            warn!(company = %company.name, provider = provider.name(), error = %e, "Jobs board lookup failed");
            StageOutcome::Failed(e.to_string())
        }
    }
}

/// A link on the company website first, then the jobs board, then the
/// professional network.
async fn resolve_careers(ctx: &PipelineContext, company: &mut Company) -> StageOutcome {
    if !company.job_page_url.is_empty() {
        return StageOutcome::Skipped;
    }

    let mut careers = None;
    if !company.website_url.is_empty() {
        let provider = ctx.providers.careers_page.as_ref();
        match provider.lookup(&company.website_url).await {
            Ok(found) => careers = found.and_then(|url| normalize_url(&url)),
            Err(e) => {
                warn!(company = %company.name, provider = provider.name(), error = %e, "Careers page lookup failed")
            }
        }
    }

    let Some(url) = careers.or_else(|| fallback_careers_url(company)) else {
        debug!(company = %company.name, "No careers page");
        return StageOutcome::NotFound;
    };

    let outcome = fill_field(ctx, company, CompanyField::Careers, &url);
    if outcome == StageOutcome::Enriched {
        company.job_page_url = url;
    }
    outcome
}

fn fallback_careers_url(company: &Company) -> Option<String> {
    [&company.wttj_url, &company.linkedin_url]
        .into_iter()
        .filter(|base| !base.is_empty())
        .find_map(|base| normalize_url(&format!("{base}/jobs")))
}

/// Write `value` to `field` if the stored field is still empty.
fn fill_field(ctx: &PipelineContext, company: &Company, field: CompanyField, value: &str) -> StageOutcome {
    if !company.field(field).is_empty() {
        return StageOutcome::Skipped;
    }
    let Some(value) = normalize_url(value) else {
        return StageOutcome::NotFound;
    };

    match ctx.db.update_company_field(&company.name, field, &value) {
        Ok(true) => {
            debug!(company = %company.name, field = field.column(), value = %value, "Field updated");
            StageOutcome::Enriched
        }
        Ok(false) => {
            debug!(company = %company.name, field = field.column(), "Field filled by another run, keeping it");
            StageOutcome::Skipped
        }
        Err(e) => {
            warn!(company = %company.name, field = field.column(), error = %e, "Failed to store field");
            StageOutcome::Failed(e.to_string())
        }
    }
}
