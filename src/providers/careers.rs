use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use url::Url;

use super::Provider;
use crate::browser::{render_page, AutomationEngine, RenderOptions};
use crate::error::ProviderError;
use crate::links::{find_link, normalize_url};

// "carreers" is a misspelling that shows up on real sites
static CAREERS_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(jobs|careers|carreers)").expect("valid careers pattern"));

/// Looks for a careers page linked from a company's own website.
pub struct CareersPageProvider {
    http: Option<reqwest::Client>,
    engine: Arc<dyn AutomationEngine>,
    render: RenderOptions,
}

impl CareersPageProvider {
    pub fn new(http: reqwest::Client, engine: Arc<dyn AutomationEngine>, render: RenderOptions) -> Self {
        Self {
            http: Some(http),
            engine,
            render,
        }
    }

    #[cfg(test)]
    fn offline(engine: Arc<dyn AutomationEngine>, render: RenderOptions) -> Self {
        Self {
            http: None,
            engine,
            render,
        }
    }

    /// A plain GET before spinning up a tab, so dead domains do not burn
    /// through the navigation retries.
    async fn is_reachable(&self, website: &str) -> bool {
        match &self.http {
            Some(client) => match client.get(website).send().await {
                Ok(_) => true,
                Err(e) => {
                    debug!(website = %website, error = %e, "Website does not answer");
                    false
                }
            },
            None => true,
        }
    }

    fn careers_link(html: &str, website: &Url) -> Option<String> {
        let link = find_link(html, website, &CAREERS_LINK)?;
        normalize_url(link.as_str())
    }
}

#[async_trait]
impl Provider for CareersPageProvider {
    type Output = String;

    fn name(&self) -> &'static str {
        "careers-page"
    }

    async fn lookup(&self, website: &str) -> Result<Option<String>, ProviderError> {
        let base = Url::parse(website.trim())
            .map_err(|e| ProviderError::Permanent(format!("invalid website '{website}': {e}")))?;

        if !self.is_reachable(base.as_str()).await {
            return Ok(None);
        }

        let Some(html) = render_page(self.engine.as_ref(), base.as_str(), &self.render).await? else {
            return Ok(None);
        };
        Ok(Self::careers_link(&html, &base))
    }
}
