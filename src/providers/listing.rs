use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::Provider;
use crate::browser::{render_page, AutomationEngine, RenderOptions};
use crate::error::ProviderError;
use crate::links::extract_links;

/// Renders a careers page and returns every link on it, absolute.
pub struct ListingScraper {
    engine: Arc<dyn AutomationEngine>,
    render: RenderOptions,
}

impl ListingScraper {
    pub fn new(engine: Arc<dyn AutomationEngine>, render: RenderOptions) -> Self {
        Self { engine, render }
    }
}

#[async_trait]
impl Provider for ListingScraper {
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        "job-listing"
    }

    async fn lookup(&self, careers_url: &str) -> Result<Option<Vec<String>>, ProviderError> {
        let page = Url::parse(careers_url.trim())
            .map_err(|e| ProviderError::Permanent(format!("invalid careers url '{careers_url}': {e}")))?;

        let Some(html) = render_page(self.engine.as_ref(), page.as_str(), &self.render).await? else {
            return Ok(None);
        };
        Ok(Some(extract_links(&html, &page)))
    }
}
