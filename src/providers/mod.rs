use async_trait::async_trait;
use std::sync::Arc;

use crate::browser::{AutomationEngine, RenderOptions};
use crate::error::ProviderError;
use crate::models::WebsiteProfile;

pub mod careers;
pub mod crunchbase;
pub mod listing;
pub mod tech500;
pub mod wttj;

pub use careers::CareersPageProvider;
pub use crunchbase::CrunchbaseProvider;
pub use listing::ListingScraper;
pub use tech500::Tech500Source;
pub use wttj::WttjProvider;

#[async_trait]
pub trait Provider: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    /// `Ok(None)` when the source has nothing for `key`.
    async fn lookup(&self, key: &str) -> Result<Option<Self::Output>, ProviderError>;
}

/// The set of adapters one pipeline run works with.
#[derive(Clone)]
pub struct Providers {
    /// Company name -> website and professional-network URL.
    pub registry: Arc<dyn Provider<Output = WebsiteProfile>>,
    /// Company name -> jobs-board profile URL.
    pub jobs_board: Arc<dyn Provider<Output = String>>,
    /// Website -> careers page found on that website.
    pub careers_page: Arc<dyn Provider<Output = String>>,
    /// Careers page -> every absolute link on it.
    pub job_links: Arc<dyn Provider<Output = Vec<String>>>,
}

impl Providers {
    /// The production adapters: Crunchbase, Welcome to the Jungle and the
    /// browser-backed scrapers.
    pub fn reference(
        crunchbase_api_key: &str,
        engine: Arc<dyn AutomationEngine>,
        render: RenderOptions,
    ) -> Result<Self, ProviderError> {
        let http = http_client()?;
        Ok(Self {
            registry: Arc::new(CrunchbaseProvider::new(http.clone(), crunchbase_api_key)),
            jobs_board: Arc::new(WttjProvider::new(Arc::clone(&engine), render.clone())),
            careers_page: Arc::new(CareersPageProvider::new(
                http,
                Arc::clone(&engine),
                render.clone(),
            )),
            job_links: Arc::new(ListingScraper::new(engine, render)),
        })
    }
}

pub fn http_client() -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36")
        .build()?)
}
