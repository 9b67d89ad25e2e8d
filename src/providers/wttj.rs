use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::Provider;
use crate::browser::{render_page, AutomationEngine, RenderOptions};
use crate::error::ProviderError;
use crate::links::{absolute_url, normalize_url};

const WTTJ_ROOT: &str = "https://www.welcometothejungle.com";
const HITS_SELECTOR: &str = ".ais-Hits-list a[href]";
const TITLE_SELECTOR: &str = "h1";

/// Jobs-board profile lookup on Welcome to the Jungle. Searches by name, then
/// checks that the first hit's page really is about that company.
pub struct WttjProvider {
    engine: Arc<dyn AutomationEngine>,
    render: RenderOptions,
}

impl WttjProvider {
    pub fn new(engine: Arc<dyn AutomationEngine>, render: RenderOptions) -> Self {
        Self { engine, render }
    }

    fn search_url(name: &str) -> Result<Url, ProviderError> {
        Url::parse_with_params(&format!("{WTTJ_ROOT}/fr/companies"), &[("query", name)])
            .map_err(|e| ProviderError::Permanent(format!("bad search url for '{name}': {e}")))
    }

    /// First search hit, absolute and without query string.
    fn first_hit(html: &str, page: &Url) -> Option<String> {
        let selector = Selector::parse(HITS_SELECTOR).ok()?;
        let document = Html::parse_document(html);
        let href = document
            .select(&selector)
            .next()?
            .value()
            .attr("href")?;
        let url = absolute_url(page, href)?;
        normalize_url(url.as_str())
    }

    /// Whether the page heading names the company (case-insensitive).
    fn names_company(html: &str, company_name: &str) -> bool {
        let wanted = company_name.trim().to_lowercase();
        if wanted.is_empty() {
            return false;
        }
        let Ok(selector) = Selector::parse(TITLE_SELECTOR) else {
            return false;
        };
        let document = Html::parse_document(html);
        document
            .select(&selector)
            .map(|h1| h1.text().collect::<String>().to_lowercase())
            .any(|title| title.contains(&wanted))
    }
}

#[async_trait]
impl Provider for WttjProvider {
    type Output = String;

    fn name(&self) -> &'static str {
        "wttj"
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>, ProviderError> {
        let search = Self::search_url(name)?;
        let Some(html) = render_page(self.engine.as_ref(), search.as_str(), &self.render).await?
        else {
            return Ok(None);
        };

        let Some(candidate) = Self::first_hit(&html, &search) else {
            debug!(company = %name, "No jobs-board search hit");
            return Ok(None);
        };

        let Some(profile) = render_page(self.engine.as_ref(), &candidate, &self.render).await? else {
            return Ok(None);
        };

        if Self::names_company(&profile, name) {
            Ok(Some(candidate))
        } else {
            info!(company = %name, candidate = %candidate, "Jobs-board hit is about another company, discarding");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{quick_render, FakeEngine};

    const SEARCH_HTML: &str = r#"
        <html><body>
          <ul class="sc-1wqurwm-0 NyiTc ais-Hits-list">
            <li><a href="/fr/companies/alan?q=abc&o=123">Alan</a></li>
            <li><a href="/fr/companies/alan-ventures">Alan Ventures</a></li>
          </ul>
        </body></html>
    "#;

    fn search_page() -> String {
        WttjProvider::search_url("Alan").unwrap().to_string()
    }

    #[test]
    fn test_search_url_escapes_name() {
        let url = WttjProvider::search_url("Back Market & Co").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.welcometothejungle.com/fr/companies?query=Back+Market+%26+Co"
        );
    }

    #[test]
    fn test_first_hit_is_absolute_without_query() {
        let page = Url::parse("https://www.welcometothejungle.com/fr/companies?query=Alan").unwrap();
        assert_eq!(
            WttjProvider::first_hit(SEARCH_HTML, &page).as_deref(),
            Some("https://www.welcometothejungle.com/fr/companies/alan")
        );
        assert!(WttjProvider::first_hit("<ul class='results'></ul>", &page).is_none());
    }

    #[test]
    fn test_names_company_is_case_insensitive_and_trimmed() {
        let html = "<h1>  ALAN  </h1>";
        assert!(WttjProvider::names_company(html, " alan "));
        assert!(WttjProvider::names_company("<h1>Alan Health</h1>", "Alan"));
        assert!(!WttjProvider::names_company("<h1>Qonto</h1>", "Alan"));
        assert!(!WttjProvider::names_company("<p>Alan</p>", "Alan"));
        assert!(!WttjProvider::names_company("<h1>Alan</h1>", "   "));
    }

    #[tokio::test]
    async fn test_lookup_validates_candidate() {
        let engine = Arc::new(
            FakeEngine::default()
                .with_page(&search_page(), SEARCH_HTML)
                .with_page("https://www.welcometothejungle.com/fr/companies/alan", "<h1>Alan</h1>"),
        );
        let provider = WttjProvider::new(engine, quick_render());

        assert_eq!(
            provider.lookup("Alan").await.unwrap().as_deref(),
            Some("https://www.welcometothejungle.com/fr/companies/alan")
        );
    }

    #[tokio::test]
    async fn test_lookup_discards_mismatching_candidate() {
        let engine = Arc::new(
            FakeEngine::default()
                .with_page(&search_page(), SEARCH_HTML)
                .with_page("https://www.welcometothejungle.com/fr/companies/alan", "<h1>Qonto</h1><h2>Alan</h2>"),
        );
        let provider = WttjProvider::new(engine, quick_render());

        assert!(provider.lookup("Alan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_unreachable_search_is_not_found() {
        let engine = Arc::new(FakeEngine::default());
        let provider = WttjProvider::new(engine, quick_render());

        assert!(provider.lookup("Alan").await.unwrap().is_none());
    }
}
