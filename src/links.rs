use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Canonical form for every URL stored on a company: absolute http(s), no
/// query, no fragment, no trailing slash. Anything else is `None`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = Url::parse(raw).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;
    url.set_query(None);
    url.set_fragment(None);

    Some(url.as_str().trim_end_matches('/').to_string())
}

/// Resolve `href` against the page it was found on.
pub fn absolute_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok()
}

/// All http(s) links of a page, absolute, in document order, without repeats.
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| absolute_url(base, href))
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// First http(s) href of the page matching `pattern`, resolved against `base`.
pub fn find_link(html: &str, base: &Url, pattern: &regex::Regex) -> Option<Url> {
    let selector = Selector::parse("a[href]").ok()?;
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| pattern.is_match(href))
        .filter_map(|href| absolute_url(base, href))
        .find(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_query_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://www.linkedin.com/company/alan/?trk=abc"),
            Some("https://www.linkedin.com/company/alan".to_string())
        );
        assert_eq!(
            normalize_url("  https://alan.com/  "),
            Some("https://alan.com".to_string())
        );
        assert_eq!(
            normalize_url("https://alan.com/careers#open-roles"),
            Some("https://alan.com/careers".to_string())
        );
        assert_eq!(
            normalize_url("http://qonto.com/en/careers//"),
            Some("http://qonto.com/en/careers".to_string())
        );
    }

    #[test]
    fn test_normalize_url_rejects_non_absolute() {
        assert_eq!(normalize_url(""), None);
        assert_eq!(normalize_url("   "), None);
        assert_eq!(normalize_url("/careers"), None);
        assert_eq!(normalize_url("alan.com"), None);
        assert_eq!(normalize_url("mailto:jobs@alan.com"), None);
        assert_eq!(normalize_url("ftp://files.alan.com"), None);
    }

    #[test]
    fn test_absolute_url_resolves_relative_hrefs() {
        let base = Url::parse("https://alan.com/en/careers").unwrap();
        assert_eq!(
            absolute_url(&base, "/jobs/sre").unwrap().as_str(),
            "https://alan.com/jobs/sre"
        );
        assert_eq!(
            absolute_url(&base, "devops").unwrap().as_str(),
            "https://alan.com/en/devops"
        );
        assert_eq!(
            absolute_url(&base, "https://jobs.lever.co/alan").unwrap().as_str(),
            "https://jobs.lever.co/alan"
        );
        assert!(absolute_url(&base, "  ").is_none());
    }

    #[test]
    fn test_extract_links() {
        let base = Url::parse("https://www.welcometothejungle.com/fr/companies/alan/jobs").unwrap();
        let html = r#"
            <html><body>
              <a href="/fr/companies/alan/jobs/devops-engineer_paris">DevOps</a>
              <a href=" https://alan.com/about ">About</a>
              <a href="/fr/companies/alan/jobs/devops-engineer_paris">Again</a>
              <a href="mailto:jobs@alan.com">Mail</a>
              <a>No href</a>
            </body></html>
        "#;

        let links = extract_links(html, &base);
        assert_eq!(
            links,
            vec![
                "https://www.welcometothejungle.com/fr/companies/alan/jobs/devops-engineer_paris".to_string(),
                "https://alan.com/about".to_string(),
            ]
        );
    }

    #[test]
    fn test_find_link_returns_first_match() {
        let base = Url::parse("https://qonto.com").unwrap();
        let pattern = regex::Regex::new("(jobs|careers|carreers)").unwrap();
        let html = r#"
            <a href="/pricing">Pricing</a>
            <a href="/en/carreers">Join us</a>
            <a href="/en/careers">Careers</a>
        "#;
        assert_eq!(
            find_link(html, &base, &pattern).unwrap().as_str(),
            "https://qonto.com/en/carreers"
        );
        assert!(find_link("<a href='/blog'>Blog</a>", &base, &pattern).is_none());
    }

    #[test]
    fn test_find_link_ignores_non_web_schemes() {
        let base = Url::parse("https://alan.com").unwrap();
        let pattern = regex::Regex::new("(jobs|careers|carreers)").unwrap();
        let html = r#"
            <a href="mailto:jobs@alan.com">Mail</a>
            <a href="javascript:openJobs()">Jobs</a>
            <a href="/jobs">Open positions</a>
        "#;
        assert_eq!(
            find_link(html, &base, &pattern).unwrap().as_str(),
            "https://alan.com/jobs"
        );
    }
}
