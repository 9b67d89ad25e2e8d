use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Provider;
use crate::error::ProviderError;
use crate::links::normalize_url;
use crate::models::WebsiteProfile;

const SEARCH_URL: &str = "https://api.crunchbase.com/api/v4/searches/organizations";

/// Crunchbase location identifier for France.
const FRANCE_LOCATION_ID: &str = "f134827e-36a1-fd31-a82f-950489e103ef";

#[derive(Debug, Serialize)]
struct SearchPredicate {
    #[serde(rename = "type")]
    kind: &'static str,
    field_id: &'static str,
    operator_id: &'static str,
    values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    field_ids: Vec<&'static str>,
    query: Vec<SearchPredicate>,
    limit: u32,
}

impl SearchRequest {
    fn for_company(name: &str) -> Self {
        Self {
            field_ids: vec!["identifier", "website_url", "linkedin"],
            query: vec![
                SearchPredicate {
                    kind: "predicate",
                    field_id: "identifier",
                    operator_id: "contains",
                    values: vec![name.to_string()],
                },
                SearchPredicate {
                    kind: "predicate",
                    field_id: "location_identifiers",
                    operator_id: "includes",
                    values: vec![FRANCE_LOCATION_ID.to_string()],
                },
            ],
            limit: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    website_url: Option<String>,
    #[serde(default)]
    linkedin: Option<LinkedIn>,
}

#[derive(Debug, Deserialize)]
struct LinkedIn {
    #[serde(default)]
    value: Option<String>,
}

/// Company registry lookup against the Crunchbase organization search.
pub struct CrunchbaseProvider {
    client: reqwest::Client,
    api_key: String,
}

impl CrunchbaseProvider {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    /// Classify a raw response body. A body that is not JSON at all is how the
    /// API signals an exhausted quota.
    fn parse_response(body: &str) -> Result<Option<WebsiteProfile>, ProviderError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|_| ProviderError::RateLimited { provider: "crunchbase" })?;
        let response: SearchResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Permanent(format!("unexpected crunchbase payload: {e}")))?;

        if response.count == 0 {
            return Ok(None);
        }
        let Some(entity) = response.entities.into_iter().next() else {
            return Ok(None);
        };

        let website = entity
            .properties
            .website_url
            .as_deref()
            .and_then(normalize_url)
            .unwrap_or_default();
        let linkedin = entity
            .properties
            .linkedin
            .and_then(|l| l.value)
            .as_deref()
            .and_then(normalize_url)
            .unwrap_or_default();

        if website.is_empty() && linkedin.is_empty() {
            return Ok(None);
        }
        Ok(Some(WebsiteProfile { website, linkedin }))
    }
}

#[async_trait]
impl Provider for CrunchbaseProvider {
    type Output = WebsiteProfile;

    fn name(&self) -> &'static str {
        "crunchbase"
    }

    async fn lookup(&self, name: &str) -> Result<Option<WebsiteProfile>, ProviderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProviderError::Permanent("empty company name".to_string()));
        }

        debug!(company = %name, "Querying crunchbase");
        let body = self
            .client
            .post(SEARCH_URL)
            .header("X-cb-user-key", &self.api_key)
            .header("accept", "application/json")
            .json(&SearchRequest::for_company(name))
            .send()
            .await?
            .text()
            .await?;

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_found() {
        let body = r#"{
            "count": 1,
            "entities": [{
                "uuid": "abc",
                "properties": {
                    "identifier": {"value": "Alan", "permalink": "alan"},
                    "website_url": "https://alan.com/",
                    "linkedin": {"value": "https://www.linkedin.com/company/alan-eu/"}
                }
            }]
        }"#;

        let profile = CrunchbaseProvider::parse_response(body).unwrap().unwrap();
        assert_eq!(profile.website, "https://alan.com");
        assert_eq!(profile.linkedin, "https://www.linkedin.com/company/alan-eu");
    }

    #[test]
    fn test_parse_response_partial_profile() {
        let body = r#"{"count": 1, "entities": [{"properties": {"website_url": "https://qonto.com"}}]}"#;
        let profile = CrunchbaseProvider::parse_response(body).unwrap().unwrap();
        assert_eq!(profile.website, "https://qonto.com");
        assert_eq!(profile.linkedin, "");
    }

    #[test]
    fn test_parse_response_not_found() {
        let body = r#"{"count": 0, "entities": []}"#;
        assert!(CrunchbaseProvider::parse_response(body).unwrap().is_none());
    }

    #[test]
    fn test_parse_response_garbage_is_rate_limit() {
        let err = CrunchbaseProvider::parse_response("<html>Too Many Requests</html>").unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { provider: "crunchbase" }));

        let err = CrunchbaseProvider::parse_response("").unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn test_parse_response_wrong_shape_is_permanent() {
        let err = CrunchbaseProvider::parse_response(r#"{"count": "many"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[test]
    fn test_search_request_shape() {
        let request = serde_json::to_value(SearchRequest::for_company("Alan")).unwrap();
        assert_eq!(request["limit"], 1);
        assert_eq!(request["query"][0]["type"], "predicate");
        assert_eq!(request["query"][0]["values"][0], "Alan");
        assert_eq!(request["query"][1]["field_id"], "location_identifiers");
    }
}
