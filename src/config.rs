use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::browser::RenderOptions;
use crate::db::Database;
use crate::error::ConfigError;
use crate::miner::RoleFilter;
use crate::retry::{AutomationRetry, RateLimitPolicy};

pub const DEFAULT_WORKERS: usize = 20;
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Knobs of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Ceiling of concurrently enriched companies.
    pub enrich_workers: usize,
    /// Ceiling of concurrently mined careers pages.
    pub offer_workers: usize,
    pub rate_limit: RateLimitPolicy,
    pub render: RenderOptions,
    pub role_filter: RoleFilter,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            enrich_workers: DEFAULT_WORKERS,
            offer_workers: 2 * DEFAULT_WORKERS,
            rate_limit: RateLimitPolicy::default(),
            render: RenderOptions::default(),
            role_filter: RoleFilter::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub webdriver_url: String,
    crunchbase_api_key: Option<String>,
    pub pipeline: PipelineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let enrich_workers = parse_var(&get, "JOBSCOUT_WORKERS")?.unwrap_or(DEFAULT_WORKERS);
        let offer_workers = parse_var(&get, "JOBSCOUT_OFFER_WORKERS")?.unwrap_or(2 * enrich_workers);

        let rate_limit = RateLimitPolicy {
            cooldown: Duration::from_secs(parse_var(&get, "JOBSCOUT_COOLDOWN_SECS")?.unwrap_or(50)),
            max_cooldowns: parse_var(&get, "JOBSCOUT_MAX_COOLDOWNS")?,
        };
        let render = RenderOptions {
            retry: AutomationRetry {
                attempts: parse_var(&get, "JOBSCOUT_AUTOMATION_ATTEMPTS")?.unwrap_or(5),
            },
            settle: Duration::from_millis(parse_var(&get, "JOBSCOUT_SETTLE_MS")?.unwrap_or(4000)),
        };
        let role_filter = match get("JOBSCOUT_ROLE_PATTERN") {
            Some(pattern) => RoleFilter::new(&pattern)?,
            None => RoleFilter::default(),
        };

        Ok(Self {
            db_path: get("JOBSCOUT_DB")
                .map(PathBuf::from)
                .unwrap_or_else(Database::default_path),
            webdriver_url: get("JOBSCOUT_WEBDRIVER_URL")
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            crunchbase_api_key: get("CRUNCHBASE_API_KEY"),
            pipeline: PipelineSettings {
                enrich_workers,
                offer_workers,
                rate_limit,
                render,
                role_filter,
            },
        })
    }

    /// Only the enrichment run needs the registry key, so it is checked there
    /// rather than at load time.
    pub fn crunchbase_api_key(&self) -> Result<&str, ConfigError> {
        self.crunchbase_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("CRUNCHBASE_API_KEY"))
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
