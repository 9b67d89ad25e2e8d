use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub cooldown: Duration,
    /// `None` retries until the remote answers with something parseable.
    pub max_cooldowns: Option<u32>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(50),
            max_cooldowns: None,
        }
    }
}

impl RateLimitPolicy {
    /// Run `op` until it stops reporting `RateLimited`. Any other error is
    /// returned untouched. The caller keeps its worker slot for the whole wait.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut cooldowns = 0u32;
        loop {
            match op().await {
                Err(ProviderError::RateLimited { provider }) => {
                    if self.max_cooldowns.is_some_and(|max| cooldowns >= max) {
                        warn!(label, provider, cooldowns, "Giving up after repeated rate limiting");
                        return Err(ProviderError::RateLimited { provider });
                    }
                    cooldowns += 1;
                    warn!(
                        label,
                        provider,
                        cooldown_secs = self.cooldown.as_secs(),
                        "API limit might have been reached, cooling down"
                    );
                    tokio::time::sleep(self.cooldown).await;
                    info!(label, provider, "Resuming after cooldown");
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutomationRetry {
    pub attempts: u32,
}

impl Default for AutomationRetry {
    fn default() -> Self {
        Self { attempts: 5 }
    }
}

impl AutomationRetry {
    /// Run `op` up to `attempts` times with no delay in between. Exhaustion is
    /// reported as `None` so the caller can fall back.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Some(value),
                Err(e) if !e.is_transient() => {
                    warn!(label, error = %e, "Automation step failed permanently");
                    return None;
                }
                Err(e) => {
                    debug!(label, attempt, attempts, error = %e, "Automation step failed");
                }
            }
        }
        warn!(label, attempts, "Automation step failed on every attempt");
        None
    }
}
