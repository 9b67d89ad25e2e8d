use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::browser::AutomationEngine;
use crate::config::PipelineSettings;
use crate::db::Database;
use crate::enrich::enrich_company;
use crate::error::{PersistenceError, ProviderError};
use crate::miner::mine_company;
use crate::providers::Providers;

/// Everything a task needs, handed to every scheduler and stage explicitly.
pub struct PipelineContext {
    pub db: Arc<Database>,
    /// Kept here so the engine outlives every task and is shut down once.
    pub engine: Arc<dyn AutomationEngine>,
    pub providers: Providers,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    pub fn new(
        db: Arc<Database>,
        engine: Arc<dyn AutomationEngine>,
        providers: Providers,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            engine,
            providers,
            settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub label: &'static str,
    pub scheduled: usize,
    pub completed: usize,
    pub panicked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub enrichment: BatchSummary,
    pub mining: BatchSummary,
}

/// Run `task` once per item with at most `ceiling` running at a time, and
/// return when all of them are done. A slot is taken before a task is
/// spawned and released when it finishes, retries and cooldowns included.
/// Task failures never fail the batch; panics are logged and counted.
pub async fn run_batch<I, F, Fut>(label: &'static str, items: Vec<I>, ceiling: usize, task: F) -> BatchSummary
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ceiling = ceiling.max(1);
    let mut summary = BatchSummary {
        label,
        scheduled: items.len(),
        completed: 0,
        panicked: 0,
    };
    info!(label, tasks = summary.scheduled, ceiling, "Starting batch");

    let slots = Arc::new(Semaphore::new(ceiling));
    let mut running = JoinSet::new();
    for item in items {
        // the semaphore is never closed
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let work = task(item);
        running.spawn(async move {
            work.await;
            drop(permit);
        });
    }

    while let Some(joined) = running.join_next().await {
        match joined {
            Ok(()) => summary.completed += 1,
            Err(e) if e.is_panic() => {
                summary.panicked += 1;
                error!(label, error = %e, "Task panicked");
            }
            Err(e) => warn!(label, error = %e, "Task was cancelled"),
        }
    }

    info!(
        label,
        completed = summary.completed,
        panicked = summary.panicked,
        "Batch finished"
    );
    summary
}

pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Enrichment pass over every stored company, then offer mining over the
    /// result. Only failing to list the companies is an error.
    pub async fn run(&self) -> Result<PipelineReport, PersistenceError> {
        let names: Vec<String> = self
            .ctx
            .db
            .list_companies()?
            .into_iter()
            .map(|company| company.name)
            .collect();

        let enrichment = run_batch("enrichment", names, self.ctx.settings.enrich_workers, |name| {
            let ctx = Arc::clone(&self.ctx);
            async move {
                enrich_company(&ctx, &name).await;
            }
        })
        .await;

        // re-read so the miner sees the careers pages written above
        let companies = self.ctx.db.list_companies()?;
        let mining = run_batch("offer-mining", companies, self.ctx.settings.offer_workers, |company| {
            let ctx = Arc::clone(&self.ctx);
            async move {
                mine_company(&ctx, &company).await;
            }
        })
        .await;

        Ok(PipelineReport { enrichment, mining })
    }
}

/// Build the providers on `engine`, run both passes and shut the engine down,
/// also when building the providers fails.
pub async fn run_with_engine<B>(
    db: Arc<Database>,
    engine: Arc<dyn AutomationEngine>,
    settings: PipelineSettings,
    build_providers: B,
) -> anyhow::Result<PipelineReport>
where
    B: FnOnce(Arc<dyn AutomationEngine>) -> Result<Providers, ProviderError>,
{
    let providers = match build_providers(Arc::clone(&engine)) {
        Ok(providers) => providers,
        Err(e) => {
            engine.shutdown().await;
            return Err(e).context("Failed to set up providers");
        }
    };

    let ctx = Arc::new(PipelineContext::new(db, engine, providers, settings));
    let report = Pipeline::new(Arc::clone(&ctx)).run().await;
    ctx.engine.shutdown().await;
    Ok(report?)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory context and scripted providers shared by the pipeline tests.

    use super::*;
    use crate::browser::testing::{quick_render, FakeEngine};
    use crate::error::ProviderError;
    use crate::models::{Company, WebsiteProfile};
    use crate::providers::Provider;
    use crate::retry::RateLimitPolicy;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Ordered record of provider calls across tasks.
    #[derive(Default)]
    pub struct CallLog {
        events: std::sync::Mutex<Vec<String>>,
    }

    impl CallLog {
        pub fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        pub fn position(&self, event: &str) -> Option<usize> {
            self.events().iter().position(|e| e == event)
        }
    }

    /// Provider answering from a fixed table, optionally slow, rate limited
    /// or broken.
    pub struct FakeProvider<T> {
        name: &'static str,
        answers: HashMap<String, T>,
        delay: Duration,
        delays: HashMap<String, Duration>,
        rate_limited: AtomicU32,
        broken: bool,
        log: Option<Arc<CallLog>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl<T> FakeProvider<T> {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                answers: HashMap::new(),
                delay: Duration::ZERO,
                delays: HashMap::new(),
                rate_limited: AtomicU32::new(0),
                broken: false,
                log: None,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn answer(mut self, key: &str, value: T) -> Self {
            self.answers.insert(key.to_string(), value);
            self
        }

        pub fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn delay_for(mut self, key: &str, delay: Duration) -> Self {
            self.delays.insert(key.to_string(), delay);
            self
        }

        /// Answer `RateLimited` to the first `times` calls.
        pub fn rate_limited(self, times: u32) -> Self {
            self.rate_limited.store(times, Ordering::SeqCst);
            self
        }

        pub fn broken(mut self) -> Self {
            self.broken = true;
            self
        }

        pub fn logged(mut self, log: &Arc<CallLog>) -> Self {
            self.log = Some(Arc::clone(log));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn record(&self, what: &str, key: &str) {
            if let Some(log) = &self.log {
                log.record(format!("{}:{what}:{key}", self.name));
            }
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> Provider for FakeProvider<T> {
        type Output = T;

        fn name(&self) -> &'static str {
            self.name
        }

        async fn lookup(&self, key: &str) -> Result<Option<T>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record("start", key);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(key).copied().unwrap_or(self.delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.record("end", key);

            if self
                .rate_limited
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Err(ProviderError::RateLimited { provider: self.name });
            }
            if self.broken {
                return Err(ProviderError::Permanent(format!("{} is broken", self.name)));
            }
            Ok(self.answers.get(key).cloned())
        }
    }

    pub fn profile(website: &str, linkedin: &str) -> WebsiteProfile {
        WebsiteProfile {
            website: website.to_string(),
            linkedin: linkedin.to_string(),
        }
    }

    pub fn links(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|url| url.to_string()).collect()
    }

    pub struct ContextBuilder {
        db: Database,
        engine: FakeEngine,
        providers: Providers,
        settings: PipelineSettings,
    }

    /// Empty database, providers that know nothing, no settle delay.
    pub fn context() -> ContextBuilder {
        ContextBuilder {
            db: Database::open_in_memory().unwrap(),
            engine: FakeEngine::default(),
            providers: Providers {
                registry: Arc::new(FakeProvider::<WebsiteProfile>::new("registry")),
                jobs_board: Arc::new(FakeProvider::<String>::new("jobs-board")),
                careers_page: Arc::new(FakeProvider::<String>::new("careers-page")),
                job_links: Arc::new(FakeProvider::<Vec<String>>::new("job-listing")),
            },
            settings: PipelineSettings {
                render: quick_render(),
                ..PipelineSettings::default()
            },
        }
    }

    impl ContextBuilder {
        pub fn with_company(self, company: Company) -> Self {
            self.db.insert_company(&company).unwrap();
            self
        }

        pub fn with_registry(mut self, provider: Arc<dyn Provider<Output = WebsiteProfile>>) -> Self {
            self.providers.registry = provider;
            self
        }

        pub fn with_jobs_board(mut self, provider: Arc<dyn Provider<Output = String>>) -> Self {
            self.providers.jobs_board = provider;
            self
        }

        pub fn with_careers_page(mut self, provider: Arc<dyn Provider<Output = String>>) -> Self {
            self.providers.careers_page = provider;
            self
        }

        pub fn with_job_links(mut self, provider: Arc<dyn Provider<Output = Vec<String>>>) -> Self {
            self.providers.job_links = provider;
            self
        }

        pub fn with_workers(mut self, enrich: usize, offers: usize) -> Self {
            self.settings.enrich_workers = enrich;
            self.settings.offer_workers = offers;
            self
        }

        pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
            self.settings.rate_limit = policy;
            self
        }

        pub fn providers(self) -> Providers {
            self.providers
        }

        pub fn build(self) -> Arc<PipelineContext> {
            Arc::new(PipelineContext::new(
                Arc::new(self.db),
                Arc::new(self.engine),
                self.providers,
                self.settings,
            ))
        }
    }
}
