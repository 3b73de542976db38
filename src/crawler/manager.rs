//! Job registry, queue dispatch, worker pool lifecycle, and periodic
//! flush/compact. Workers receive a `WorkerContext` built once here rather
//! than reaching back into the manager.

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::crawler::fetch::Fetcher;
use crate::crawler::host::HostCoordinator;
use crate::crawler::llm::LlmProvider;
use crate::crawler::model::{CategoryMetrics, CrawlJob, CrawlJobParams, JobCategory, JobStatus, Priority};
use crate::crawler::shard::ShardWriter;
use crate::crawler::shared_state::{self, SharedState};
use crate::crawler::ssrf;
use crate::crawler::store::ResultStore;
use crate::crawler::worker::{self, JobQueues, WorkerContext};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

pub struct Manager {
    config: CrawlerConfig,
    jobs: Mutex<HashMap<String, CrawlJob>>,
    metrics: Mutex<HashMap<JobCategory, CategoryMetrics>>,
    queues: Arc<JobQueues>,
    worker_ctx: Arc<WorkerContext>,
    shared_state: Arc<SharedState>,
    shard_writer: Arc<ShardWriter>,
}

impl Manager {
    pub fn new(
        config: CrawlerConfig,
        store: Arc<ResultStore>,
        shared_state: Arc<SharedState>,
        shard_writer: Arc<ShardWriter>,
        llm_provider: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let worker_ctx = Arc::new(WorkerContext {
            store,
            shared_state: Arc::clone(&shared_state),
            host_coordinator: Arc::new(HostCoordinator::new()),
            fetcher: Arc::new(Fetcher::new(Duration::from_secs(config.request_timeout_seconds))),
            llm_provider,
            ollama_model: config.ollama_model.clone(),
            max_concurrent: config.user_crawler_max_concurrent,
        });

        Self {
            config,
            jobs: Mutex::new(HashMap::new()),
            metrics: Mutex::new(HashMap::new()),
            queues: Arc::new(JobQueues::new()),
            worker_ctx,
            shared_state,
            shard_writer,
        }
    }

    /// Spawn `n` worker loops, each pulling from the shared high/low
    /// priority queues.
    pub fn spawn_workers(self: &Arc<Self>, n: usize) {
        for worker_id in 0..n {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                manager.run_worker_loop(worker_id).await;
            });
        }
    }

    async fn run_worker_loop(self: Arc<Self>, worker_id: usize) {
        tracing::info!("crawler worker {worker_id} started");
        loop {
            let job_id = self.queues.dequeue().await;
            let Some(job) = self.jobs.lock().await.get(&job_id).cloned() else {
                tracing::warn!("worker {worker_id}: job {job_id} not found, skipping");
                continue;
            };
            tracing::debug!("worker {worker_id} processing job {job_id}");

            let finished = worker::run_job(&self.worker_ctx, job).await;
            let category = finished.category;
            let success = matches!(finished.status, JobStatus::Completed | JobStatus::PartialComplete);

            {
                let mut metrics = self.metrics.lock().await;
                let entry = metrics.entry(category).or_default();
                if success {
                    entry.record_success();
                } else {
                    entry.record_failure(None);
                }
            }

            self.jobs.lock().await.insert(finished.id.clone(), finished);
        }
    }

    /// Validate, dedup by idempotency key, and enqueue a new job. Mirrors
    /// `create_job`'s SSRF pre-filter and priority-queue dispatch.
    pub async fn create_job(&self, mut params: CrawlJobParams) -> Result<CrawlJob, CrawlError> {
        if params.seeds.is_empty() {
            return Err(CrawlError::Validation("at least one seed URL is required".to_string()));
        }

        if let Some(key) = params.idempotency_key.as_deref() {
            if let Some(existing_id) = self.shared_state.get_job_for_key(key).await {
                if let Some(existing) = self.jobs.lock().await.get(&existing_id).cloned() {
                    tracing::debug!("returning existing job {existing_id} for idempotency key {key}");
                    return Ok(existing);
                }
            }
        }

        let mut safe_seeds = Vec::new();
        let mut blocked = Vec::new();
        for seed in &params.seeds {
            let verdict = ssrf::is_safe(seed).await;
            if verdict.ok {
                safe_seeds.push(seed.trim().to_string());
            } else {
                tracing::warn!("blocked ssrf-unsafe seed {seed}: {}", verdict.reason);
                blocked.push(seed.clone());
            }
        }
        if safe_seeds.is_empty() {
            return Err(CrawlError::AllSeedsBlocked(blocked));
        }
        params.seeds = safe_seeds;
        params.clamp();

        let allowed_domains = params
            .seeds
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .filter_map(|u| u.host_str().map(str::to_string))
            .collect();

        let category = CrawlJob::categorize(params.requested_by.as_deref(), params.priority);
        let now = Utc::now();
        let job = CrawlJob {
            id: uuid::Uuid::new_v4().to_string(),
            idempotency_key: params.idempotency_key.clone(),
            keywords: params.keywords.iter().map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect(),
            seeds: params.seeds.clone(),
            max_depth: params.max_depth,
            max_pages: params.max_pages,
            relevance_threshold: params.relevance_threshold,
            rate_limit_seconds: params.rate_limit_seconds,
            allow_external: params.allow_external,
            user_context: params.user_context.clone(),
            requested_by: params.requested_by.clone(),
            metadata: params.metadata.clone(),
            priority: params.priority,
            category,
            ollama_assisted: params.ollama_assisted,
            ollama_query: params.ollama_query.clone(),
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            completed_at: None,
            pages_crawled: 0,
            results: Vec::new(),
            error: None,
            allowed_domains,
        };

        self.jobs.lock().await.insert(job.id.clone(), job.clone());

        match job.priority {
            Priority::High => self.queues.enqueue_high(job.id.clone()).await,
            Priority::Low => self.queues.enqueue_low(job.id.clone()).await,
        }

        if let Some(key) = &job.idempotency_key {
            self.shared_state.register_job_for_key(key, &job.id).await;
        }
        for seed in &job.seeds {
            self.shared_state.mark_seen(&shared_state::url_hash(seed)).await;
        }

        tracing::info!(
            "crawler job {} (priority {:?}) queued with {} seeds",
            job.id,
            job.priority,
            job.seeds.len()
        );
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Option<CrawlJob> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn get_result(&self, result_id: &str) -> Option<crate::crawler::model::CrawlResult> {
        self.worker_ctx.store.get(result_id).await
    }

    pub async fn find_result_by_url(&self, url: &str) -> Option<crate::crawler::model::CrawlResult> {
        self.worker_ctx
            .store
            .list(|r| r.url == url)
            .await
            .into_iter()
            .next()
    }

    pub async fn update_result(&self, id: &str, result: crate::crawler::model::CrawlResult) -> bool {
        self.worker_ctx.store.update(id, result).await
    }

    pub fn store_handle(&self) -> Arc<ResultStore> {
        Arc::clone(&self.worker_ctx.store)
    }

    pub fn shard_writer_handle(&self) -> Arc<ShardWriter> {
        Arc::clone(&self.shard_writer)
    }

    pub fn config_train_dir(&self) -> std::path::PathBuf {
        self.config.train_dir.clone()
    }

    pub async fn metrics_snapshot(&self) -> HashMap<JobCategory, CategoryMetrics> {
        self.metrics.lock().await.clone()
    }

    /// Periodic background loop: flush the shared-state file, drain results
    /// into the current shard, and compact old shards. Intervals come from
    /// `CrawlerConfig`.
    pub fn spawn_maintenance_loop(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(manager.config.flush_interval_seconds));
            loop {
                ticker.tick().await;
                manager.shared_state.flush().await;

                let results = manager.worker_ctx.store.snapshot_all().await;
                if let Err(e) = manager.shard_writer.flush_records(&results).await {
                    tracing::warn!("shard flush failed: {e}");
                }
                manager.shard_writer.compact(manager.config.retention_days).await;
            }
        });
    }
}
