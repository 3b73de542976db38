//! Worker pool and per-job crawl pipeline: a two-tier priority queue (100ms
//! high-priority poll, 1s low-priority poll) and a 300-second wall-clock
//! timeout per job with a `partial_complete` fallback. The BFS crawl loop
//! inside a job reuses `tools/crawl.rs`'s wave-based
//! `stream::iter().buffer_unordered()` idiom.

use crate::crawler::extract;
use crate::crawler::fetch::{Fetcher, PageOutcome};
use crate::crawler::host::HostCoordinator;
use crate::crawler::llm::{self, LlmProvider};
use crate::crawler::model::{CrawlJob, CrawlResult, JobStatus, ResultStatus};
use crate::crawler::score;
use crate::crawler::shared_state::{self, SharedState};
use crate::crawler::ssrf;
use crate::crawler::store::ResultStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

const JOB_TIMEOUT: Duration = Duration::from_secs(300);
const HIGH_PRIORITY_POLL: Duration = Duration::from_millis(100);
const LOW_PRIORITY_POLL: Duration = Duration::from_secs(1);

/// Shared dependencies every worker needs, handed in by the manager rather
/// than reached for as module-level singletons, the same dependency-injection
/// shape as `core/app_state.rs`.
pub struct WorkerContext {
    pub store: Arc<ResultStore>,
    pub shared_state: Arc<SharedState>,
    pub host_coordinator: Arc<HostCoordinator>,
    pub fetcher: Arc<Fetcher>,
    pub llm_provider: Option<Arc<dyn LlmProvider>>,
    pub ollama_model: Option<String>,
    pub max_concurrent: usize,
}

/// Two-tier job queue. `dequeue` mirrors the Python worker's fallback
/// pattern: poll high-priority with a short timeout, then low-priority with
/// a longer one, looping forever until one yields a job.
pub struct JobQueues {
    high: Mutex<VecDeque<String>>,
    low: Mutex<VecDeque<String>>,
}

impl Default for JobQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueues {
    pub fn new() -> Self {
        Self {
            high: Mutex::new(VecDeque::new()),
            low: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn enqueue_high(&self, job_id: String) {
        self.high.lock().await.push_back(job_id);
    }

    pub async fn enqueue_low(&self, job_id: String) {
        self.low.lock().await.push_back(job_id);
    }

    /// Blocks until a job is available from either queue, high-priority
    /// first. Never returns `None` — it loops, matching the Python worker's
    /// `continue` on a double timeout.
    pub async fn dequeue(&self) -> String {
        loop {
            if let Some(job_id) = self.high.lock().await.pop_front() {
                return job_id;
            }
            tokio::time::sleep(HIGH_PRIORITY_POLL).await;

            if let Some(job_id) = self.high.lock().await.pop_front() {
                return job_id;
            }
            if let Some(job_id) = self.low.lock().await.pop_front() {
                return job_id;
            }
            tokio::time::sleep(LOW_PRIORITY_POLL).await;
        }
    }
}

/// Run one job to completion (or until it's exhausted its page budget),
/// applying the per-job wall-clock timeout. Mutates `job` in place and
/// returns it to the caller for persistence.
pub async fn run_job(ctx: &WorkerContext, mut job: CrawlJob) -> CrawlJob {
    job.status = JobStatus::Running;
    job.touch();

    match tokio::time::timeout(JOB_TIMEOUT, crawl_job(ctx, &mut job)).await {
        Ok(Ok(())) => {
            job.set_terminal(JobStatus::Completed, None);
        }
        Ok(Err(e)) => {
            job.set_terminal(JobStatus::Failed, Some(e.to_string()));
        }
        Err(_) => {
            tracing::warn!("job {} timed out after {:?} — partial complete", job.id, JOB_TIMEOUT);
            job.set_terminal(
                JobStatus::PartialComplete,
                Some(format!(
                    "crawl timed out after {} seconds (partial results saved)",
                    JOB_TIMEOUT.as_secs()
                )),
            );
        }
    }
    job
}

async fn crawl_job(ctx: &WorkerContext, job: &mut CrawlJob) -> anyhow::Result<()> {
    let base_domains: HashSet<String> = job.allowed_domains.iter().cloned().collect();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize, Option<String>)> = VecDeque::new();

    let mut any_seed_safe = false;
    for seed in &job.seeds {
        let verdict = ssrf::is_safe(seed).await;
        if !verdict.ok {
            tracing::warn!("seed {seed} blocked by ssrf guard: {}", verdict.reason);
            continue;
        }
        any_seed_safe = true;
        visited.insert(normalize_url(seed));
        queue.push_back((seed.clone(), 0, None));
    }
    if !any_seed_safe {
        return Err(crate::crawler::error::CrawlError::AllSeedsBlocked(job.seeds.clone()).into());
    }

    while job.pages_crawled < job.max_pages {
        let remaining = job.max_pages - job.pages_crawled;
        let batch_size = remaining.min(ctx.max_concurrent * 2);
        let mut batch = Vec::new();
        while batch.len() < batch_size {
            match queue.pop_front() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }

        let results: Vec<(CrawlResult, Vec<(String, usize, Option<String>)>)> =
            stream::iter(batch)
                .map(|(url, depth, parent)| process_one(ctx, job, url, depth, parent))
                .buffer_unordered(ctx.max_concurrent)
                .filter_map(|r| async { r })
                .collect()
                .await;

        for (result, discovered) in results {
            job.pages_crawled += 1;
            if result.score >= job.relevance_threshold {
                let id = ctx.store.add(result).await;
                job.results.push(id);
            }
            if depth_allows(job, &discovered) {
                for (u, d, p) in discovered {
                    let normalized = normalize_url(&u);
                    if visited.contains(&normalized) {
                        continue;
                    }
                    if !job.allow_external && !host_allowed(&u, &base_domains) {
                        continue;
                    }
                    visited.insert(normalized);
                    queue.push_back((u, d, p));
                }
            }
        }
        job.touch();
    }

    Ok(())
}

fn depth_allows(job: &CrawlJob, discovered: &[(String, usize, Option<String>)]) -> bool {
    discovered.iter().all(|(_, d, _)| *d <= job.max_depth)
}

fn host_allowed(url: &str, allowed: &HashSet<String>) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or("");
    allowed.iter().any(|d| host == d || host.ends_with(&format!(".{d}")))
}

async fn process_one(
    ctx: &WorkerContext,
    job: &CrawlJob,
    url: String,
    depth: usize,
    parent_url: Option<String>,
) -> Option<(CrawlResult, Vec<(String, usize, Option<String>)>)> {
    let url_hash = shared_state::url_hash(&url);
    if !ctx.shared_state.mark_seen(&url_hash).await {
        return None;
    }

    let verdict = ssrf::is_safe(&url).await;
    if !verdict.ok {
        tracing::debug!("dropping {url}: {}", verdict.reason);
        return None;
    }

    let host = Url::parse(&url).ok()?.host_str()?.to_string();
    ctx.host_coordinator.respect_backoff(&host).await;
    ctx.host_coordinator.jittered_delay(job.rate_limit_seconds).await;

    let outcome = ctx.fetcher.fetch(&url).await;
    let (status, html) = match outcome {
        PageOutcome::Rendered { status, html } | PageOutcome::Degraded { status, html } => {
            (status, html)
        }
        PageOutcome::Failed(e) => {
            tracing::debug!("fetch failed for {url}: {e}");
            return None;
        }
    };

    if status >= 500 {
        ctx.host_coordinator.schedule_backoff(&host, status).await;
        return None;
    }
    if status == 429 {
        ctx.host_coordinator.schedule_backoff(&host, status).await;
        return None;
    }
    if status >= 400 {
        return None;
    }
    ctx.host_coordinator.clear_backoff(&host).await;

    let page = extract::extract(&html);
    let (mut keyword_score, matched_keywords) = score::score_content(&page.text_content, &job.keywords);

    let mut extracted_content_ollama = None;
    if job.ollama_assisted {
        if let (Some(provider), Some(model), Some(query)) =
            (ctx.llm_provider.as_deref(), ctx.ollama_model.as_deref(), job.ollama_query.as_deref())
        {
            let analysis = llm::analyze_relevance(provider, model, &page.text_content, query).await;
            keyword_score = score::fuse_with_ollama(keyword_score, &analysis);
            extracted_content_ollama = analysis.extracted_content;
        }
    }

    let (headline, summary) = llm::generate_summary(
        ctx.llm_provider.as_deref(),
        None,
        &page.text_content,
        page.meta_description.as_deref(),
    )
    .await;

    let source_domain = Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    let tags = extract::guess_tags(&matched_keywords, None);

    let mut result = CrawlResult {
        id: uuid::Uuid::new_v4().to_string(),
        job_id: job.id.clone(),
        url: url.clone(),
        source_domain,
        parent_url,
        depth,
        title: String::new(),
        headline,
        content: String::new(),
        excerpt: String::new(),
        summary,
        meta_description: None,
        publish_date: None,
        normalized_text: None,
        content_hash: String::new(),
        tokens_est: 0,
        extracted_content_ollama,
        score: keyword_score,
        keywords_matched: matched_keywords,
        tags,
        feedback: Vec::new(),
        rating_count: 0,
        rating_average: 0.0,
        confirmations: 0,
        posted_at: None,
        post_id: None,
        topic_id: None,
        status: ResultStatus::Crawled,
        size_bytes: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    extract::apply_to_result(&mut result, page);

    let discovered = if depth < job.max_depth {
        discover_links(&html, &url)
            .into_iter()
            .map(|(link_url, _, parent)| (link_url, depth + 1, parent))
            .collect()
    } else {
        Vec::new()
    };

    Some((result, discovered))
}

fn discover_links(html: &str, base_url: &str) -> Vec<(String, usize, Option<String>)> {
    const EXCLUDED: &[&str] = &[
        "login", "register", "signin", "signup", "admin", "cart", "checkout",
        "facebook.com", "twitter.com", "linkedin.com", "instagram.com", "pinterest.com",
        "youtube.com", "reddit.com", "addtoany.com", "sharethis.com", "mailto:", "tel:",
        "whatsapp.com", "t.me",
    ];
    let doc = scraper::Html::parse_document(html);
    let Ok(sel) = scraper::Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        if EXCLUDED.iter().any(|kw| href_lower.contains(kw)) {
            continue;
        }
        if let Some(absolute) = resolve_url(base_url, href) {
            out.push((absolute, 0, Some(base_url.to_string())));
        }
    }
    out
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
        || href.starts_with("data:")
    {
        return None;
    }
    let base_url = Url::parse(base).ok()?;
    let resolved = base_url.join(href).ok()?;
    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Some(resolved.to_string())
    } else {
        None
    }
}

fn normalize_url(url: &str) -> String {
    if let Ok(mut parsed) = Url::parse(url) {
        parsed.set_fragment(None);
        let mut result = parsed.to_string();
        if result.ends_with('/') && result.len() > 1 {
            result.pop();
        }
        result.to_lowercase()
    } else {
        url.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queues_prefer_high_priority() {
        let queues = JobQueues::new();
        queues.enqueue_low("low-job".to_string()).await;
        queues.enqueue_high("high-job".to_string()).await;
        let first = queues.dequeue().await;
        assert_eq!(first, "high-job");
    }

    #[test]
    fn discover_links_skips_excluded_patterns() {
        let html = r#"<a href="/login">login</a><a href="/about">about</a>"#;
        let links = discover_links(html, "https://example.com/");
        assert_eq!(links.len(), 1);
        assert!(links[0].0.ends_with("/about"));
    }

    #[test]
    fn host_allowed_accepts_subdomains() {
        let mut allowed = HashSet::new();
        allowed.insert("example.com".to_string());
        assert!(host_allowed("https://docs.example.com/page", &allowed));
        assert!(!host_allowed("https://other.org/page", &allowed));
    }
}
