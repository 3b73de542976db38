//! Core data model: `CrawlJob`, `CrawlResult`, feedback, and the small enums
//! that give the pipeline a closed, tagged-variant vocabulary instead of the
//! dict-typed JSON the reference implementation passed around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCategory {
    User,
    Auto,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    PartialComplete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::PartialComplete | JobStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Crawled,
    Published,
    Error,
}

/// Parameters supplied at job-creation time. Validated by `Manager::create_job`
/// before a `CrawlJob` is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJobParams {
    pub keywords: Vec<String>,
    pub seeds: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_seconds: f64,
    #[serde(default)]
    pub allow_external: bool,
    #[serde(default)]
    pub user_context: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub ollama_assisted: bool,
    #[serde(default)]
    pub ollama_query: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn default_max_depth() -> usize {
    3
}
fn default_max_pages() -> usize {
    50
}
fn default_relevance_threshold() -> f64 {
    0.35
}
fn default_rate_limit() -> f64 {
    1.0
}
fn default_priority() -> Priority {
    Priority::Low
}

impl CrawlJobParams {
    /// Clamp bounds into their allowed ranges. Called once, at `CrawlJob`
    /// construction, so a stored job's bounds are always valid.
    pub fn clamp(&mut self) {
        self.max_depth = self.max_depth.min(5);
        self.max_pages = self.max_pages.clamp(1, 500);
        self.relevance_threshold = self.relevance_threshold.clamp(0.1, 0.95);
        self.rate_limit_seconds = self.rate_limit_seconds.clamp(0.1, 10.0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: String,
    pub idempotency_key: Option<String>,

    pub keywords: Vec<String>,
    pub seeds: Vec<String>,
    pub max_depth: usize,
    pub max_pages: usize,
    pub relevance_threshold: f64,
    pub rate_limit_seconds: f64,
    pub allow_external: bool,
    pub user_context: Option<String>,
    pub requested_by: Option<String>,
    pub metadata: serde_json::Value,
    pub priority: Priority,
    pub category: JobCategory,
    pub ollama_assisted: bool,
    pub ollama_query: Option<String>,

    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pages_crawled: usize,
    pub results: Vec<String>,
    pub error: Option<String>,
    pub allowed_domains: BTreeSet<String>,
}

impl CrawlJob {
    pub fn categorize(requested_by: Option<&str>, priority: Priority) -> JobCategory {
        if requested_by == Some("user") || priority == Priority::High {
            JobCategory::User
        } else if matches!(requested_by, Some("auto_crawler") | Some("auto")) {
            JobCategory::Auto
        } else {
            JobCategory::Background
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn set_terminal(&mut self, status: JobStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        self.touch();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlFeedback {
    pub score: f64,
    #[serde(default)]
    pub comment: Option<String>,
    pub source: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub id: String,
    pub job_id: String,
    pub url: String,
    pub source_domain: String,
    pub parent_url: Option<String>,
    pub depth: usize,

    pub title: String,
    pub headline: Option<String>,
    pub content: String,
    pub excerpt: String,
    pub summary: Option<String>,
    pub meta_description: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub normalized_text: Option<String>,
    pub content_hash: String,
    pub tokens_est: u64,
    pub extracted_content_ollama: Option<String>,

    pub score: f64,
    pub keywords_matched: Vec<String>,
    pub tags: Vec<String>,

    pub feedback: Vec<CrawlFeedback>,
    pub rating_count: usize,
    pub rating_average: f64,
    pub confirmations: usize,

    pub posted_at: Option<DateTime<Utc>>,
    pub post_id: Option<String>,
    pub topic_id: Option<String>,
    pub status: ResultStatus,

    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Recompute `size_bytes` from the record's current JSON encoding.
    /// Called by the store on every insert/update.
    pub fn recompute_size(&mut self) {
        self.size_bytes = serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0);
    }

    pub fn add_feedback(&mut self, feedback: CrawlFeedback) {
        let confirmed = feedback.confirmed;
        self.feedback.push(feedback);
        self.rating_count = self.feedback.len();
        self.rating_average = if self.rating_count > 0 {
            self.feedback.iter().map(|f| f.score).sum::<f64>() / self.rating_count as f64
        } else {
            0.0
        };
        if confirmed {
            self.confirmations += 1;
        }
        self.updated_at = Utc::now();
    }

    pub fn ready_for_publication(&self, min_age_minutes: i64, now: DateTime<Utc>) -> bool {
        self.posted_at.is_none()
            && self.rating_count >= 2
            && self.rating_average >= 4.0
            && self.confirmations >= 1
            && now.signed_duration_since(self.created_at).num_minutes() >= min_age_minutes
    }
}

/// A shard-record view of `CrawlResult` that omits the full `content` body
/// but keeps everything else. Unknown fields are ignored on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardRecord {
    pub id: String,
    pub job_id: String,
    pub url: String,
    pub source_domain: String,
    pub parent_url: Option<String>,
    pub depth: usize,

    pub title: String,
    pub headline: Option<String>,
    pub excerpt: String,
    pub summary: Option<String>,
    pub meta_description: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub normalized_text: Option<String>,
    pub content_hash: String,
    pub tokens_est: u64,

    pub score: f64,
    pub keywords_matched: Vec<String>,
    pub tags: Vec<String>,

    pub rating_count: usize,
    pub rating_average: f64,
    pub confirmations: usize,

    pub posted_at: Option<DateTime<Utc>>,
    pub post_id: Option<String>,
    pub topic_id: Option<String>,
    pub status: ResultStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CrawlResult> for ShardRecord {
    fn from(r: &CrawlResult) -> Self {
        Self {
            id: r.id.clone(),
            job_id: r.job_id.clone(),
            url: r.url.clone(),
            source_domain: r.source_domain.clone(),
            parent_url: r.parent_url.clone(),
            depth: r.depth,
            title: r.title.clone(),
            headline: r.headline.clone(),
            excerpt: r.excerpt.clone(),
            summary: r.summary.clone(),
            meta_description: r.meta_description.clone(),
            publish_date: r.publish_date,
            normalized_text: r.normalized_text.clone(),
            content_hash: r.content_hash.clone(),
            tokens_est: r.tokens_est,
            score: r.score,
            keywords_matched: r.keywords_matched.clone(),
            tags: r.tags.clone(),
            rating_count: r.rating_count,
            rating_average: r.rating_average,
            confirmations: r.confirmations,
            posted_at: r.posted_at,
            post_id: r.post_id.clone(),
            topic_id: r.topic_id.clone(),
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub score: f64,
    pub ts: DateTime<Utc>,
    pub source_domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub pages_crawled: u64,
    pub pages_failed: u64,
    pub requests_429: u64,
    pub requests_5xx: u64,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl CategoryMetrics {
    pub fn record_success(&mut self) {
        self.pages_crawled += 1;
    }

    pub fn record_failure(&mut self, status: Option<u16>) {
        self.pages_failed += 1;
        match status {
            Some(429) => self.requests_429 += 1,
            Some(s) if s >= 500 => self.requests_5xx += 1,
            _ => {}
        }
        self.last_error_at = Some(Utc::now());
    }
}
