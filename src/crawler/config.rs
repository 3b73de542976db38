//! Recognized configuration options, loaded the way
//! `core::config::ShadowConfig` loads `cortex-scout.json`: a JSON file
//! checked first, falling back field-by-field to environment variables,
//! falling back to a hardcoded default.

use std::path::PathBuf;

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CrawlerFileConfig {
    pub crawler_spool_dir: Option<String>,
    pub crawler_train_dir: Option<String>,
    pub crawler_max_memory_bytes: Option<u64>,
    pub crawler_flush_interval: Option<u64>,
    pub crawler_buffer_max_size: Option<usize>,
    pub crawler_retention_days: Option<u32>,
    pub crawler_summary_model: Option<String>,
    pub crawler_ollama_model: Option<String>,
    pub user_crawler_workers: Option<usize>,
    pub user_crawler_max_concurrent: Option<usize>,
    pub auto_crawler_workers: Option<usize>,
    pub auto_crawler_enabled: Option<bool>,
    pub wordpress_category_id: Option<u64>,
    pub wordpress_url: Option<String>,
    pub wordpress_user: Option<String>,
    pub wordpress_password: Option<String>,
    pub request_timeout: Option<u64>,
    pub ollama_timeout_ms: Option<u64>,
}

/// Resolved crawler configuration. Every field has a field/env/default
/// cascade mirroring `ShadowDeepResearchConfig::resolve_*` in `core/config.rs`.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub spool_dir: PathBuf,
    pub train_dir: PathBuf,
    pub max_memory_bytes: u64,
    pub flush_interval_seconds: u64,
    pub buffer_max_size: usize,
    pub retention_days: u32,
    pub summary_model: Option<String>,
    pub ollama_model: Option<String>,
    pub user_crawler_workers: usize,
    pub user_crawler_max_concurrent: usize,
    pub auto_crawler_workers: usize,
    pub auto_crawler_enabled: bool,
    pub wordpress_category_id: Option<u64>,
    pub wordpress_url: Option<String>,
    pub wordpress_user: Option<String>,
    pub wordpress_password: Option<String>,
    pub request_timeout_seconds: u64,
    pub ollama_timeout_ms: u64,

    // Publisher constants: fixed knobs, not independently configurable, so
    // they're plain fields rather than env-backed.
    pub publisher_interval_seconds: u64,
    pub publisher_min_score: f64,
    pub publisher_max_posts_per_hour: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self::resolve(&CrawlerFileConfig::default())
    }
}

impl CrawlerConfig {
    pub fn resolve(file: &CrawlerFileConfig) -> Self {
        Self {
            spool_dir: resolve_path(
                file.crawler_spool_dir.as_deref(),
                "CRAWLER_SPOOL_DIR",
                "data/crawler_spool",
            ),
            train_dir: resolve_path(
                file.crawler_train_dir.as_deref(),
                "CRAWLER_TRAIN_DIR",
                "data/crawler_train",
            ),
            max_memory_bytes: resolve_u64(
                file.crawler_max_memory_bytes,
                "CRAWLER_MAX_MEMORY_BYTES",
                256 * 1024 * 1024,
            ),
            flush_interval_seconds: resolve_u64(
                file.crawler_flush_interval,
                "CRAWLER_FLUSH_INTERVAL",
                3600,
            ),
            buffer_max_size: resolve_usize(
                file.crawler_buffer_max_size,
                "CRAWLER_BUFFER_MAX_SIZE",
                1000,
            ),
            retention_days: resolve_u32(file.crawler_retention_days, "CRAWLER_RETENTION_DAYS", 30),
            summary_model: resolve_opt_string(
                file.crawler_summary_model.as_deref(),
                "CRAWLER_SUMMARY_MODEL",
            ),
            ollama_model: resolve_opt_string(
                file.crawler_ollama_model.as_deref(),
                "CRAWLER_OLLAMA_MODEL",
            ),
            user_crawler_workers: resolve_usize(
                file.user_crawler_workers,
                "USER_CRAWLER_WORKERS",
                4,
            ),
            user_crawler_max_concurrent: resolve_usize(
                file.user_crawler_max_concurrent,
                "USER_CRAWLER_MAX_CONCURRENT",
                5,
            ),
            auto_crawler_workers: resolve_usize(
                file.auto_crawler_workers,
                "AUTO_CRAWLER_WORKERS",
                2,
            ),
            auto_crawler_enabled: resolve_bool(
                file.auto_crawler_enabled,
                "AUTO_CRAWLER_ENABLED",
                true,
            ),
            wordpress_category_id: file.wordpress_category_id,
            wordpress_url: resolve_opt_string(file.wordpress_url.as_deref(), "WORDPRESS_URL"),
            wordpress_user: resolve_opt_string(file.wordpress_user.as_deref(), "WORDPRESS_USER"),
            wordpress_password: resolve_opt_string(
                file.wordpress_password.as_deref(),
                "WORDPRESS_PASSWORD",
            ),
            request_timeout_seconds: resolve_u64(file.request_timeout, "REQUEST_TIMEOUT", 30),
            ollama_timeout_ms: resolve_u64(file.ollama_timeout_ms, "OLLAMA_TIMEOUT_MS", 30_000),

            publisher_interval_seconds: 3600,
            publisher_min_score: 0.6,
            publisher_max_posts_per_hour: 3,
        }
    }
}

/// Load `crawlcore.json` from the same search order `core/config.rs` uses for
/// `cortex-scout.json`: cwd, one directory up, then an explicit env override.
pub fn load_crawler_config() -> CrawlerConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("crawlcore.json"),
            PathBuf::from("../crawlcore.json"),
        ];
        if let Ok(env_path) = std::env::var("CRAWLCORE_CONFIG") {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                return match serde_json::from_str::<CrawlerFileConfig>(&contents) {
                    Ok(cfg) => {
                        tracing::info!("crawlcore.json loaded from {}", path.display());
                        CrawlerConfig::resolve(&cfg)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "crawlcore.json parse error at {}: {} — using defaults",
                            path.display(),
                            e
                        );
                        CrawlerConfig::default()
                    }
                };
            }
            Err(_) => continue,
        }
    }

    CrawlerConfig::default()
}

fn resolve_path(field: Option<&str>, env_key: &str, default: &str) -> PathBuf {
    if let Some(v) = field {
        if !v.trim().is_empty() {
            return PathBuf::from(v);
        }
    }
    std::env::var(env_key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn resolve_opt_string(field: Option<&str>, env_key: &str) -> Option<String> {
    if let Some(v) = field {
        if !v.trim().is_empty() {
            return Some(v.to_string());
        }
    }
    std::env::var(env_key).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_u64(field: Option<u64>, env_key: &str, default: u64) -> u64 {
    field.unwrap_or_else(|| {
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    })
}

fn resolve_u32(field: Option<u32>, env_key: &str, default: u32) -> u32 {
    field.unwrap_or_else(|| {
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    })
}

fn resolve_usize(field: Option<usize>, env_key: &str, default: usize) -> usize {
    field.unwrap_or_else(|| {
        std::env::var(env_key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    })
}

fn resolve_bool(field: Option<bool>, env_key: &str, default: bool) -> bool {
    if let Some(b) = field {
        return b;
    }
    std::env::var(env_key)
        .ok()
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            !matches!(v.as_str(), "0" | "false" | "no" | "off")
        })
        .unwrap_or(default)
}
