use std::env;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub tool_registry: std::sync::Arc<crate::core::tools_registry::ToolRegistry>,
    // Cache for performance
    pub scrape_cache: moka::future::Cache<String, super::types::ScrapeResponse>, // key: url
    // Concurrency control for external calls
    pub outbound_limit: std::sync::Arc<tokio::sync::Semaphore>,
    // Proxy manager for dynamic IP rotation (optional)
    pub proxy_manager: Option<std::sync::Arc<crate::proxy_manager::ProxyManager>>,

    // Shared persistent browser instance (tab reuse — avoids launch overhead per request).
    pub browser_pool: Option<std::sync::Arc<crate::scraping::browser_manager::BrowserPool>>,

    /// File-based config loaded from `shadowcrawl.json` (env-var fallback for all fields).
    pub shadow_config: std::sync::Arc<crate::core::config::ShadowConfig>,

    /// Crawling and content pipeline manager (optional — absent when the
    /// crawler is disabled or fails to initialize at startup).
    pub crawler_manager: Option<std::sync::Arc<crate::crawler::manager::Manager>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("proxy_manager_enabled", &self.proxy_manager.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(http_client: reqwest::Client) -> Self {
        let outbound_limit = env::var("OUTBOUND_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(32);

        let tool_registry = std::sync::Arc::new(crate::core::tools_registry::ToolRegistry::load());
        Self {
            http_client,
            tool_registry,
            scrape_cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(std::time::Duration::from_secs(60 * 30))
                .build(),
            outbound_limit: std::sync::Arc::new(tokio::sync::Semaphore::new(outbound_limit)),
            proxy_manager: None, // Will be initialized if IP_LIST_PATH exists
            browser_pool: crate::scraping::browser_manager::BrowserPool::new_auto(),
            shadow_config: std::sync::Arc::new(crate::core::config::load_shadow_config()),
            crawler_manager: None,
        }
    }

    pub fn with_crawler_manager(
        mut self,
        manager: std::sync::Arc<crate::crawler::manager::Manager>,
    ) -> Self {
        self.crawler_manager = Some(manager);
        self
    }

    pub fn with_proxy_manager(
        mut self,
        proxy_manager: std::sync::Arc<crate::proxy_manager::ProxyManager>,
    ) -> Self {
        self.proxy_manager = Some(proxy_manager);
        self
    }
}
