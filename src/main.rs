use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crawlcore::crawler::config::load_crawler_config;
use crawlcore::crawler::external::WordPressPoster;
use crawlcore::crawler::llm::{LlmProvider, OpenAiCompatibleProvider};
use crawlcore::crawler::manager::Manager;
use crawlcore::crawler::model::{CategoryMetrics, CrawlJob, CrawlJobParams, CrawlResult, JobCategory, SearchHit};
use crawlcore::crawler::publisher::Publisher;
use crawlcore::crawler::shard::ShardWriter;
use crawlcore::crawler::shared_state::SharedState;
use crawlcore::crawler::store::ResultStore;
use crawlcore::{mcp, scrape, types::*, AppState};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["SHADOWCRAWL_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Handle setup-only mode
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--setup") {
        let opts = crawlcore::setup::SetupOptions {
            mode: crawlcore::setup::SetupRunMode::SetupFlag,
            ..Default::default()
        };
        let report = crawlcore::setup::check_all(opts).await;
        println!("{}", report);
        report.print_action_required_blocks();
        if report.has_failures() {
            std::process::exit(2);
        }
        return Ok(());
    }

    info!("Starting MCP Server");

    // Pre-flight checklist (non-interactive) at startup
    let report = crawlcore::setup::check_all(crawlcore::setup::SetupOptions::default()).await;
    info!("{}", report.summarize_for_logs());
    if report.has_failures() {
        warn!("shadow-setup: startup checklist found failures; run with --setup for guided remediation");
        report.print_action_required_blocks();
    }

    // Create HTTP client
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(connect_timeout))
        .build()?;

    // Create application state
    let mut state = AppState::new(http_client);

    // Initialize proxy manager if ip.txt exists
    let ip_list_path = env::var("IP_LIST_PATH").unwrap_or_else(|_| "ip.txt".to_string());

    if tokio::fs::metadata(&ip_list_path).await.is_ok() {
        info!("Loading proxy manager from IP list: {}", ip_list_path);
        match crawlcore::proxy_manager::ProxyManager::new(&ip_list_path).await {
            Ok(proxy_manager) => {
                let status = proxy_manager.get_status().await?;
                state = state.with_proxy_manager(Arc::new(proxy_manager));
                info!(
                    "Proxy manager initialized: {} total proxies, {} enabled",
                    status.total_proxies, status.enabled_proxies
                );
            }
            Err(e) => {
                warn!(
                    "Failed to initialize proxy manager: {}. Continuing without proxy support.",
                    e
                );
            }
        }
    } else {
        info!(
            "IP list not found at {}. Proxy feature disabled.",
            ip_list_path
        );
    }

    // Wire up the crawling and content pipeline: Manager, worker pool,
    // maintenance loop, and an optional hourly Publisher.
    let crawler_config = load_crawler_config();
    let store = Arc::new(ResultStore::new(crawler_config.max_memory_bytes as usize));
    let shared_state = Arc::new(SharedState::new(
        crawler_config.spool_dir.join("shared_state.json"),
    ));
    let shard_writer = Arc::new(ShardWriter::new(crawler_config.train_dir.clone()));

    let llm_provider: Option<Arc<dyn LlmProvider>> = {
        let research_cfg = &state.shadow_config.deep_research;
        if research_cfg.resolve_synthesis_enabled() {
            Some(Arc::new(OpenAiCompatibleProvider::new(
                state.http_client.clone(),
                research_cfg.resolve_base_url(),
                research_cfg.resolve_api_key(),
            )))
        } else {
            None
        }
    };

    let manager = Arc::new(Manager::new(
        crawler_config.clone(),
        Arc::clone(&store),
        Arc::clone(&shared_state),
        Arc::clone(&shard_writer),
        llm_provider.clone(),
    ));
    manager.spawn_workers(crawler_config.user_crawler_workers);
    manager.spawn_maintenance_loop();
    info!(
        "crawler manager started with {} workers (spool: {}, train: {})",
        crawler_config.user_crawler_workers,
        crawler_config.spool_dir.display(),
        crawler_config.train_dir.display()
    );

    if crawler_config.auto_crawler_enabled {
        if let (Some(url), Some(user), Some(password)) = (
            crawler_config.wordpress_url.clone(),
            crawler_config.wordpress_user.clone(),
            crawler_config.wordpress_password.clone(),
        ) {
            let poster = Arc::new(WordPressPoster::new(
                state.http_client.clone(),
                url,
                user,
                password,
            ));
            let publisher = Arc::new(Publisher::new(
                Arc::clone(&manager),
                poster,
                llm_provider,
                crawler_config.clone(),
            ));
            publisher.spawn();
            info!("auto-publisher enabled, running every {}s", crawler_config.publisher_interval_seconds);
        } else {
            info!("auto-publisher disabled: WORDPRESS_URL/USER/PASSWORD not configured");
        }
    }

    let state = state.with_crawler_manager(manager);
    let state = Arc::new(state);

    // Build router
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/.well-known/mcp/server-card.json", get(server_card))
        .route("/mcp", post(mcp_rpc_handler))
        .route("/scrape", post(scrape_url_handler))
        .route("/mcp/tools", get(mcp::list_tools))
        .route("/mcp/call", post(mcp::call_tool))
        .route("/crawler/jobs", post(create_crawl_job_handler))
        .route("/crawler/jobs/{id}", get(get_crawl_job_handler))
        .route("/crawler/results/{id}", get(get_crawl_result_handler))
        .route("/crawler/search", get(crawler_search_handler))
        .route("/crawler/metrics", get(crawler_metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let port: u16 = parse_port_from_args()
        .or_else(port_from_env)
        .unwrap_or(5000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/SHADOWCRAWL_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("MCP Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    if let Some(pool) = state.browser_pool.as_ref() {
        pool.shutdown().await;
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shadowcrawl",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn server_card(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tools: Vec<serde_json::Value> = state
        .tool_registry
        .public_specs()
        .into_iter()
        .map(|spec| {
            serde_json::json!({
                "name": spec.public_name,
                "description": spec.public_description
            })
        })
        .collect();

    Json(serde_json::json!({
        "serverInfo": {
            "name": "ShadowCrawl",
            "version": env!("CARGO_PKG_VERSION")
        },
        "tools": tools,
        "resources": [],
        "prompts": []
    }))
}

async fn mcp_rpc_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let id = request
        .get("id")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let method = request
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();

    match method {
        "initialize" => Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2025-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "ShadowCrawl",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }
        })),
        "tools/list" => {
            let tools = mcp::http::list_tools_for_state(state.as_ref());
            Json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": tools
            }))
        }
        _ => Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": -32601,
                "message": "Method not found"
            }
        })),
    }
}

async fn scrape_url_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, (StatusCode, Json<ErrorResponse>)> {
    match scrape::scrape_url(&state, &request.url).await {
        Ok(content) => Ok(Json(content)),
        Err(e) => {
            error!("Scrape error: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

fn crawler_unavailable() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "crawler manager not initialized".to_string(),
        }),
    )
}

async fn create_crawl_job_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<CrawlJobParams>,
) -> Result<Json<CrawlJob>, (StatusCode, Json<ErrorResponse>)> {
    let Some(manager) = state.crawler_manager.as_ref() else {
        return Err(crawler_unavailable());
    };
    manager.create_job(params).await.map(Json).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })
}

async fn get_crawl_job_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CrawlJob>, (StatusCode, Json<ErrorResponse>)> {
    let Some(manager) = state.crawler_manager.as_ref() else {
        return Err(crawler_unavailable());
    };
    manager.get_job(&id).await.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("job {id} not found"),
            }),
        )
    })
}

async fn get_crawl_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CrawlResult>, (StatusCode, Json<ErrorResponse>)> {
    let Some(manager) = state.crawler_manager.as_ref() else {
        return Err(crawler_unavailable());
    };
    manager.get_result(&id).await.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("result {id} not found"),
            }),
        )
    })
}

#[derive(serde::Deserialize)]
struct CrawlerSearchQuery {
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
    #[serde(default)]
    min_score: f64,
    #[serde(default = "default_freshness_days")]
    freshness_days: i64,
}

fn default_search_limit() -> usize {
    10
}

fn default_freshness_days() -> i64 {
    365
}

async fn crawler_search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CrawlerSearchQuery>,
) -> Result<Json<Vec<SearchHit>>, (StatusCode, Json<ErrorResponse>)> {
    let Some(manager) = state.crawler_manager.as_ref() else {
        return Err(crawler_unavailable());
    };
    let searcher = crawlcore::crawler::search::Searcher::new(
        manager.store_handle(),
        manager.shard_writer_handle(),
        manager.config_train_dir(),
    );
    let hits = searcher
        .search(&query.q, query.limit, query.min_score, query.freshness_days)
        .await;
    Ok(Json(hits))
}

async fn crawler_metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<std::collections::HashMap<JobCategory, CategoryMetrics>>, (StatusCode, Json<ErrorResponse>)> {
    let Some(manager) = state.crawler_manager.as_ref() else {
        return Err(crawler_unavailable());
    };
    Ok(Json(manager.metrics_snapshot().await))
}
