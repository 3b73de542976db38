pub mod common;
pub mod crawl_website;
pub mod extract_structured;
pub mod fetch_then_extract;
pub mod proxy_manager;
pub mod scrape_batch;
pub mod scrape_url;
