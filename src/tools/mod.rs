pub mod batch_scrape;
pub mod crawl;
pub mod extract;
pub mod scrape;
