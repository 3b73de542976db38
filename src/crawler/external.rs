//! The outbound contracts the crawler core depends on without owning an
//! implementation of — a WordPress-style poster and the LLM provider
//! re-exported from `llm.rs`. Modeled as `#[async_trait]` objects so the
//! concrete HTTP client stays swappable in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::crawler::llm::LlmProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub status: String,
    #[serde(default)]
    pub categories: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostedArticle {
    pub id: String,
    pub link: String,
}

/// The publish-side contract: `create_post` hands a finished article to
/// whatever CMS sits behind it and reports back an id/link pair.
#[async_trait]
pub trait ArticlePoster: Send + Sync {
    async fn create_post(&self, post: NewPost) -> anyhow::Result<PostedArticle>;
}

/// `ArticlePoster` backed by the WordPress REST API
/// (`POST /wp-json/wp/v2/posts`, HTTP Basic auth with an application
/// password), a direct port of
/// `original_source/app/services/wordpress.py`'s `WordPressService.create_post`.
pub struct WordPressPoster {
    http: reqwest::Client,
    site_url: String,
    username: String,
    password: String,
}

impl WordPressPoster {
    pub fn new(http: reqwest::Client, site_url: String, username: String, password: String) -> Self {
        Self {
            http,
            site_url,
            username,
            password,
        }
    }
}

#[derive(Deserialize)]
struct WpPostResponse {
    id: u64,
    link: String,
}

#[async_trait]
impl ArticlePoster for WordPressPoster {
    async fn create_post(&self, post: NewPost) -> anyhow::Result<PostedArticle> {
        let url = format!(
            "{}/wp-json/wp/v2/posts",
            self.site_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&post)
            .send()
            .await?
            .error_for_status()?;
        let parsed: WpPostResponse = response.json().await?;
        Ok(PostedArticle {
            id: parsed.id.to_string(),
            link: parsed.link,
        })
    }
}
