//! An hourly loop that selects qualified, unposted results, generates an
//! article via the LLM provider, and hands it to an external
//! `ArticlePoster`.

use crate::crawler::config::CrawlerConfig;
use crate::crawler::external::{ArticlePoster, NewPost};
use crate::crawler::llm::{ChatMessage, ChatOptions, LlmProvider};
use crate::crawler::manager::Manager;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SOURCE_FOOTER_TEMPLATE: &str = "\n\n<hr>\n<p><strong>Source:</strong> <a href=\"{url}\" target=\"_blank\">{url}</a></p>";

pub struct Publisher {
    manager: Arc<Manager>,
    poster: Arc<dyn ArticlePoster>,
    llm_provider: Option<Arc<dyn LlmProvider>>,
    config: CrawlerConfig,
}

impl Publisher {
    pub fn new(
        manager: Arc<Manager>,
        poster: Arc<dyn ArticlePoster>,
        llm_provider: Option<Arc<dyn LlmProvider>>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            manager,
            poster,
            llm_provider,
            config,
        }
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(self.config.publisher_interval_seconds));
            loop {
                ticker.tick().await;
                if let Err(e) = self.process_hourly().await {
                    tracing::error!("auto-publisher hourly run failed: {e}");
                }
            }
        });
    }

    async fn process_hourly(&self) -> anyhow::Result<()> {
        tracing::info!("auto-publisher: processing hourly crawl results");

        let searcher = crate::crawler::search::Searcher::new(
            self.manager.store_handle(),
            self.manager.shard_writer_handle(),
            self.config.train_dir.clone(),
        );
        let hits = searcher
            .search("", 20, self.config.publisher_min_score, 1)
            .await;

        if hits.is_empty() {
            tracing::info!("no new high-quality results to publish");
            return Ok(());
        }

        let mut candidates = Vec::new();
        for hit in hits {
            if let Some(result) = self.manager.find_result_by_url(&hit.url).await {
                if result.posted_at.is_none() {
                    candidates.push(result);
                }
            }
        }
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut published_hashes: HashSet<String> = HashSet::new();
        let mut posted_count = 0usize;

        for mut result in candidates.into_iter().take(self.config.publisher_max_posts_per_hour) {
            if published_hashes.contains(&result.content_hash) {
                tracing::info!("skipping duplicate content for result {}", result.title);
                continue;
            }

            match self.create_post(&result).await {
                Ok(Some((post_id, _link))) => {
                    result.posted_at = Some(Utc::now());
                    result.post_id = Some(post_id);
                    self.manager.update_result(&result.id, result.clone()).await;
                    published_hashes.insert(result.content_hash.clone());
                    posted_count += 1;
                    tracing::info!("published result: {} (score {:.2})", result.title, result.score);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("error publishing result {}: {e}", result.id),
            }
        }

        tracing::info!("auto-publisher: posted {posted_count} new articles");
        Ok(())
    }

    /// Generate an article for `result` and hand it to the poster. Returns
    /// `Ok(None)` for configuration gaps that should be logged but not
    /// treated as errors (no WordPress config, no model configured).
    async fn create_post(
        &self,
        result: &crate::crawler::model::CrawlResult,
    ) -> anyhow::Result<Option<(String, String)>> {
        if self.config.wordpress_url.is_none()
            || self.config.wordpress_user.is_none()
            || self.config.wordpress_password.is_none()
        {
            tracing::warn!("wordpress not configured, skipping post creation for {}", result.title);
            return Ok(None);
        }

        let Some(provider) = self.llm_provider.as_deref() else {
            tracing::warn!("no llm provider configured, skipping post generation");
            return Ok(None);
        };
        let model = self
            .config
            .summary_model
            .clone()
            .unwrap_or_else(|| "gpt-oss:cloud/120b".to_string());

        let prompt = format!(
            "Write a professional news article based on the following information:\n\n\
             Title: {}\nURL: {}\nSummary: {}\n\nContent:\n{}\n\n\
             Write a well-structured article with an introduction, a body of \
             three to four paragraphs, and a conclusion. Use an objective, \
             informative journalistic style.",
            result.title,
            result.url,
            result.summary.clone().unwrap_or_default(),
            result.content.chars().take(2000).collect::<String>(),
        );
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: "You are a professional technology journalist.".to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt,
            },
        ];

        let stream = provider
            .stream_chat(&model, messages, ChatOptions { temperature: 0.7 })
            .await?;
        let chunks: Vec<String> = stream.collect::<Vec<_>>().await.into_iter().collect::<anyhow::Result<Vec<_>>>()?;
        let mut article = chunks.concat();
        article.push_str(&SOURCE_FOOTER_TEMPLATE.replace("{url}", &result.url));

        let post = NewPost {
            title: result.title.clone(),
            content: article,
            status: "publish".to_string(),
            categories: self.config.wordpress_category_id.map(|id| vec![id]),
        };
        let posted = self.poster.create_post(post).await?;
        Ok(Some((posted.id, posted.link)))
    }
}
