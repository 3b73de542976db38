//! An opaque streaming chat provider, used for Ollama-assisted relevance
//! analysis and article-summary generation. Modeled as an `#[async_trait]`
//! object so the concrete HTTP client stays swappable in tests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self { temperature: 0.2 }
    }
}

/// A chat-completion provider capable of streaming tokens. Implementations
/// live outside this crate; the crawler core only ever sees this boundary.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn stream_chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>>;
}

async fn collect_stream(
    stream: BoxStream<'static, anyhow::Result<String>>,
) -> anyhow::Result<String> {
    let chunks: Vec<String> = stream
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(chunks.concat().trim().to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaAnalysis {
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub extracted_content: Option<String>,
    #[serde(default)]
    pub suggested_links: Vec<String>,
}

const SUMMARY_SYSTEM_PROMPT: &str =
    "Summarize the following article in a short headline followed by a concise bullet summary.";

/// Ask the model whether `text` is relevant to `query`, and to pull out any
/// directly-relevant content. Text is capped to 8000 chars to stay within a
/// reasonable prompt window.
pub async fn analyze_relevance(
    provider: &dyn LlmProvider,
    model: &str,
    text: &str,
    query: &str,
) -> OllamaAnalysis {
    let truncated: String = text.chars().take(8000).collect();
    let prompt = format!(
        "Analyze the following text for its relevance to the query: '{query}'. \
         Provide a relevance score between 0.0 and 1.0. \
         If the query asks for specific content, extract that content. \
         Also identify any highly relevant URLs within the text that could be further crawled. \
         Return a JSON object with 'relevance_score' (float), 'extracted_content' \
         (string, or null), and 'suggested_links' (list of strings).\n\nText: {truncated}"
    );
    let messages = vec![
        ChatMessage {
            role: "system".to_string(),
            content: "You are an intelligent content analyzer.".to_string(),
        },
        ChatMessage {
            role: "user".to_string(),
            content: prompt,
        },
    ];

    let stream = match provider
        .stream_chat(model, messages, ChatOptions::default())
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("ollama analysis failed: {e}");
            return OllamaAnalysis::default();
        }
    };

    let response = match collect_stream(stream).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("ollama stream collection failed: {e}");
            return OllamaAnalysis::default();
        }
    };

    match serde_json::from_str::<OllamaAnalysis>(&response) {
        Ok(analysis) => analysis,
        Err(_) => {
            tracing::warn!("ollama returned malformed json: {response}");
            if response.to_lowercase().contains(&query.to_lowercase()) {
                OllamaAnalysis {
                    relevance_score: 0.5,
                    extracted_content: Some(response),
                    suggested_links: vec![],
                }
            } else {
                OllamaAnalysis {
                    relevance_score: 0.0,
                    extracted_content: Some(response),
                    suggested_links: vec![],
                }
            }
        }
    }
}

/// Generate a (headline, body) summary pair, falling back to the page's
/// meta description (or a truncated excerpt) when no model is configured
/// or generation fails.
pub async fn generate_summary(
    provider: Option<&dyn LlmProvider>,
    model: Option<&str>,
    text: &str,
    meta_description: Option<&str>,
) -> (Option<String>, Option<String>) {
    if text.is_empty() {
        return (None, meta_description.map(str::to_string));
    }

    if let (Some(provider), Some(model)) = (provider, model) {
        let truncated: String = text.chars().take(6000).collect();
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: SUMMARY_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: truncated,
            },
        ];
        match provider
            .stream_chat(model, messages, ChatOptions::default())
            .await
        {
            Ok(stream) => match collect_stream(stream).await {
                Ok(summary) if !summary.is_empty() => return split_summary(&summary),
                Ok(_) => {}
                Err(e) => tracing::warn!("crawler summary generation failed: {e}"),
            },
            Err(e) => tracing::warn!("crawler summary model call failed: {e}"),
        }
    }

    let fallback = meta_description
        .map(str::to_string)
        .unwrap_or_else(|| crate::crawler::extract::build_excerpt(text, 360));
    (None, Some(fallback))
}

fn split_summary(summary_text: &str) -> (Option<String>, Option<String>) {
    let lines: Vec<&str> = summary_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return (None, None);
    }
    let headline: String = lines[0].chars().take(120).collect();
    let body = if lines.len() > 1 {
        Some(lines[1..].join("\n"))
    } else {
        None
    };
    (Some(headline), body)
}

/// `LlmProvider` backed by any OpenAI-compatible `/chat/completions` endpoint
/// (Ollama, LM Studio, or the real OpenAI API) — the same endpoint shape
/// `core::config::ShadowDeepResearchConfig` already resolves for the
/// deep-research synthesis step. The upstream response is read in full and
/// handed back as a single-item stream; none of this codebase's dependency
/// stack has an SSE parser, so real token streaming isn't attempted here.
pub struct OpenAiCompatibleProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Deserialize)]
struct ChatCompletionResponseMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn stream_chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model,
            messages: &messages,
            temperature: opts.temperature,
            stream: false,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }

        let response = request.send().await?.error_for_status()?;
        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(stream::once(async move { Ok(content) }).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_summary_separates_headline_from_body() {
        let (headline, body) = split_summary("Big News Today\nDetails follow here.\nMore detail.");
        assert_eq!(headline.as_deref(), Some("Big News Today"));
        assert_eq!(body.as_deref(), Some("Details follow here.\nMore detail."));
    }

    #[test]
    fn split_summary_handles_single_line() {
        let (headline, body) = split_summary("Just a headline");
        assert_eq!(headline.as_deref(), Some("Just a headline"));
        assert_eq!(body, None);
    }

    #[test]
    fn split_summary_empty_input_yields_none() {
        assert_eq!(split_summary("   \n  "), (None, None));
    }
}
