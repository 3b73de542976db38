//! Title / meta-description / publish-date / body extraction cascade, text
//! normalization, excerpt building, and tag guessing, built on `scraper`,
//! the same HTML crate already used by `tools/crawl.rs`.

use crate::crawler::model::CrawlResult;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const ARTICLE_SELECTORS: &[&str] = &[
    "article",
    "main article",
    "div[itemtype='http://schema.org/Article']",
    "div[itemtype='https://schema.org/Article']",
    "div.post-content",
    "div.entry-content",
];

const RELEVANT_META_KEYS: &[&str] = &["description", "og:description", "twitter:description"];

const PUBLISH_META_KEYS: &[&str] = &[
    "article:published_time",
    "article:modified_time",
    "og:updated_time",
    "date",
    "dc.date",
    "dc.date.issued",
    "dc.date.created",
    "pubdate",
];

/// Everything pulled out of a fetched page before scoring, ready to be
/// folded into a `CrawlResult`.
pub struct ExtractedPage {
    pub title: String,
    pub meta_description: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub text_content: String,
    pub normalized_text: String,
    pub excerpt: String,
    pub content_hash: String,
    pub tokens_est: u64,
}

pub fn extract(html: &str) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc);
    let meta_description = extract_meta(&doc, RELEVANT_META_KEYS);
    let publish_date = extract_publish_date(&doc);
    let text_content = extract_text(&doc);
    let normalized_text = normalize_text(&doc);
    let excerpt = build_excerpt(&text_content, 420);
    let content_hash = hex::encode(Sha256::digest(normalized_text.as_bytes()));
    let tokens_est = (normalized_text.chars().count() / 4) as u64;

    ExtractedPage {
        title,
        meta_description,
        publish_date,
        text_content,
        normalized_text,
        excerpt,
        content_hash,
        tokens_est,
    }
}

fn extract_title(doc: &Html) -> String {
    if let Ok(sel) = Selector::parse("title") {
        if let Some(node) = doc.select(&sel).next() {
            let text = node.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    if let Some(og) = meta_content(doc, "og:title") {
        return og;
    }
    if let Ok(sel) = Selector::parse("h1") {
        if let Some(node) = doc.select(&sel).next() {
            let text = node.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    "Untitled Document".to_string()
}

fn extract_meta(doc: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| meta_content(doc, key))
}

fn meta_content(doc: &Html, key: &str) -> Option<String> {
    let by_name = format!("meta[name='{key}']");
    let by_property = format!("meta[property='{key}']");
    for selector_str in [by_name, by_property] {
        if let Ok(sel) = Selector::parse(&selector_str) {
            if let Some(node) = doc.select(&sel).next() {
                if let Some(content) = node.value().attr("content") {
                    let content = content.trim();
                    if !content.is_empty() {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }
    None
}

fn extract_publish_date(doc: &Html) -> Option<DateTime<Utc>> {
    for key in PUBLISH_META_KEYS {
        if let Some(raw) = meta_content(doc, key) {
            if let Some(dt) = parse_any_date(&raw) {
                return Some(dt);
            }
        }
    }
    if let Ok(sel) = Selector::parse("time") {
        if let Some(node) = doc.select(&sel).next() {
            if let Some(raw) = node.value().attr("datetime") {
                if let Some(dt) = parse_any_date(raw) {
                    return Some(dt);
                }
            }
        }
    }
    None
}

fn parse_any_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc2822(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

fn extract_text(doc: &Html) -> String {
    for selector_str in ARTICLE_SELECTORS {
        if let Ok(sel) = Selector::parse(selector_str) {
            if let Some(node) = doc.select(&sel).next() {
                let text = node.text().collect::<Vec<_>>().join(" ");
                let text = collapse_whitespace(&text);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    let Ok(p_sel) = Selector::parse("p") else {
        return String::new();
    };
    let paragraphs: Vec<String> = doc
        .select(&p_sel)
        .map(|n| collapse_whitespace(&n.text().collect::<Vec<_>>().join(" ")))
        .filter(|s| !s.is_empty())
        .collect();
    paragraphs.join(" ")
}

/// Strip script/style/nav/footer/aside, then join paragraph- and
/// heading-level text with newlines, matching `_normalize_text`.
fn normalize_text(doc: &Html) -> String {
    let Ok(sel) = Selector::parse("p, h1, h2, h3, h4, h5, h6, li") else {
        return String::new();
    };
    let excluded_ancestors = ["script", "style", "nav", "footer", "aside"];
    let mut parts = Vec::new();
    'outer: for node in doc.select(&sel) {
        for ancestor in node.ancestors() {
            if let Some(el) = scraper::ElementRef::wrap(ancestor) {
                if excluded_ancestors.contains(&el.value().name()) {
                    continue 'outer;
                }
            }
        }
        let text = collapse_whitespace(&node.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn build_excerpt(text: &str, max_length: usize) -> String {
    let clean = collapse_whitespace(text);
    if clean.chars().count() <= max_length {
        return clean;
    }
    let truncated: String = clean.chars().take(max_length.saturating_sub(3)).collect();
    format!("{}...", truncated.trim_end())
}

pub fn guess_tags(matched_keywords: &[String], additional: Option<&[String]>) -> Vec<String> {
    let mut tags: BTreeSet<String> = matched_keywords.iter().map(|k| k.to_lowercase()).collect();
    if let Some(extra) = additional {
        tags.extend(extra.iter().map(|t| t.to_lowercase()));
    }
    tags.into_iter().collect()
}

/// Fold an `ExtractedPage` plus scoring outputs into the fields `CrawlResult`
/// doesn't already have set from job context.
pub fn apply_to_result(result: &mut CrawlResult, page: ExtractedPage) {
    result.title = page.title;
    result.meta_description = page.meta_description;
    result.publish_date = page.publish_date;
    result.content = page.text_content;
    result.normalized_text = Some(page.normalized_text);
    result.excerpt = page.excerpt;
    result.content_hash = page.content_hash;
    result.tokens_est = page.tokens_est;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html>
        <head>
            <title>Example Article</title>
            <meta name="description" content="A short summary.">
            <meta property="article:published_time" content="2024-03-01T12:00:00Z">
        </head>
        <body>
            <nav><a href="/">skip me</a></nav>
            <article>
                <h1>Heading</h1>
                <p>First paragraph of real content.</p>
                <p>Second paragraph with more detail.</p>
            </article>
            <footer>ignore footer text</footer>
        </body>
        </html>
    "#;

    #[test]
    fn extracts_title_meta_and_date() {
        let page = extract(SAMPLE);
        assert_eq!(page.title, "Example Article");
        assert_eq!(page.meta_description.as_deref(), Some("A short summary."));
        assert!(page.publish_date.is_some());
    }

    #[test]
    fn text_content_prefers_article_selector() {
        let page = extract(SAMPLE);
        assert!(page.text_content.contains("First paragraph"));
        assert!(!page.text_content.contains("skip me"));
    }

    #[test]
    fn normalized_text_excludes_nav_and_footer() {
        let page = extract(SAMPLE);
        assert!(!page.normalized_text.contains("skip me"));
        assert!(!page.normalized_text.contains("ignore footer text"));
        assert!(page.normalized_text.contains("First paragraph"));
    }

    #[test]
    fn content_hash_is_stable_for_same_input() {
        let a = extract(SAMPLE);
        let b = extract(SAMPLE);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn excerpt_truncates_long_text() {
        let long = "word ".repeat(200);
        let excerpt = build_excerpt(&long, 420);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= 420);
    }

    #[test]
    fn guess_tags_lowercases_and_dedupes() {
        let tags = guess_tags(
            &["Rust".to_string(), "rust".to_string()],
            Some(&["WebDev".to_string()]),
        );
        assert_eq!(tags, vec!["rust".to_string(), "webdev".to_string()]);
    }
}
