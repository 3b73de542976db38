//! Ranks in-memory and on-disk results against a query with Okapi BM25,
//! fused with each result's own relevance score. No crate in this
//! codebase's dependency stack provides BM25, so the ~30-line Okapi formula
//! is implemented here rather than reached for.

use crate::crawler::model::{SearchHit, ShardRecord};
use crate::crawler::shard::ShardWriter;
use crate::crawler::store::ResultStore;
use chrono::{DateTime, NaiveDateTime, Utc};

const MAX_SCAN_DOCS: usize = 10_000;
const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;
const BM25_EPSILON: f64 = 0.25;

struct ScanDoc {
    url: String,
    title: String,
    excerpt: String,
    source_domain: String,
    created_at: DateTime<Utc>,
    own_score: f64,
    normalized_text: String,
}

pub struct Searcher {
    store: std::sync::Arc<ResultStore>,
    shard_writer: std::sync::Arc<ShardWriter>,
    train_dir: std::path::PathBuf,
}

impl Searcher {
    pub fn new(
        store: std::sync::Arc<ResultStore>,
        shard_writer: std::sync::Arc<ShardWriter>,
        train_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            store,
            shard_writer,
            train_dir: train_dir.into(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        min_score: f64,
        freshness_days: i64,
    ) -> Vec<SearchHit> {
        let mut docs = self.collect_ram_docs().await;
        if docs.len() < MAX_SCAN_DOCS {
            self.collect_shard_docs(&mut docs, freshness_days).await;
        }
        if docs.is_empty() {
            return Vec::new();
        }

        let query_tokens: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
        let tokenized_corpus: Vec<Vec<String>> = docs
            .iter()
            .map(|d| d.normalized_text.to_lowercase().split_whitespace().map(str::to_string).collect())
            .collect();

        let bm25_scores = bm25_scores(&tokenized_corpus, &query_tokens);

        let mut hits: Vec<SearchHit> = docs
            .iter()
            .zip(bm25_scores.iter())
            .filter_map(|(doc, &bm25_score)| {
                let final_score = if doc.own_score > 0.0 {
                    (doc.own_score + bm25_score) / 2.0
                } else {
                    bm25_score
                };
                if final_score >= min_score {
                    Some(SearchHit {
                        url: doc.url.clone(),
                        title: doc.title.clone(),
                        excerpt: doc.excerpt.clone(),
                        score: final_score,
                        ts: doc.created_at,
                        source_domain: doc.source_domain.clone(),
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    async fn collect_ram_docs(&self) -> Vec<ScanDoc> {
        self.store
            .snapshot_all()
            .await
            .into_iter()
            .filter_map(|r| {
                r.normalized_text.clone().map(|text| ScanDoc {
                    url: r.url.clone(),
                    title: r.title.clone(),
                    excerpt: r.excerpt.clone(),
                    source_domain: r.source_domain.clone(),
                    created_at: r.created_at,
                    own_score: r.score,
                    normalized_text: text,
                })
            })
            .collect()
    }

    async fn collect_shard_docs(&self, docs: &mut Vec<ScanDoc>, freshness_days: i64) {
        let cutoff = Utc::now() - chrono::Duration::days(freshness_days);
        let index = self.shard_writer.index_snapshot().await;
        for entry in index {
            if docs.len() >= MAX_SCAN_DOCS {
                break;
            }
            let Some(shard_date) = parse_shard_date(&entry.name) else {
                continue;
            };
            if shard_date < cutoff {
                continue;
            }
            let shard_path = self.train_dir.join(&entry.name);
            if let Ok(contents) = tokio::fs::read_to_string(&shard_path).await {
                for line in contents.lines() {
                    if docs.len() >= MAX_SCAN_DOCS {
                        break;
                    }
                    let Ok(record) = serde_json::from_str::<ShardRecord>(line) else {
                        continue;
                    };
                    if let Some(text) = record.normalized_text {
                        docs.push(ScanDoc {
                            url: record.url,
                            title: record.title,
                            excerpt: record.excerpt,
                            source_domain: record.source_domain,
                            created_at: record.created_at,
                            own_score: record.score,
                            normalized_text: text,
                        });
                    }
                }
            }
        }
    }
}

fn parse_shard_date(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_prefix("crawl-train-")?.strip_suffix(".jsonl")?;
    let naive = NaiveDateTime::parse_from_str(stem, "%Y%m%d-%H").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Okapi BM25 scores for every document in `corpus` against `query`,
/// matching `rank_bm25.BM25Okapi`'s defaults (k1=1.5, b=0.75, epsilon=0.25).
fn bm25_scores(corpus: &[Vec<String>], query: &[String]) -> Vec<f64> {
    let n = corpus.len();
    if n == 0 {
        return Vec::new();
    }

    let doc_lens: Vec<f64> = corpus.iter().map(|d| d.len() as f64).collect();
    let avgdl = doc_lens.iter().sum::<f64>() / n as f64;

    let mut doc_freqs: Vec<std::collections::HashMap<&str, usize>> = Vec::with_capacity(n);
    let mut doc_count_containing: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for doc in corpus {
        let mut freqs: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for term in doc {
            *freqs.entry(term.as_str()).or_insert(0) += 1;
        }
        for term in freqs.keys() {
            *doc_count_containing.entry(term).or_insert(0) += 1;
        }
        doc_freqs.push(freqs);
    }

    let mut idf: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
    let mut idf_sum = 0.0;
    let mut negative_terms = Vec::new();
    for (&term, &freq) in &doc_count_containing {
        let value = ((n as f64 - freq as f64 + 0.5).ln()) - ((freq as f64 + 0.5).ln());
        idf.insert(term, value);
        idf_sum += value;
        if value < 0.0 {
            negative_terms.push(term);
        }
    }
    let average_idf = if idf.is_empty() { 0.0 } else { idf_sum / idf.len() as f64 };
    let eps = BM25_EPSILON * average_idf;
    for term in negative_terms {
        idf.insert(term, eps);
    }

    let mut scores = vec![0.0; n];
    for term in query {
        let term_idf = *idf.get(term.as_str()).unwrap_or(&0.0);
        if term_idf == 0.0 && !idf.contains_key(term.as_str()) {
            continue;
        }
        for (i, freqs) in doc_freqs.iter().enumerate() {
            let q_freq = *freqs.get(term.as_str()).unwrap_or(&0) as f64;
            if q_freq == 0.0 {
                continue;
            }
            let denom = q_freq + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_lens[i] / avgdl);
            scores[i] += term_idf * (q_freq * (BM25_K1 + 1.0)) / denom;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn bm25_ranks_more_relevant_doc_higher() {
        let corpus = vec![
            tok("rust programming language systems"),
            tok("cooking recipes for dinner"),
            tok("rust rust rust memory safety programming"),
        ];
        let query = tok("rust programming");
        let scores = bm25_scores(&corpus, &query);
        assert!(scores[2] > scores[0]);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn bm25_empty_corpus_yields_no_scores() {
        let scores = bm25_scores(&[], &tok("anything"));
        assert!(scores.is_empty());
    }

    #[test]
    fn bm25_query_term_absent_from_corpus_is_zero_contribution() {
        let corpus = vec![tok("completely unrelated text here")];
        let scores = bm25_scores(&corpus, &tok("rust"));
        assert_eq!(scores[0], 0.0);
    }
}
