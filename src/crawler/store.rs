//! A memory-bounded, byte-accounted LRU store keyed by result id, with
//! dedup-by-content-hash. An explicit insertion-order LRU and content-hash
//! index guarded by one mutex, rather than a TTL cache, since callers need
//! exact, observable eviction and dedup outcomes.

use crate::crawler::model::CrawlResult;
use std::collections::HashMap;
use tokio::sync::Mutex;

struct Inner {
    /// Insertion/access order, oldest first — the LRU queue.
    order: Vec<String>,
    records: HashMap<String, CrawlResult>,
    /// content_hash -> result id, so dedup lookups don't scan every record.
    by_hash: HashMap<String, String>,
    current_usage: usize,
}

pub struct ResultStore {
    max_memory_bytes: usize,
    inner: Mutex<Inner>,
}

impl ResultStore {
    pub fn new(max_memory_bytes: usize) -> Self {
        Self {
            max_memory_bytes,
            inner: Mutex::new(Inner {
                order: Vec::new(),
                records: HashMap::new(),
                by_hash: HashMap::new(),
                current_usage: 0,
            }),
        }
    }

    /// Insert a result, applying content-hash dedup and LRU eviction.
    /// Returns the id of the record that ended up live in the store
    /// (either `result.id`, or the pre-existing id it lost to).
    pub async fn add(&self, mut result: CrawlResult) -> String {
        result.recompute_size();
        let mut inner = self.inner.lock().await;

        if let Some(existing_id) = inner.by_hash.get(&result.content_hash).cloned() {
            let existing = inner.records.get(&existing_id).expect("index consistency");
            let keep_new = result.score > existing.score || result.updated_at > existing.updated_at;
            if !keep_new {
                return existing_id;
            }
            // Replace the existing entry in place: same slot in `order`,
            // usage delta applied, content-hash index repointed.
            let old_size = existing.size_bytes;
            let new_id = result.id.clone();
            inner.current_usage = inner.current_usage - old_size + result.size_bytes;
            inner.records.remove(&existing_id);
            inner.order.retain(|id| id != &existing_id);
            inner.order.push(new_id.clone());
            inner.by_hash.insert(result.content_hash.clone(), new_id.clone());
            inner.records.insert(new_id.clone(), result);
            self.evict_if_needed(&mut inner);
            return new_id;
        }

        let id = result.id.clone();
        let size = result.size_bytes;
        self.evict_to_fit(&mut inner, size);
        inner.current_usage += size;
        inner.by_hash.insert(result.content_hash.clone(), id.clone());
        inner.order.push(id.clone());
        inner.records.insert(id.clone(), result);
        id
    }

    pub async fn get(&self, id: &str) -> Option<CrawlResult> {
        self.inner.lock().await.records.get(id).cloned()
    }

    /// Replace an existing record by id, adjusting the usage accounting by
    /// the size delta.
    pub async fn update(&self, id: &str, mut new_result: CrawlResult) -> bool {
        new_result.recompute_size();
        let mut inner = self.inner.lock().await;
        let Some(old) = inner.records.get(id) else {
            return false;
        };
        let old_size = old.size_bytes;
        let old_hash = old.content_hash.clone();
        inner.current_usage = inner.current_usage - old_size + new_result.size_bytes;
        if old_hash != new_result.content_hash {
            inner.by_hash.remove(&old_hash);
            inner
                .by_hash
                .insert(new_result.content_hash.clone(), id.to_string());
        }
        inner.records.insert(id.to_string(), new_result);
        true
    }

    pub async fn list(&self, predicate: impl Fn(&CrawlResult) -> bool) -> Vec<CrawlResult> {
        self.inner
            .lock()
            .await
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub async fn snapshot_all(&self) -> Vec<CrawlResult> {
        self.inner.lock().await.records.values().cloned().collect()
    }

    pub async fn current_usage(&self) -> usize {
        self.inner.lock().await.current_usage
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    fn evict_if_needed(&self, inner: &mut Inner) {
        self.evict_to_fit(inner, 0);
    }

    /// Evict oldest-first until `current_usage + incoming <= max_memory_bytes`.
    fn evict_to_fit(&self, inner: &mut Inner, incoming: usize) {
        while !inner.order.is_empty()
            && inner.current_usage + incoming > self.max_memory_bytes
        {
            let victim_id = inner.order.remove(0);
            if let Some(victim) = inner.records.remove(&victim_id) {
                inner.current_usage = inner.current_usage.saturating_sub(victim.size_bytes);
                inner.by_hash.remove(&victim.content_hash);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(id: &str, hash: &str, score: f64, bytes_pad: usize) -> CrawlResult {
        CrawlResult {
            id: id.to_string(),
            job_id: "job-1".to_string(),
            url: format!("https://example.com/{id}"),
            source_domain: "example.com".to_string(),
            parent_url: None,
            depth: 0,
            title: "T".repeat(1 + bytes_pad),
            headline: None,
            content: String::new(),
            excerpt: String::new(),
            summary: None,
            meta_description: None,
            publish_date: None,
            normalized_text: Some("hello world".to_string()),
            content_hash: hash.to_string(),
            tokens_est: 2,
            extracted_content_ollama: None,
            score,
            keywords_matched: vec![],
            tags: vec![],
            feedback: vec![],
            rating_count: 0,
            rating_average: 0.0,
            confirmations: 0,
            posted_at: None,
            post_id: None,
            topic_id: None,
            status: crate::crawler::model::ResultStatus::Crawled,
            size_bytes: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dedup_keeps_higher_score() {
        let store = ResultStore::new(10 * 1024 * 1024);
        store.add(sample("a", "hash-1", 0.5, 0)).await;
        let kept_id = store.add(sample("b", "hash-1", 0.8, 0)).await;
        assert_eq!(kept_id, "b");
        assert_eq!(store.len().await, 1);
        let kept = store.get("b").await.unwrap();
        assert_eq!(kept.score, 0.8);
    }

    #[tokio::test]
    async fn dedup_drops_lower_score_newcomer() {
        let store = ResultStore::new(10 * 1024 * 1024);
        store.add(sample("a", "hash-1", 0.8, 0)).await;
        let kept_id = store.add(sample("b", "hash-1", 0.5, 0)).await;
        assert_eq!(kept_id, "a");
        assert_eq!(store.len().await, 1);
        assert!(store.get("b").await.is_none());
    }

    #[tokio::test]
    async fn eviction_respects_byte_budget() {
        // Budget tight enough that only the newest of a few similarly-sized
        // entries survives.
        let store = ResultStore::new(400);
        store.add(sample("a", "hash-a", 0.1, 100)).await;
        store.add(sample("b", "hash-b", 0.1, 100)).await;
        store.add(sample("c", "hash-c", 0.1, 100)).await;
        store.add(sample("d", "hash-d", 0.1, 100)).await;

        let usage = store.current_usage().await;
        assert!(usage <= 400, "usage {usage} exceeded budget");
        // Oldest entries should have been evicted first.
        assert!(store.get("d").await.is_some());
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn usage_equals_sum_of_sizes() {
        let store = ResultStore::new(10 * 1024 * 1024);
        store.add(sample("a", "hash-a", 0.1, 10)).await;
        store.add(sample("b", "hash-b", 0.1, 20)).await;
        let all = store.snapshot_all().await;
        let sum: usize = all.iter().map(|r| r.size_bytes).sum();
        assert_eq!(sum, store.current_usage().await);
    }
}
