//! Append-only hourly JSONL files plus an index file, with daily gzip
//! archival of aged shards, following `features/history.rs`'s async-file
//! lifecycle idiom.

use crate::crawler::model::{CrawlResult, ShardRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardEntry {
    pub name: String,
    pub records: usize,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShardIndexFile {
    shards: Vec<ShardEntry>,
}

pub struct ShardWriter {
    train_dir: PathBuf,
    index: Mutex<ShardIndexFile>,
}

impl ShardWriter {
    pub fn new(train_dir: impl Into<PathBuf>) -> Self {
        let train_dir = train_dir.into();
        let index = load_index(&train_dir).unwrap_or_default();
        Self {
            train_dir,
            index: Mutex::new(index),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.train_dir.join("index.json")
    }

    fn archive_dir(&self) -> PathBuf {
        self.train_dir.join("archive")
    }

    /// Append `records` (buffer insertion order preserved) to the shard for
    /// the current UTC hour. On any write failure the buffer should be
    /// retained by the caller for the next flush attempt.
    pub async fn flush_records(&self, records: &[CrawlResult]) -> std::io::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.train_dir).await?;

        let shard_name = current_shard_name();
        let shard_path = self.train_dir.join(&shard_name);

        let mut buf = Vec::new();
        for result in records {
            let shard_record = ShardRecord::from(result);
            serde_json::to_writer(&mut buf, &shard_record)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&shard_path)
            .await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &buf).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;

        let total_size = tokio::fs::metadata(&shard_path).await?.len();

        let mut index = self.index.lock().await;
        if let Some(entry) = index.shards.iter_mut().find(|e| e.name == shard_name) {
            entry.records += records.len();
            entry.size_bytes = total_size;
        } else {
            index.shards.push(ShardEntry {
                name: shard_name,
                records: records.len(),
                size_bytes: total_size,
                created_at: Utc::now(),
            });
        }
        self.save_index(&index).await
    }

    pub async fn index_snapshot(&self) -> Vec<ShardEntry> {
        self.index.lock().await.shards.clone()
    }

    async fn save_index(&self, index: &ShardIndexFile) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        let tmp = self.index_path().with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, self.index_path()).await
    }

    /// Gzip-archive every shard older than `retention_days`, once per day.
    /// A failure on any individual shard leaves it in place and indexed.
    pub async fn compact(&self, retention_days: u32) {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let archive_dir = self.archive_dir();
        if let Err(e) = tokio::fs::create_dir_all(&archive_dir).await {
            tracing::warn!("failed to create archive dir: {e}");
            return;
        }

        let mut index = self.index.lock().await;
        let mut remaining = Vec::with_capacity(index.shards.len());
        for entry in index.shards.drain(..) {
            let Some(shard_date) = parse_shard_date(&entry.name) else {
                remaining.push(entry);
                continue;
            };
            if shard_date >= cutoff {
                remaining.push(entry);
                continue;
            }

            let shard_path = self.train_dir.join(&entry.name);
            match gzip_and_remove(&shard_path, &archive_dir.join(format!("{}.gz", entry.name))) {
                Ok(()) => {
                    tracing::info!("archived shard {}", entry.name);
                }
                Err(e) => {
                    tracing::warn!("failed to archive shard {}: {e}", entry.name);
                    remaining.push(entry);
                }
            }
        }
        index.shards = remaining;
        if let Err(e) = self.save_index(&index).await {
            tracing::warn!("failed to save shard index after compaction: {e}");
        }
    }
}

fn gzip_and_remove(src: &Path, dst: &Path) -> std::io::Result<()> {
    let data = std::fs::read(src)?;
    let out = std::fs::File::create(dst)?;
    let mut encoder = GzEncoder::new(out, Compression::default());
    encoder.write_all(&data)?;
    encoder.finish()?;
    std::fs::remove_file(src)?;
    Ok(())
}

fn current_shard_name() -> String {
    Utc::now().format("crawl-train-%Y%m%d-%H.jsonl").to_string()
}

fn parse_shard_date(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_prefix("crawl-train-")?.strip_suffix(".jsonl")?;
    let naive = NaiveDateTime::parse_from_str(stem, "%Y%m%d-%H").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn load_index(train_dir: &Path) -> Option<ShardIndexFile> {
    let contents = std::fs::read_to_string(train_dir.join("index.json")).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::model::ResultStatus;
    use chrono::Utc;

    fn sample_result(id: &str) -> CrawlResult {
        CrawlResult {
            id: id.to_string(),
            job_id: "job-1".to_string(),
            url: "https://example.com/a".to_string(),
            source_domain: "example.com".to_string(),
            parent_url: None,
            depth: 0,
            title: "Title".to_string(),
            headline: None,
            content: "full body content".to_string(),
            excerpt: "excerpt".to_string(),
            summary: None,
            meta_description: None,
            publish_date: None,
            normalized_text: Some("title body text".to_string()),
            content_hash: "deadbeef".to_string(),
            tokens_est: 3,
            extracted_content_ollama: None,
            score: 0.5,
            keywords_matched: vec![],
            tags: vec![],
            feedback: vec![],
            rating_count: 0,
            rating_average: 0.0,
            confirmations: 0,
            posted_at: None,
            post_id: None,
            topic_id: None,
            status: ResultStatus::Crawled,
            size_bytes: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn flush_appends_and_index_updates() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(dir.path());
        writer.flush_records(&[sample_result("a")]).await.unwrap();
        writer.flush_records(&[sample_result("b")]).await.unwrap();

        let index = writer.index_snapshot().await;
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].records, 2);

        let shard_path = dir.path().join(&index[0].name);
        let contents = tokio::fs::read_to_string(&shard_path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
        // Shard never shrinks across flushes — both records remain readable.
        assert!(contents.contains("\"id\":\"a\""));
        assert!(contents.contains("\"id\":\"b\""));
        // Shard record omits the full content body.
        assert!(!contents.contains("full body content"));
    }

    #[tokio::test]
    async fn compact_archives_old_shards_and_removes_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ShardWriter::new(dir.path());

        let old_name = "crawl-train-20200101-00.jsonl";
        tokio::fs::write(dir.path().join(old_name), b"{}\n")
            .await
            .unwrap();
        {
            let mut index = writer.index.lock().await;
            index.shards.push(ShardEntry {
                name: old_name.to_string(),
                records: 1,
                size_bytes: 3,
                created_at: Utc::now() - chrono::Duration::days(400),
            });
        }

        writer.compact(30).await;

        let index = writer.index_snapshot().await;
        assert!(index.iter().all(|e| e.name != old_name));
        assert!(dir.path().join("archive").join(format!("{old_name}.gz")).exists());
        assert!(!dir.path().join(old_name).exists());
    }
}
