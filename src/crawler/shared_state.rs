//! The process-wide seen-URL set and the idempotency-key → job-id map,
//! flushed to a single JSON file. A mutex-guarded struct handed out via
//! dependency injection rather than a module-level singleton.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const FLUSH_EVERY: u64 = 200;

#[derive(Default, Serialize, Deserialize)]
struct Persisted {
    seen_urls: Vec<String>,
    idempotency_map: HashMap<String, String>,
}

struct Inner {
    seen_urls: HashSet<String>,
    idempotency_map: HashMap<String, String>,
    dirty: bool,
    mutations_since_flush: u64,
}

pub struct SharedState {
    persist_path: PathBuf,
    inner: Mutex<Inner>,
}

/// SHA-1 hex digest of a trimmed URL string, the canonical seen-set key.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}

impl SharedState {
    pub fn new(persist_path: impl Into<PathBuf>) -> Self {
        let persist_path = persist_path.into();
        let loaded = load_best_effort(&persist_path);
        Self {
            persist_path,
            inner: Mutex::new(Inner {
                seen_urls: loaded.seen_urls.into_iter().collect(),
                idempotency_map: loaded.idempotency_map,
                dirty: false,
                mutations_since_flush: 0,
            }),
        }
    }

    /// Atomic insert-if-absent. Returns `true` only the first time a given
    /// hash is marked.
    pub async fn mark_seen(&self, url_hash: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.seen_urls.contains(url_hash) {
            return false;
        }
        inner.seen_urls.insert(url_hash.to_string());
        self.mark_dirty(&mut inner).await;
        true
    }

    pub async fn has_seen(&self, url_hash: &str) -> bool {
        self.inner.lock().await.seen_urls.contains(url_hash)
    }

    pub async fn register_job_for_key(&self, key: &str, job_id: &str) {
        let mut inner = self.inner.lock().await;
        if inner.idempotency_map.get(key).map(String::as_str) == Some(job_id) {
            return;
        }
        inner
            .idempotency_map
            .insert(key.to_string(), job_id.to_string());
        self.mark_dirty(&mut inner).await;
    }

    pub async fn get_job_for_key(&self, key: &str) -> Option<String> {
        self.inner.lock().await.idempotency_map.get(key).cloned()
    }

    pub async fn flush(&self) {
        let mut inner = self.inner.lock().await;
        if inner.dirty {
            self.write_through(&inner).await;
            inner.dirty = false;
            inner.mutations_since_flush = 0;
        }
    }

    async fn mark_dirty(&self, inner: &mut Inner) {
        inner.dirty = true;
        inner.mutations_since_flush += 1;
        if inner.mutations_since_flush >= FLUSH_EVERY {
            self.write_through(inner).await;
            inner.dirty = false;
            inner.mutations_since_flush = 0;
        }
    }

    /// Write-temp-then-rename so a crash mid-write never corrupts the file.
    async fn write_through(&self, inner: &Inner) {
        let mut seen: Vec<String> = inner.seen_urls.iter().cloned().collect();
        seen.sort();
        let payload = Persisted {
            seen_urls: seen,
            idempotency_map: inner.idempotency_map.clone(),
        };
        let Ok(json) = serde_json::to_vec_pretty(&payload) else {
            tracing::warn!("shared-state serialization failed, skipping flush");
            return;
        };

        if let Some(parent) = self.persist_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("failed to create spool dir {}: {e}", parent.display());
                return;
            }
        }

        let tmp_path = self.persist_path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp_path, &json).await {
            tracing::warn!("shared-state temp write failed: {e}");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &self.persist_path).await {
            tracing::warn!("shared-state rename failed: {e}");
        }
    }
}

/// Load best-effort on startup: a missing or corrupt file yields an empty
/// state without deleting the file, so the next successful flush rewrites it.
fn load_best_effort(path: &Path) -> Persisted {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    "shared-state file at {} is corrupt ({e}); starting empty",
                    path.display()
                );
                Persisted::default()
            }
        },
        Err(_) => Persisted::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_seen_is_true_only_first_time() {
        let dir = tempfile::tempdir().unwrap();
        let state = SharedState::new(dir.path().join("shared-state.json"));
        let h = url_hash("https://example.com/post");
        assert!(state.mark_seen(&h).await);
        assert!(!state.mark_seen(&h).await);
        assert!(state.has_seen(&h).await);
    }

    #[tokio::test]
    async fn idempotency_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = SharedState::new(dir.path().join("shared-state.json"));
        assert_eq!(state.get_job_for_key("k1").await, None);
        state.register_job_for_key("k1", "job-abc").await;
        assert_eq!(state.get_job_for_key("k1").await, Some("job-abc".into()));
        // Re-registering the same key/id pair is a no-op, not a second write.
        state.register_job_for_key("k1", "job-abc").await;
        assert_eq!(state.get_job_for_key("k1").await, Some("job-abc".into()));
    }

    #[tokio::test]
    async fn flush_persists_and_reload_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared-state.json");
        let state = SharedState::new(&path);
        let h = url_hash("https://example.com/a");
        state.mark_seen(&h).await;
        state.flush().await;

        let reloaded = SharedState::new(&path);
        assert!(reloaded.has_seen(&h).await);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared-state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        let state = SharedState::new(&path);
        assert!(!state.has_seen("anything").await);
    }
}
