//! Per-host request pacing and 429/5xx backoff, guarded by a single
//! `RwLock`-protected registry the way `features/proxy_manager.rs` guards
//! its `ProxyRegistry`.

use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const BACKOFF_CAP_SECONDS: f64 = 60.0;

struct HostEntry {
    /// Instant after which a request to this host may proceed.
    ready_at: Instant,
}

pub struct HostCoordinator {
    hosts: RwLock<HashMap<String, HostEntry>>,
}

impl Default for HostCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCoordinator {
    pub fn new() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Block until `host`'s backoff window has elapsed. A no-op for hosts
    /// with no outstanding backoff.
    pub async fn respect_backoff(&self, host: &str) {
        loop {
            let wait = {
                let hosts = self.hosts.read().await;
                hosts.get(host).and_then(|e| {
                    let now = Instant::now();
                    (e.ready_at > now).then(|| e.ready_at - now)
                })
            };
            match wait {
                Some(d) => tokio::time::sleep(d).await,
                None => return,
            }
        }
    }

    /// Jittered per-request delay: `rate_limit_seconds` plus up to 50% extra,
    /// mirroring `job.rate_limit + uniform(0, job.rate_limit * 0.5)`.
    pub async fn jittered_delay(&self, rate_limit_seconds: f64) {
        let jitter = rand::thread_rng().gen_range(0.0..(rate_limit_seconds * 0.5).max(0.0001));
        let total = rate_limit_seconds + jitter;
        if total > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(total)).await;
        }
    }

    /// Schedule a backoff window after a 429 (10s increment) or 5xx (5s
    /// increment) response, capped so a host is never starved past 60s.
    pub async fn schedule_backoff(&self, host: &str, status_code: u16) {
        let increment = if status_code == 429 { 10.0 } else { 5.0 };
        let mut hosts = self.hosts.write().await;
        let now = Instant::now();
        let current_ready = hosts.get(host).map(|e| e.ready_at).unwrap_or(now);
        let next = current_ready.max(now) + Duration::from_secs_f64(increment);
        let cap = now + Duration::from_secs_f64(BACKOFF_CAP_SECONDS);
        hosts.insert(
            host.to_string(),
            HostEntry {
                ready_at: next.min(cap),
            },
        );
    }

    pub async fn clear_backoff(&self, host: &str) {
        self.hosts.write().await.remove(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn respect_backoff_is_noop_without_schedule() {
        let hc = HostCoordinator::new();
        let start = Instant::now();
        hc.respect_backoff("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn schedule_backoff_blocks_until_window_elapses() {
        let hc = HostCoordinator::new();
        hc.hosts.write().await.insert(
            "example.com".to_string(),
            HostEntry {
                ready_at: Instant::now() + Duration::from_millis(30),
            },
        );
        let start = Instant::now();
        hc.respect_backoff("example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn clear_backoff_removes_entry() {
        let hc = HostCoordinator::new();
        hc.schedule_backoff("example.com", 429).await;
        hc.clear_backoff("example.com").await;
        let start = Instant::now();
        hc.respect_backoff("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn backoff_is_capped_at_sixty_seconds() {
        let hc = HostCoordinator::new();
        for _ in 0..20 {
            hc.schedule_backoff("hammered.example.com", 429).await;
        }
        let hosts = hc.hosts.read().await;
        let entry = hosts.get("hammered.example.com").unwrap();
        let remaining = entry.ready_at.saturating_duration_since(Instant::now());
        assert!(remaining <= Duration::from_secs(60));
    }
}
