//! Retention jobs keeping the dataset bounded.
//!
//! Both run as [`PeriodicJob`]s. Thread pruning is two statements: the roots
//! go first, then their replies. A crash in between leaves orphaned replies
//! that are only reachable by their own id.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use domains::{CaptchaRepository, Clock, PostRepository, Result};
use tracing::info;

use crate::jobs::PeriodicJob;

/// Keeps at most `max_threads` threads, dropping the least recently bumped.
pub struct RetentionPruner {
    repo: Arc<dyn PostRepository>,
    max_threads: i64,
}

impl RetentionPruner {
    pub fn new(repo: Arc<dyn PostRepository>, max_threads: i64) -> Self {
        Self { repo, max_threads }
    }
}

#[async_trait]
impl PeriodicJob for RetentionPruner {
    fn name(&self) -> &'static str {
        "thread-retention"
    }

    async fn run_once(&self) -> Result<u64> {
        let roots = self.repo.delete_roots_beyond(self.max_threads).await?;
        if roots.is_empty() {
            return Ok(0);
        }
        let replies = self.repo.delete_replies_of(&roots).await?;
        info!(threads = roots.len(), replies, "pruned stale threads");
        Ok(roots.len() as u64 + replies)
    }
}

/// Drops captcha challenges older than `ttl` that were never consumed.
pub struct CaptchaPruner {
    repo: Arc<dyn CaptchaRepository>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl CaptchaPruner {
    pub fn new(repo: Arc<dyn CaptchaRepository>, clock: Arc<dyn Clock>, ttl: TimeDelta) -> Self {
        Self { repo, clock, ttl }
    }
}

#[async_trait]
impl PeriodicJob for CaptchaPruner {
    fn name(&self) -> &'static str {
        "captcha-expiry"
    }

    async fn run_once(&self) -> Result<u64> {
        // The boundary lies in the past: rows created before it are stale.
        let boundary = self.clock.now() - self.ttl;
        let removed = self.repo.delete_created_before(boundary).await?;
        if removed > 0 {
            info!(removed, "expired captcha challenges");
        }
        Ok(removed)
    }
}
