//! # PageCache
//!
//! Time-bucketed cache of the first listing pages. Only bump-ordered pages
//! are ever cached. Each bucket is an independent single-writer register;
//! readers may see a page up to `ttl` old.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use domains::{Clock, ListingOrder, ThreadSummary};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Bucket {
    stored_at: DateTime<Utc>,
    posts: Vec<ThreadSummary>,
}

pub struct PageCache {
    buckets: Vec<RwLock<Option<Bucket>>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl PageCache {
    pub fn new(bucket_count: usize, ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: (0..bucket_count).map(|_| RwLock::new(None)).collect(),
            ttl,
            clock,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, page: i64, order: ListingOrder) -> Option<&RwLock<Option<Bucket>>> {
        if order != ListingOrder::Bumped {
            return None;
        }
        usize::try_from(page).ok().and_then(|idx| self.buckets.get(idx))
    }

    /// A fresh copy of the cached page, or `None` on a miss.
    pub async fn get(&self, page: i64, order: ListingOrder) -> Option<Vec<ThreadSummary>> {
        let bucket = self.bucket(page, order)?.read().await;
        let cached = bucket.as_ref()?;
        if self.clock.now() - cached.stored_at < self.ttl {
            Some(cached.posts.clone())
        } else {
            None
        }
    }

    /// Ignored for pages outside the cached range and for non-bump orderings.
    pub async fn put(&self, page: i64, order: ListingOrder, posts: Vec<ThreadSummary>) {
        let Some(bucket) = self.bucket(page, order) else {
            return;
        };
        *bucket.write().await = Some(Bucket {
            stored_at: self.clock.now(),
            posts,
        });
    }

    pub async fn invalidate_all(&self) {
        for bucket in &self.buckets {
            *bucket.write().await = None;
        }
    }
}
