//! # Core Traits (Ports)
//!
//! Every adapter must implement these traits to be wired into the engine.
//! Each repository exclusively owns one relation; services never reach a
//! relation except through its port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Captcha, DeletedPost, ListingOrder, NewPost, Post, PostId, ThreadSummary};

/// Persistence contract for the post relation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Root posts with their reply counts, `limit` rows from `offset`.
    async fn list_roots(
        &self,
        order: ListingOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>>;

    /// The post with `id` plus every post whose `on_thread` is `id`, oldest first.
    async fn list_thread(&self, id: PostId) -> Result<Vec<Post>>;

    /// Inserts a root post with `created = bumped = now`.
    async fn insert_root(&self, post: NewPost, now: DateTime<Utc>) -> Result<PostId>;

    /// Bumps root `thread_id` to `now` and inserts the reply.
    ///
    /// Must return `DomainError::ThreadNotFound` and insert nothing when the
    /// bump touched zero rows.
    async fn insert_reply(
        &self,
        thread_id: PostId,
        post: NewPost,
        now: DateTime<Utc>,
    ) -> Result<PostId>;

    /// Deletes the single post matching both `id` and `delete_code`. Never cascades.
    async fn delete_post(&self, id: PostId, delete_code: &str) -> Result<Option<DeletedPost>>;

    /// Deletes every post whose `on_thread` is one of `thread_ids`.
    async fn delete_replies_of(&self, thread_ids: &[PostId]) -> Result<u64>;

    /// Deletes root posts beyond the `keep` most recently bumped and returns their ids.
    async fn delete_roots_beyond(&self, keep: i64) -> Result<Vec<PostId>>;
}

/// Persistence contract for captcha challenges.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaptchaRepository: Send + Sync {
    /// Fails if the id is already taken.
    async fn insert(&self, captcha: Captcha) -> Result<()>;

    /// Atomically removes the challenge and returns its solution, if it existed.
    async fn take_solution(&self, id: &str) -> Result<Option<String>>;

    /// Removes challenges created strictly before `boundary`.
    async fn delete_created_before(&self, boundary: DateTime<Utc>) -> Result<u64>;
}

/// Escaping of user text at the storage and display boundaries.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ContentSanitizer: Send + Sync {
    /// Applied to content and pic before they are written.
    fn sanitize(&self, raw: &str) -> String;
    /// Applied to stored content before it is returned to a client.
    fn render_content(&self, stored: &str) -> String;
    /// Applied to a stored pic URL before it is returned to a client.
    fn render_pic(&self, stored: &str) -> String;
}

/// Turns a captcha solution into an image a human can read.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CaptchaRenderer: Send + Sync {
    /// Returns SVG markup.
    fn render(&self, solution: &str) -> String;
}

/// Source of "now" for every time-dependent component.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
