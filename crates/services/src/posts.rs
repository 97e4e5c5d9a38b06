//! # PostService
//!
//! Owns the thread/reply relation: listing, creation with bump-on-reply and
//! deletion with cascade. All text crosses the sanitizer on the way in and on
//! the way out.

use std::sync::Arc;

use domains::{
    Clock, ContentSanitizer, DomainError, ListingOrder, NewPost, Post, PostId, PostReceipt,
    PostRepository, Result, ThreadSummary,
};
use tracing::{debug, error, info};
use url::Url;

use crate::tokens;

/// Tunables of the post relation.
#[derive(Debug, Clone)]
pub struct PostPolicy {
    pub page_size: i64,
    pub delete_code_length: usize,
    /// A pic URL must start with one of these
    pub trusted_image_hosts: Vec<String>,
}

impl Default for PostPolicy {
    fn default() -> Self {
        Self {
            page_size: 15,
            delete_code_length: 4,
            trusted_image_hosts: vec![
                "https://i.postimg.cc/".to_string(),
                "https://i.imgur.com/".to_string(),
            ],
        }
    }
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    sanitizer: Arc<dyn ContentSanitizer>,
    clock: Arc<dyn Clock>,
    policy: PostPolicy,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        sanitizer: Arc<dyn ContentSanitizer>,
        clock: Arc<dyn Clock>,
        policy: PostPolicy,
    ) -> Self {
        Self {
            repo,
            sanitizer,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &PostPolicy {
        &self.policy
    }

    /// One listing page of root posts with their reply counts.
    pub async fn list_roots(&self, page: i64, order: ListingOrder) -> Result<Vec<ThreadSummary>> {
        let offset = page.max(0).saturating_mul(self.policy.page_size);
        let mut roots = self
            .repo
            .list_roots(order, self.policy.page_size, offset)
            .await?;
        for root in &mut roots {
            root.content = self.sanitizer.render_content(&root.content);
            root.pic = self.sanitizer.render_pic(&root.pic);
        }
        Ok(roots)
    }

    /// The root and its replies, or just the post itself when `id` is a reply.
    pub async fn list_thread(&self, id: PostId) -> Result<Vec<Post>> {
        let mut posts = self.repo.list_thread(id).await?;
        if posts.is_empty() {
            return Err(DomainError::NotFound(format!("post {id}")));
        }
        for post in &mut posts {
            post.content = self.sanitizer.render_content(&post.content);
            post.pic = self.sanitizer.render_pic(&post.pic);
        }
        Ok(posts)
    }

    pub async fn create_root(&self, content: &str, pic: &str) -> Result<PostReceipt> {
        let post = self.prepare(content, pic)?;
        let delete_code = post.delete_code.clone();
        let id = self.repo.insert_root(post, self.clock.now()).await?;
        info!(post_id = id, "thread created");
        Ok(PostReceipt { id, delete_code })
    }

    /// Inserts a reply and bumps its thread.
    pub async fn create_reply(
        &self,
        thread_id: PostId,
        content: &str,
        pic: &str,
    ) -> Result<PostReceipt> {
        if thread_id <= 0 {
            return Err(DomainError::ThreadNotFound(thread_id));
        }
        let post = self.prepare(content, pic)?;
        let delete_code = post.delete_code.clone();
        let id = self
            .repo
            .insert_reply(thread_id, post, self.clock.now())
            .await?;
        debug!(post_id = id, thread_id, "reply created, thread bumped");
        Ok(PostReceipt { id, delete_code })
    }

    /// Returns whether a post matched `id` and `delete_code`.
    ///
    /// Deleting a root also deletes its replies. A failure in that second
    /// step is logged; the root stays deleted.
    pub async fn delete_post(&self, id: PostId, delete_code: &str) -> Result<bool> {
        let stored_code = self.sanitizer.sanitize(delete_code);
        let Some(deleted) = self.repo.delete_post(id, &stored_code).await? else {
            return Ok(false);
        };
        if deleted.was_root() {
            match self.repo.delete_replies_of(&[deleted.id]).await {
                Ok(count) => debug!(thread_id = id, replies = count, "thread replies deleted"),
                Err(err) => error!(thread_id = id, error = %err, "failed to delete thread replies"),
            }
        }
        info!(post_id = id, "post deleted");
        Ok(true)
    }

    /// Empty is always accepted; anything else must be a URL on a trusted host.
    pub fn check_pic(&self, pic: &str) -> Result<()> {
        self.normalize_pic(pic).map(drop)
    }

    /// The URL form that gets stored. Parsing percent-encodes quotes and
    /// angle brackets, so the stored value cannot leave an attribute.
    fn normalize_pic(&self, pic: &str) -> Result<String> {
        let pic = pic.trim();
        if pic.is_empty() {
            return Ok(String::new());
        }
        let url = Url::parse(pic)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        let trusted = |candidate: &str| {
            self.policy
                .trusted_image_hosts
                .iter()
                .any(|prefix| candidate.starts_with(prefix.as_str()))
        };
        match url {
            Some(url) if trusted(pic) && trusted(url.as_str()) => Ok(url.into()),
            _ => Err(DomainError::Conflict("Not a supported image URL".to_string())),
        }
    }

    fn prepare(&self, content: &str, pic: &str) -> Result<NewPost> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::Validation("no content received".to_string()));
        }
        let pic = self.normalize_pic(pic)?;
        Ok(NewPost {
            content: self.sanitizer.sanitize(content),
            pic: self.sanitizer.sanitize(&pic),
            delete_code: tokens::alphanumeric(self.policy.delete_code_length),
        })
    }
}
