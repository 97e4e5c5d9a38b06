//! # BoardEngine
//!
//! The façade the routing layer talks to. It composes the captcha and post
//! services with the page cache; it owns no state of its own.

use std::sync::Arc;

use domains::{
    DomainError, IssuedCaptcha, ListingOrder, Post, PostId, PostReceipt, Result, ThreadSummary,
};
use tracing::error;

use crate::cache::PageCache;
use crate::captcha::CaptchaService;
use crate::posts::PostService;

/// A post submission as received from a client.
#[derive(Debug, Clone, Default)]
pub struct SubmitPost {
    pub content: String,
    pub pic: String,
    /// `None` starts a new thread
    pub on_thread: Option<PostId>,
    pub captcha_id: String,
    pub captcha_solution: String,
}

/// A successful submission plus the challenge for the next one.
#[derive(Debug, Clone)]
pub struct PostAccepted {
    pub receipt: PostReceipt,
    pub next_captcha: IssuedCaptcha,
}

/// A refused submission.
///
/// Once the captcha has been spent, every refusal comes with a fresh
/// challenge so the client can retry the same content.
#[derive(Debug, Clone)]
pub struct PostRejected {
    pub error: DomainError,
    pub next_captcha: Option<IssuedCaptcha>,
}

impl From<DomainError> for PostRejected {
    fn from(error: DomainError) -> Self {
        Self {
            error,
            next_captcha: None,
        }
    }
}

pub struct BoardEngine {
    posts: PostService,
    captchas: CaptchaService,
    cache: Arc<PageCache>,
}

impl BoardEngine {
    pub fn new(posts: PostService, captchas: CaptchaService, cache: Arc<PageCache>) -> Self {
        Self {
            posts,
            captchas,
            cache,
        }
    }

    /// Negative pages are read as page 0. Bump-ordered pages go through the cache.
    pub async fn list_page(&self, page: i64, order: ListingOrder) -> Result<Vec<ThreadSummary>> {
        let page = page.max(0);
        if let Some(hit) = self.cache.get(page, order).await {
            return Ok(hit);
        }
        let roots = self.posts.list_roots(page, order).await?;
        self.cache.put(page, order, roots.clone()).await;
        Ok(roots)
    }

    pub async fn fetch_thread(&self, id: PostId) -> Result<Vec<Post>> {
        self.posts.list_thread(id).await
    }

    pub async fn issue_captcha(&self) -> Result<IssuedCaptcha> {
        self.captchas.issue().await
    }

    pub async fn create_post(
        &self,
        submission: SubmitPost,
    ) -> std::result::Result<PostAccepted, PostRejected> {
        if submission.content.trim().is_empty() {
            return Err(DomainError::Validation("no content received".to_string()).into());
        }

        if !self
            .captchas
            .consume(&submission.captcha_id, &submission.captcha_solution)
            .await
        {
            return Err(self
                .reject(DomainError::Conflict("captcha solution incorrect".to_string()))
                .await);
        }

        if let Err(err) = self.posts.check_pic(&submission.pic) {
            return Err(self.reject(err).await);
        }

        // No post is committed unless its receipt can be returned.
        let next_captcha = self.captchas.issue().await?;

        let created = match submission.on_thread {
            None => {
                self.posts
                    .create_root(&submission.content, &submission.pic)
                    .await
            }
            Some(thread_id) => {
                self.posts
                    .create_reply(thread_id, &submission.content, &submission.pic)
                    .await
            }
        };

        match created {
            Ok(receipt) => Ok(PostAccepted {
                receipt,
                next_captcha,
            }),
            Err(err @ (DomainError::Conflict(_) | DomainError::ThreadNotFound(_))) => {
                Err(PostRejected {
                    error: err,
                    next_captcha: Some(next_captcha),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `NotFound` when no post matches both `id` and `delete_code`.
    pub async fn delete_post(&self, id: PostId, delete_code: &str) -> Result<PostId> {
        if self.posts.delete_post(id, delete_code).await? {
            Ok(id)
        } else {
            Err(DomainError::NotFound(
                "given id and delete_code combination".to_string(),
            ))
        }
    }

    async fn reject(&self, error: DomainError) -> PostRejected {
        match self.captchas.issue().await {
            Ok(captcha) => PostRejected {
                error,
                next_captcha: Some(captcha),
            },
            Err(issue_err) => {
                error!(error = %issue_err, "could not issue a retry captcha");
                PostRejected {
                    error: issue_err,
                    next_captcha: None,
                }
            }
        }
    }
}
