//! # Domain Models
//!
//! These structs represent the core entities of the board: posts (threads and
//! their replies) and the one-time captcha challenges that gate posting.
//! Post ids are store-assigned, monotonically increasing integers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PostId = i64;

/// `on_thread` value carried by every root post.
pub const ROOT_THREAD: PostId = -1;

/// A single post as it is read back from the store.
///
/// The delete code never leaves the store after creation, so it has no
/// place here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    /// Image URL, empty string when the post has none
    pub pic: String,
    /// `ROOT_THREAD` for threads, the parent thread id for replies
    pub on_thread: PostId,
    pub created: DateTime<Utc>,
    /// Last reply activity; only meaningful for root posts
    #[serde(skip_serializing)]
    pub bumped: DateTime<Utc>,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.on_thread == ROOT_THREAD
    }
}

/// A root post as shown on a listing page, with its derived reply count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: PostId,
    pub content: String,
    pub pic: String,
    pub created: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub bumped: DateTime<Utc>,
    pub replies: i64,
}

/// Ordering of a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingOrder {
    /// Most recently bumped first. The only cacheable ordering.
    #[default]
    Bumped,
    /// Newest threads first.
    Created,
}

/// A post ready to be written: content and pic already sanitized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub content: String,
    pub pic: String,
    pub delete_code: String,
}

/// What the author gets back once, right after creating a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReceipt {
    pub id: PostId,
    pub delete_code: String,
}

/// Result of a successful `delete_post` at the store level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedPost {
    pub id: PostId,
    pub on_thread: PostId,
}

impl DeletedPost {
    pub fn was_root(&self) -> bool {
        self.on_thread == ROOT_THREAD
    }
}

/// A stored captcha challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captcha {
    /// 4-character alphanumeric token
    pub id: String,
    /// 4-digit numeric answer
    pub solution: String,
    pub created: DateTime<Utc>,
}

/// A challenge as handed to the client: its id and rendered image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCaptcha {
    pub captcha_id: String,
    pub captcha_svg: String,
}
