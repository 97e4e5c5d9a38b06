//! In-process store for tests, demos and single-node throwaway boards.
//!
//! Posts live behind one async mutex so every port call is atomic, the same
//! per-statement guarantee the SQL store gives. Captchas live in a `DashMap`,
//! whose `remove` is the one-shot consume.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Captcha, CaptchaRepository, DeletedPost, DomainError, ListingOrder, NewPost, Post, PostId,
    PostRepository, Result, ThreadSummary, ROOT_THREAD,
};
use tokio::sync::Mutex;

use crate::error::StorageError;

#[derive(Debug, Clone)]
struct PostRow {
    post: Post,
    delete_code: String,
}

#[derive(Debug, Default)]
struct PostTable {
    last_id: PostId,
    rows: BTreeMap<PostId, PostRow>,
}

impl PostTable {
    fn insert(&mut self, post: NewPost, on_thread: PostId, now: DateTime<Utc>) -> PostId {
        self.last_id += 1;
        let id = self.last_id;
        self.rows.insert(
            id,
            PostRow {
                post: Post {
                    id,
                    content: post.content,
                    pic: post.pic,
                    on_thread,
                    created: now,
                    bumped: now,
                },
                delete_code: post.delete_code,
            },
        );
        id
    }

    fn reply_count(&self, id: PostId) -> i64 {
        self.rows
            .values()
            .filter(|row| row.post.on_thread == id)
            .count() as i64
    }

    /// Root posts, most recent first by `order`, newest id first on ties.
    fn sorted_roots(&self, order: ListingOrder) -> Vec<&Post> {
        let mut roots: Vec<&Post> = self
            .rows
            .values()
            .map(|row| &row.post)
            .filter(|post| post.is_root())
            .collect();
        roots.sort_by(|a, b| {
            let (ka, kb) = match order {
                ListingOrder::Bumped => (a.bumped, b.bumped),
                ListingOrder::Created => (a.created, b.created),
            };
            kb.cmp(&ka).then(b.id.cmp(&a.id))
        });
        roots
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: Mutex<PostTable>,
    captchas: DashMap<String, Captcha>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_count(&self) -> usize {
        self.posts.lock().await.rows.len()
    }

    pub async fn root_count(&self) -> usize {
        self.posts
            .lock()
            .await
            .rows
            .values()
            .filter(|row| row.post.is_root())
            .count()
    }

    /// Replies whose thread no longer exists.
    pub async fn orphan_count(&self) -> usize {
        let table = self.posts.lock().await;
        table
            .rows
            .values()
            .filter(|row| {
                !row.post.is_root()
                    && !table
                        .rows
                        .get(&row.post.on_thread)
                        .is_some_and(|parent| parent.post.is_root())
            })
            .count()
    }

    pub fn captcha_count(&self) -> usize {
        self.captchas.len()
    }

    /// The stored solution, without consuming the challenge.
    pub fn peek_solution(&self, id: &str) -> Option<String> {
        self.captchas.get(id).map(|c| c.solution.clone())
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list_roots(
        &self,
        order: ListingOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>> {
        let table = self.posts.lock().await;
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(table
            .sorted_roots(order)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| ThreadSummary {
                id: post.id,
                content: post.content.clone(),
                pic: post.pic.clone(),
                created: post.created,
                bumped: post.bumped,
                replies: table.reply_count(post.id),
            })
            .collect())
    }

    async fn list_thread(&self, id: PostId) -> Result<Vec<Post>> {
        let table = self.posts.lock().await;
        let mut posts: Vec<Post> = table
            .rows
            .values()
            .filter(|row| row.post.id == id || row.post.on_thread == id)
            .map(|row| row.post.clone())
            .collect();
        posts.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(posts)
    }

    async fn insert_root(&self, post: NewPost, now: DateTime<Utc>) -> Result<PostId> {
        Ok(self.posts.lock().await.insert(post, ROOT_THREAD, now))
    }

    async fn insert_reply(
        &self,
        thread_id: PostId,
        post: NewPost,
        now: DateTime<Utc>,
    ) -> Result<PostId> {
        let mut table = self.posts.lock().await;
        match table.rows.get_mut(&thread_id) {
            Some(root) if root.post.is_root() => {
                root.post.bumped = root.post.bumped.max(now);
            }
            _ => return Err(DomainError::ThreadNotFound(thread_id)),
        }
        Ok(table.insert(post, thread_id, now))
    }

    async fn delete_post(&self, id: PostId, delete_code: &str) -> Result<Option<DeletedPost>> {
        let mut table = self.posts.lock().await;
        let matches = table
            .rows
            .get(&id)
            .is_some_and(|row| row.delete_code == delete_code);
        if !matches {
            return Ok(None);
        }
        Ok(table.rows.remove(&id).map(|row| DeletedPost {
            id,
            on_thread: row.post.on_thread,
        }))
    }

    async fn delete_replies_of(&self, thread_ids: &[PostId]) -> Result<u64> {
        let mut table = self.posts.lock().await;
        let before = table.rows.len();
        table
            .rows
            .retain(|_, row| !thread_ids.contains(&row.post.on_thread));
        Ok((before - table.rows.len()) as u64)
    }

    async fn delete_roots_beyond(&self, keep: i64) -> Result<Vec<PostId>> {
        let mut table = self.posts.lock().await;
        let keep = usize::try_from(keep).unwrap_or(0);
        let victims: Vec<PostId> = table
            .sorted_roots(ListingOrder::Bumped)
            .into_iter()
            .skip(keep)
            .map(|post| post.id)
            .collect();
        for id in &victims {
            table.rows.remove(id);
        }
        Ok(victims)
    }
}

#[async_trait]
impl CaptchaRepository for MemoryStore {
    async fn insert(&self, captcha: Captcha) -> Result<()> {
        match self.captchas.entry(captcha.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::DuplicateKey(captcha.id).into()),
            Entry::Vacant(slot) => {
                slot.insert(captcha);
                Ok(())
            }
        }
    }

    async fn take_solution(&self, id: &str) -> Result<Option<String>> {
        Ok(self.captchas.remove(id).map(|(_, captcha)| captcha.solution))
    }

    async fn delete_created_before(&self, boundary: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<String> = self
            .captchas
            .iter()
            .filter(|entry| entry.created < boundary)
            .map(|entry| entry.key().clone())
            .collect();
        let removed = stale
            .iter()
            .filter(|id| {
                self.captchas
                    .remove_if(id.as_str(), |_, c| c.created < boundary)
                    .is_some()
            })
            .count();
        Ok(removed as u64)
    }
}
