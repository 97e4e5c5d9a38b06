//! # SQLite store
//!
//! Maps the post and captcha relations onto two SQLite tables. Timestamps are
//! stored as unix microseconds so that ordering is plain integer ordering.
//!
//! Reply creation runs in a transaction: the bump and the insert commit
//! together or not at all. Every other port call is a single statement.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Captcha, CaptchaRepository, DeletedPost, DomainError, ListingOrder, NewPost, Post, PostId,
    PostRepository, Result, ThreadSummary, ROOT_THREAD,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::info;

use crate::error::StorageError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS post (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        content     TEXT    NOT NULL,
        pic         TEXT    NOT NULL DEFAULT '',
        on_thread   INTEGER NOT NULL DEFAULT -1,
        delete_code TEXT    NOT NULL,
        created     INTEGER NOT NULL,
        bumped      INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS post_on_thread_idx ON post (on_thread)",
    "CREATE INDEX IF NOT EXISTS post_bumped_idx ON post (bumped)",
    "CREATE TABLE IF NOT EXISTS captcha (
        id       TEXT    PRIMARY KEY,
        solution TEXT    NOT NULL,
        created  INTEGER NOT NULL
    )",
];

/// Bound parameters per `IN (..)` list, well under SQLite's variable limit.
const IDS_PER_STATEMENT: usize = 500;

pub struct SqliteStore {
    pool: SqlitePool,
}

fn db(err: sqlx::Error) -> DomainError {
    StorageError::from(err).into()
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(value: i64) -> std::result::Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(value).ok_or(StorageError::InvalidTimestamp(value))
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id").map_err(db)?,
        content: row.try_get("content").map_err(db)?,
        pic: row.try_get("pic").map_err(db)?,
        on_thread: row.try_get("on_thread").map_err(db)?,
        created: from_micros(row.try_get("created").map_err(db)?)?,
        bumped: from_micros(row.try_get("bumped").map_err(db)?)?,
    })
}

fn row_to_summary(row: &SqliteRow) -> Result<ThreadSummary> {
    Ok(ThreadSummary {
        id: row.try_get("id").map_err(db)?,
        content: row.try_get("content").map_err(db)?,
        pic: row.try_get("pic").map_err(db)?,
        created: from_micros(row.try_get("created").map_err(db)?)?,
        bumped: from_micros(row.try_get("bumped").map_err(db)?)?,
        replies: row.try_get("replies").map_err(db)?,
    })
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(max_connections, "sqlite store ready");
        Ok(store)
    }

    /// A private in-memory database. One connection that never expires,
    /// since every new connection would see an empty database.
    pub async fn in_memory() -> std::result::Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> std::result::Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PostRepository for SqliteStore {
    async fn list_roots(
        &self,
        order: ListingOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>> {
        let order_by = match order {
            ListingOrder::Bumped => "p.bumped DESC, p.id DESC",
            ListingOrder::Created => "p.created DESC, p.id DESC",
        };
        let sql = format!(
            "SELECT p.id, p.content, p.pic, p.created, p.bumped,
                    (SELECT COUNT(*) FROM post c WHERE c.on_thread = p.id) AS replies
             FROM post p
             WHERE p.on_thread = -1
             ORDER BY {order_by}
             LIMIT ? OFFSET ?"
        );
        sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?
            .iter()
            .map(row_to_summary)
            .collect()
    }

    async fn list_thread(&self, id: PostId) -> Result<Vec<Post>> {
        sqlx::query(
            "SELECT id, content, pic, on_thread, created, bumped
             FROM post
             WHERE id = ? OR on_thread = ?
             ORDER BY created ASC, id ASC",
        )
        .bind(id)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .iter()
        .map(row_to_post)
        .collect()
    }

    async fn insert_root(&self, post: NewPost, now: DateTime<Utc>) -> Result<PostId> {
        sqlx::query_scalar(
            "INSERT INTO post (content, pic, on_thread, delete_code, created, bumped)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(post.content)
        .bind(post.pic)
        .bind(ROOT_THREAD)
        .bind(post.delete_code)
        .bind(micros(now))
        .bind(micros(now))
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    async fn insert_reply(
        &self,
        thread_id: PostId,
        post: NewPost,
        now: DateTime<Utc>,
    ) -> Result<PostId> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let bumped = sqlx::query(
            "UPDATE post SET bumped = MAX(bumped, ?) WHERE id = ? AND on_thread = -1",
        )
        .bind(micros(now))
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .rows_affected();

        if bumped == 0 {
            tx.rollback().await.map_err(db)?;
            return Err(DomainError::ThreadNotFound(thread_id));
        }

        let id = sqlx::query_scalar(
            "INSERT INTO post (content, pic, on_thread, delete_code, created, bumped)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(post.content)
        .bind(post.pic)
        .bind(thread_id)
        .bind(post.delete_code)
        .bind(micros(now))
        .bind(micros(now))
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;
        Ok(id)
    }

    async fn delete_post(&self, id: PostId, delete_code: &str) -> Result<Option<DeletedPost>> {
        let on_thread: Option<PostId> =
            sqlx::query_scalar("DELETE FROM post WHERE id = ? AND delete_code = ? RETURNING on_thread")
                .bind(id)
                .bind(delete_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(on_thread.map(|on_thread| DeletedPost { id, on_thread }))
    }

    async fn delete_replies_of(&self, thread_ids: &[PostId]) -> Result<u64> {
        if thread_ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut deleted = 0;
        for chunk in thread_ids.chunks(IDS_PER_STATEMENT) {
            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM post WHERE on_thread IN (");
            let mut ids = query.separated(", ");
            for id in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
            deleted += query.build().execute(&mut *tx).await.map_err(db)?.rows_affected();
        }
        tx.commit().await.map_err(db)?;
        Ok(deleted)
    }

    async fn delete_roots_beyond(&self, keep: i64) -> Result<Vec<PostId>> {
        sqlx::query_scalar(
            "DELETE FROM post
             WHERE id IN (
                SELECT id FROM post
                WHERE on_thread = -1
                ORDER BY bumped DESC, id DESC
                LIMIT -1 OFFSET ?
             )
             RETURNING id",
        )
        .bind(keep)
        .fetch_all(&self.pool)
        .await
        .map_err(db)
    }
}

#[async_trait]
impl CaptchaRepository for SqliteStore {
    async fn insert(&self, captcha: Captcha) -> Result<()> {
        sqlx::query("INSERT INTO captcha (id, solution, created) VALUES (?, ?, ?)")
            .bind(captcha.id)
            .bind(captcha.solution)
            .bind(micros(captcha.created))
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn take_solution(&self, id: &str) -> Result<Option<String>> {
        sqlx::query_scalar("DELETE FROM captcha WHERE id = ? RETURNING solution")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)
    }

    async fn delete_created_before(&self, boundary: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM captcha WHERE created < ?")
            .bind(micros(boundary))
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected())
    }
}
