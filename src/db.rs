// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed post repository.
//!
//! A single relational `posts` table. The two access patterns that matter are
//! the exact slug lookup (UNIQUE constraint) and the approved-newest-first
//! listing (status+created_at index). Likes are incremented in one UPDATE so
//! concurrent likes never lose a count.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Post, PostStatus};

/// How many recent token-bearing posts a status lookup may scan.
pub const TOKEN_SCAN_CAP: i64 = 1000;

/// Database connection wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) and initialize the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);

        // An in-memory database exists per connection; keep the pool at one
        // so every query sees the same data.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Fresh in-memory database, used by tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Initialize the posts table and its indexes.
    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id              TEXT PRIMARY KEY,
                slug            TEXT NOT NULL UNIQUE,
                title           TEXT NOT NULL,
                content         TEXT NOT NULL,
                author_name     TEXT,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'approved', 'rejected')),
                like_count      INTEGER NOT NULL DEFAULT 0,
                edit_token_hash TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_status_created
             ON posts (status, created_at)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Persist a new post. A slug collision surfaces as a database error the
    /// caller can inspect with [`is_unique_violation`].
    pub async fn insert_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts
             (id, slug, title, content, author_name, status, like_count,
              edit_token_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id.to_string())
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.author_name)
        .bind(post.status.as_str())
        .bind(post.like_count)
        .bind(&post.edit_token_hash)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Exact-match slug lookup.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Post> {
        let row = sqlx::query("SELECT * FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_post).transpose()?.ok_or(AppError::NotFound)
    }

    /// All approved posts, newest first. Full snapshot; pagination is the
    /// caller's problem if this ever grows past what one response can carry.
    pub async fn list_approved(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE status = 'approved' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_post).collect()
    }

    /// Atomically bump the like counter and return the new value.
    /// `None` means no row with that id exists.
    pub async fn increment_like_count(&self, id: Uuid) -> Result<Option<i64>> {
        let new_count: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET like_count = like_count + 1 WHERE id = ? RETURNING like_count",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(new_count)
    }

    /// Overwrite title and content, demote to pending, stamp updated_at.
    /// Slug and id never change.
    pub async fn update_content(
        &self,
        slug: &str,
        title: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE posts SET title = ?, content = ?, status = 'pending', updated_at = ?
             WHERE slug = ?",
        )
        .bind(title)
        .bind(content)
        .bind(now)
        .bind(slug)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Remove the row permanently. No tombstone.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// The bounded scan window for status lookups: newest posts that still
    /// carry a token hash.
    pub async fn recent_with_token_hash(&self, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE edit_token_hash IS NOT NULL
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_post).collect()
    }

    /// Moderator transition: set the status outright.
    pub async fn set_status(&self, slug: &str, status: PostStatus) -> Result<()> {
        let result = sqlx::query("UPDATE posts SET status = ? WHERE slug = ?")
            .bind(status.as_str())
            .bind(slug)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

/// Whether a database error is a UNIQUE constraint violation (slug
/// collision). Treated as transient by the submit path.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn row_to_post(row: SqliteRow) -> Result<Post> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    Ok(Post {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::Internal(format!("corrupt post id {id:?}: {e}")))?,
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        status: PostStatus::parse(&status)
            .ok_or_else(|| AppError::Internal(format!("corrupt post status {status:?}")))?,
        like_count: row.get("like_count"),
        edit_token_hash: row.get("edit_token_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
