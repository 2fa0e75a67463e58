// SPDX-License-Identifier: Apache-2.0

//! Story workflow: submission, moderation state, ownership-gated edits.
//!
//! Every mutation proves authorship with the possession token handed out at
//! submission time. There is no index from token to post (the stored hash is
//! one-way by design), so the status lookup scans a bounded window of recent
//! token-bearing posts, throttled against brute force by a rate limiter and
//! an artificial pause between comparison batches.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{self, Database, TOKEN_SCAN_CAP};
use crate::error::{AppError, Result};
use crate::models::{NewStory, Post, PostStatus, PostSummary, StatusLookup, SubmissionReceipt};
use crate::rate_limit::{RateLimitResult, RateLimiter};
use crate::{slug, token};

/// Hash comparisons between artificial pauses during a status lookup.
const SCAN_BATCH: usize = 10;

/// Orchestrates token verification, rate limiting, and persistence for all
/// story operations.
pub struct StoryService {
    db: Database,
    config: Config,
    submit_limiter: RateLimiter,
    status_limiter: RateLimiter,
}

impl StoryService {
    pub fn new(db: Database, config: Config) -> Self {
        let submit_limiter = RateLimiter::new(config.submit_rate_limit.clone());
        let status_limiter = RateLimiter::new(config.status_rate_limit.clone());
        Self {
            db,
            config,
            submit_limiter,
            status_limiter,
        }
    }

    /// Limiter for submission-adjacent actions, exposed for the cleanup task.
    pub fn submit_limiter(&self) -> &RateLimiter {
        &self.submit_limiter
    }

    /// Limiter for status lookups, exposed for the cleanup task.
    pub fn status_limiter(&self) -> &RateLimiter {
        &self.status_limiter
    }

    /// Submit a new story. Returns the slug and the one-time plaintext token;
    /// the token is never stored and never logged.
    pub async fn submit(&self, input: NewStory, client_key: &str) -> Result<SubmissionReceipt> {
        self.consume_submit_attempt(client_key).await?;
        validate_story_fields(&input.title, &input.content, input.author_name.as_deref())?;

        let edit_token = token::generate_edit_token();
        let edit_token_hash = token::hash_token(&edit_token)?;

        let author_name = input
            .author_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let mut post = Post {
            id: Uuid::new_v4(),
            slug: slug::unique_slug(&input.title, Utc::now()),
            title: input.title,
            content: input.content,
            author_name,
            status: PostStatus::Pending,
            like_count: 0,
            edit_token_hash: Some(edit_token_hash),
            created_at: Utc::now(),
            updated_at: None,
        };

        // A collision despite the timestamp suffix is transient: retry once
        // with a fresh suffix before giving up.
        if let Err(err) = self.db.insert_post(&post).await {
            match err {
                AppError::Database(ref e) if db::is_unique_violation(e) => {
                    warn!(slug = %post.slug, "slug collision, retrying with fresh suffix");
                    // Nudge the timestamp forward so the suffix is guaranteed
                    // to change even within the same millisecond.
                    let retry_at = Utc::now() + chrono::Duration::milliseconds(1);
                    post.slug = slug::unique_slug(&post.title, retry_at);
                    self.db.insert_post(&post).await?;
                }
                other => return Err(other),
            }
        }

        info!(slug = %post.slug, "story submitted");
        Ok(SubmissionReceipt {
            slug: post.slug,
            edit_token,
        })
    }

    /// All approved stories, newest first.
    pub async fn list_approved(&self) -> Result<Vec<PostSummary>> {
        let posts = self.db.list_approved().await?;
        Ok(posts.iter().map(Post::summary).collect())
    }

    /// Exact-match slug lookup.
    pub async fn get(&self, slug: &str) -> Result<Post> {
        self.db.get_by_slug(slug).await
    }

    /// Count one like and return the new total.
    pub async fn like(&self, id: Uuid) -> Result<i64> {
        match self.db.increment_like_count(id).await? {
            Some(count) => Ok(count),
            None => Err(AppError::NotFound),
        }
    }

    /// Overwrite a story's title and content after proving ownership.
    /// Every successful edit demotes the story to pending for re-review.
    pub async fn update(
        &self,
        slug: &str,
        edit_token: &str,
        title: &str,
        content: &str,
        client_key: &str,
    ) -> Result<String> {
        self.consume_submit_attempt(client_key).await?;
        validate_story_fields(title, content, None)?;

        let post = self.db.get_by_slug(slug).await?;
        self.verify_ownership(&post, edit_token)?;

        self.db
            .update_content(slug, title, content, Utc::now())
            .await?;
        info!(%slug, "story updated, back to pending");
        Ok(slug.to_string())
    }

    /// Permanently remove a story after proving ownership.
    pub async fn delete(&self, slug: &str, edit_token: &str, client_key: &str) -> Result<()> {
        self.consume_submit_attempt(client_key).await?;

        let post = self.db.get_by_slug(slug).await?;
        self.verify_ownership(&post, edit_token)?;

        self.db.delete_by_slug(slug).await?;
        info!(%slug, "story deleted");
        Ok(())
    }

    /// Discover which story a token belongs to, rate limited by a fingerprint
    /// of the token. Malformed tokens still consume an attempt but never
    /// touch storage.
    pub async fn check_status(&self, edit_token: &str) -> Result<StatusLookup> {
        let fingerprint = token::fingerprint(edit_token);
        let rate = self.status_limiter.check(&fingerprint).await;
        let remaining = rate.remaining();
        if let RateLimitResult::Limited { retry_after } = rate {
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_secs(),
            });
        }

        if !token::is_well_formed(edit_token) {
            return Ok(StatusLookup {
                success: false,
                story: None,
                url: None,
                error: Some("Ungültiges Token-Format".to_string()),
                rate_limit_remaining: remaining,
            });
        }

        let candidates = self.db.recent_with_token_hash(TOKEN_SCAN_CAP).await?;
        for (index, post) in candidates.iter().enumerate() {
            if index > 0 && index % SCAN_BATCH == 0 {
                tokio::time::sleep(self.config.scan_pause()).await;
            }
            let Some(hash) = post.edit_token_hash.as_deref() else {
                continue;
            };
            match token::verify_token(edit_token, hash) {
                Ok(true) => {
                    return Ok(StatusLookup {
                        success: true,
                        url: Some(self.story_url(&post.slug)),
                        story: Some(post.summary()),
                        error: None,
                        rate_limit_remaining: remaining,
                    });
                }
                Ok(false) => {}
                // One corrupt row must not break lookups for everyone else.
                Err(e) => warn!(slug = %post.slug, error = %e, "skipping unverifiable token hash"),
            }
        }

        Ok(StatusLookup {
            success: false,
            story: None,
            url: None,
            error: Some("Keine Geschichte zu diesem Token gefunden".to_string()),
            rate_limit_remaining: remaining,
        })
    }

    /// Moderator transition between pending/approved/rejected.
    pub async fn moderate(&self, slug: &str, status: PostStatus) -> Result<()> {
        self.db.set_status(slug, status).await?;
        info!(%slug, %status, "moderation status set");
        Ok(())
    }

    async fn consume_submit_attempt(&self, client_key: &str) -> Result<()> {
        match self.submit_limiter.check(client_key).await {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Limited { retry_after } => Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_secs(),
            }),
        }
    }

    /// The ownership gate. A missing hash (legacy row) and a mismatched token
    /// both come back as `Forbidden` so callers cannot tell the cases apart.
    fn verify_ownership(&self, post: &Post, edit_token: &str) -> Result<()> {
        let Some(hash) = post.edit_token_hash.as_deref() else {
            warn!(slug = %post.slug, "edit attempt on a story without a token hash");
            return Err(AppError::Forbidden);
        };
        if token::verify_token(edit_token, hash)? {
            Ok(())
        } else {
            warn!(slug = %post.slug, "edit attempt with a mismatched token");
            Err(AppError::Forbidden)
        }
    }

    fn story_url(&self, slug: &str) -> String {
        format!(
            "{}/lesen/{}",
            self.config.public_base_url.trim_end_matches('/'),
            slug
        )
    }
}

/// Field constraints shared by submit and update. Messages are user-facing
/// German, counted in characters rather than bytes.
fn validate_story_fields(title: &str, content: &str, author_name: Option<&str>) -> Result<()> {
    let title_len = title.trim().chars().count();
    if title_len < 3 {
        return Err(AppError::Validation(
            "Titel muss mindestens 3 Zeichen haben".to_string(),
        ));
    }
    if title_len > 200 {
        return Err(AppError::Validation(
            "Titel darf höchstens 200 Zeichen haben".to_string(),
        ));
    }

    if content.trim().chars().count() < 10 {
        return Err(AppError::Validation(
            "Inhalt muss mindestens 10 Zeichen haben".to_string(),
        ));
    }

    if let Some(name) = author_name {
        if name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Name darf höchstens 100 Zeichen haben".to_string(),
            ));
        }
    }

    Ok(())
}
