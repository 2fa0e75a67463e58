// SPDX-License-Identifier: Apache-2.0

//! Data models for stories and their moderation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderation state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Awaiting review; the initial state, and the state every author edit
    /// returns to
    Pending,
    /// Visible to readers
    Approved,
    /// Hidden after review
    Rejected,
}

impl PostStatus {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the column representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier, immutable after creation
    pub id: Uuid,
    /// Unique URL-safe identifier, immutable after creation
    pub slug: String,
    pub title: String,
    /// Rendered HTML from the rich-text editor
    pub content: String,
    /// Optional display name, no identity binding
    pub author_name: Option<String>,
    pub status: PostStatus,
    /// Only ever incremented, never decremented
    pub like_count: i64,
    /// Argon2id hash of the possession token; `None` means nobody can edit
    /// or delete this row (legacy rows)
    #[serde(skip_serializing)]
    pub edit_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Stamped on every author edit
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Public summary without content or moderation internals.
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
            author_name: self.author_name.clone(),
            status: self.status,
            like_count: self.like_count,
            created_at: self.created_at,
        }
    }
}

/// Public view of a story used in listings and status lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author_name: Option<String>,
    pub status: PostStatus,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted from the submission form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
}

/// What a successful submission hands back: the slug and the one-time
/// plaintext possession token.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub slug: String,
    pub edit_token: String,
}

/// Outcome of a status lookup by token.
#[derive(Debug, Clone, Serialize)]
pub struct StatusLookup {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<PostSummary>,
    /// Constructed link to the story, present on a match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rate_limit_remaining: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_repr() {
        for status in [PostStatus::Pending, PostStatus::Approved, PostStatus::Rejected] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("deleted"), None);
    }

    #[test]
    fn summary_omits_token_hash() {
        let post = Post {
            id: Uuid::new_v4(),
            slug: "eine-geschichte-abc".to_string(),
            title: "Eine Geschichte".to_string(),
            content: "<p>Es war einmal...</p>".to_string(),
            author_name: None,
            status: PostStatus::Pending,
            like_count: 0,
            edit_token_hash: Some("$argon2id$...".to_string()),
            created_at: Utc::now(),
            updated_at: None,
        };
        let json = serde_json::to_value(post.summary()).unwrap();
        assert!(json.get("edit_token_hash").is_none());
        assert!(json.get("content").is_none());
    }
}
