// SPDX-License-Identifier: Apache-2.0

//! taxi-stories
//!
//! Backend for a small community story-sharing platform: visitors submit
//! stories, moderators approve or reject them, readers like approved stories,
//! and authors edit or delete their own story with a possession token handed
//! out exactly once at submission time (there are no accounts).
//!
//! - Possession tokens: 40-char hex secrets, stored only as Argon2id hashes
//! - Layered in-memory rate limiting (hourly cap plus a stricter minute cap)
//! - Idempotent URL slugs with a base-36 timestamp suffix
//! - SQLite-backed `posts` table with an atomic like counter

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod slug;
pub mod stories;
pub mod token;
pub mod token_cache;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, Result};
pub use stories::StoryService;
