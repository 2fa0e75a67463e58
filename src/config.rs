// SPDX-License-Identifier: Apache-2.0

//! Configuration for the story backend.
//!
//! Values come from the environment (see `main::load_config`); defaults match
//! the limits the platform has always enforced: 10 submission-adjacent
//! attempts per hour with at most 3 per minute, and 10 status lookups per
//! hour.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Database URL (default: sqlite://stories.db)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Public base URL used to build story links in status responses
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Shared secret for the moderation endpoint; moderation is disabled
    /// while this is unset
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Rate limit policy for submit/update/delete
    #[serde(default = "RateLimitPolicy::submission")]
    pub submit_rate_limit: RateLimitPolicy,

    /// Rate limit policy for status lookups by token
    #[serde(default = "RateLimitPolicy::status_lookup")]
    pub status_rate_limit: RateLimitPolicy,

    /// Pause inserted every 10 hash comparisons during a status lookup scan,
    /// in milliseconds (default: 150)
    #[serde(default = "default_scan_pause_ms")]
    pub scan_pause_ms: u64,
}

/// A fixed-window cap with an optional stricter sub-window cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Window length in seconds (default: 3600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Maximum attempts per window
    pub max_per_window: u32,

    /// Stricter sub-window length in seconds, if configured
    #[serde(default)]
    pub sub_window_secs: Option<u64>,

    /// Maximum attempts per sub-window, if configured
    #[serde(default)]
    pub max_per_sub_window: Option<u32>,
}

impl RateLimitPolicy {
    /// Policy for submission-adjacent actions: 10/hour, at most 3/minute.
    pub fn submission() -> Self {
        Self {
            window_secs: 3600,
            max_per_window: 10,
            sub_window_secs: Some(60),
            max_per_sub_window: Some(3),
        }
    }

    /// Policy for status lookups: 10/hour, no sub-cap.
    pub fn status_lookup() -> Self {
        Self {
            window_secs: 3600,
            max_per_window: 10,
            sub_window_secs: None,
            max_per_sub_window: None,
        }
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Sub-window length as a `Duration`, when a sub-cap is configured.
    pub fn sub_window(&self) -> Option<Duration> {
        match (self.sub_window_secs, self.max_per_sub_window) {
            (Some(secs), Some(_)) => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

impl Config {
    /// Pause between comparison batches during a status-lookup scan.
    pub fn scan_pause(&self) -> Duration {
        Duration::from_millis(self.scan_pause_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            public_base_url: default_public_base_url(),
            admin_token: None,
            submit_rate_limit: RateLimitPolicy::submission(),
            status_rate_limit: RateLimitPolicy::status_lookup(),
            scan_pause_ms: default_scan_pause_ms(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_url() -> String {
    "sqlite://stories.db".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_window_secs() -> u64 {
    3600
}

fn default_scan_pause_ms() -> u64 {
    150
}
