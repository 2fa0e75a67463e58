// SPDX-License-Identifier: Apache-2.0

//! Security tests for the possession-token paths.
//!
//! Simulates brute-force behavior against the status lookup and the
//! ownership gate and checks that the throttles and the no-oracle error
//! mapping hold.

use std::time::Instant;

use chrono::Utc;
use taxi_stories::config::{Config, RateLimitPolicy};
use taxi_stories::error::AppError;
use taxi_stories::models::{NewStory, Post, PostStatus};
use taxi_stories::{token, Database, StoryService};
use uuid::Uuid;

fn open_policy() -> RateLimitPolicy {
    RateLimitPolicy {
        window_secs: 3600,
        max_per_window: 100_000,
        sub_window_secs: None,
        max_per_sub_window: None,
    }
}

fn seeded_post(slug: &str) -> Post {
    Post {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        title: slug.to_string(),
        content: "<p>Eine Fahrt, die niemand so schnell vergisst.</p>".to_string(),
        author_name: None,
        status: PostStatus::Approved,
        like_count: 0,
        edit_token_hash: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn story(title: &str) -> NewStory {
    NewStory {
        title: title.to_string(),
        content: "<p>Eine Fahrt, die niemand so schnell vergisst.</p>".to_string(),
        author_name: None,
    }
}

async fn service_with(status_cap: u32, scan_pause_ms: u64) -> StoryService {
    let db = Database::connect_in_memory().await.unwrap();
    let config = Config {
        status_rate_limit: RateLimitPolicy {
            window_secs: 3600,
            max_per_window: status_cap,
            sub_window_secs: None,
            max_per_sub_window: None,
        },
        submit_rate_limit: open_policy(),
        scan_pause_ms,
        ..Config::default()
    };
    StoryService::new(db, config)
}

#[tokio::test]
async fn repeated_lookups_of_one_token_exhaust_its_budget() {
    let service = service_with(10, 0).await;
    let probe = "c".repeat(40);

    for n in 1..=10u32 {
        let lookup = service.check_status(&probe).await.unwrap();
        assert_eq!(lookup.rate_limit_remaining, 10 - n);
    }

    let err = service.check_status(&probe).await.unwrap_err();
    assert!(matches!(err, AppError::RateLimited { .. }));

    // A different token has its own fingerprint and its own budget.
    assert!(service.check_status(&"d".repeat(40)).await.is_ok());
}

#[tokio::test]
async fn malformed_probes_cost_attempts_without_touching_storage() {
    let service = service_with(3, 0).await;

    for _ in 0..3 {
        let lookup = service.check_status("nicht-hex").await.unwrap();
        assert!(!lookup.success);
    }
    assert!(matches!(
        service.check_status("nicht-hex").await.unwrap_err(),
        AppError::RateLimited { .. }
    ));
}

#[tokio::test]
async fn uppercase_hex_is_rejected_at_the_surface() {
    let service = service_with(10, 0).await;
    let lookup = service.check_status(&"A".repeat(40)).await.unwrap();
    assert!(!lookup.success);
    assert!(lookup.error.unwrap().contains("Token-Format"));
}

#[tokio::test]
async fn scan_pauses_between_comparison_batches() {
    let db = Database::connect_in_memory().await.unwrap();
    let config = Config {
        submit_rate_limit: open_policy(),
        status_rate_limit: open_policy(),
        scan_pause_ms: 40,
        ..Config::default()
    };
    let hash = token::hash_token(&"a".repeat(40)).unwrap();
    for i in 0..25 {
        let mut post = seeded_post(&format!("geschichte-{i}"));
        post.edit_token_hash = Some(hash.clone());
        db.insert_post(&post).await.unwrap();
    }
    let service = StoryService::new(db, config);

    // An unknown token forces a full scan of 25 hashes, so at least two
    // batch pauses must elapse.
    let start = Instant::now();
    let lookup = service.check_status(&"e".repeat(40)).await.unwrap();
    assert!(!lookup.success);
    assert!(start.elapsed().as_millis() >= 80);
}

#[tokio::test]
async fn wrong_token_and_missing_hash_are_indistinguishable() {
    let db = Database::connect_in_memory().await.unwrap();
    let config = Config {
        submit_rate_limit: open_policy(),
        status_rate_limit: open_policy(),
        scan_pause_ms: 0,
        ..Config::default()
    };
    let service = StoryService::new(db.clone(), config);

    let receipt = service.submit(story("Mit Token"), "ip").await.unwrap();

    db.insert_post(&seeded_post("ohne-token")).await.unwrap();

    let wrong = "b".repeat(40);
    let on_hashed = service.delete(&receipt.slug, &wrong, "ip").await.unwrap_err();
    let on_legacy = service.delete("ohne-token", &wrong, "ip").await.unwrap_err();

    // Same variant, same message: no oracle for which check failed.
    assert!(matches!(on_hashed, AppError::Forbidden));
    assert!(matches!(on_legacy, AppError::Forbidden));
    assert_eq!(on_hashed.to_string(), on_legacy.to_string());
}

#[tokio::test]
async fn failed_edits_never_mutate_the_row() {
    let service = service_with(10, 0).await;
    let receipt = service.submit(story("Unversehrt"), "ip").await.unwrap();
    let before = service.get(&receipt.slug).await.unwrap();

    for probe in ["0".repeat(40), "f".repeat(40), "deadbeef".repeat(5)] {
        let _ = service
            .update(&receipt.slug, &probe, "Anderer Titel", "Anderer Inhalt, lang genug.", "ip")
            .await
            .unwrap_err();
    }

    let after = service.get(&receipt.slug).await.unwrap();
    assert_eq!(
        serde_json::to_value(&before).unwrap(),
        serde_json::to_value(&after).unwrap()
    );
}
