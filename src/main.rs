// SPDX-License-Identifier: Apache-2.0

//! taxi-stories service binary.
//!
//! Wires the story workflow to an axum server:
//! - JSON structured logging with env-filter
//! - configuration from environment variables (`.env` honored)
//! - SQLite connection + schema init on startup
//! - hourly cleanup of both rate limiter maps for the life of the process

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taxi_stories::config::{Config, RateLimitPolicy};
use taxi_stories::handlers::{router, AppState};
use taxi_stories::{Database, StoryService};

/// How often stale rate-limit entries are swept.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        database_url = %config.database_url,
        submit_cap = config.submit_rate_limit.max_per_window,
        status_cap = config.status_rate_limit.max_per_window,
        moderation_enabled = config.admin_token.is_some(),
        "Starting story backend"
    );

    let db = Database::connect(&config.database_url).await?;
    info!("Database ready");

    let state = Arc::new(AppState {
        service: StoryService::new(db, config.clone()),
        config: config.clone(),
    });

    // Sweep both limiter maps hourly for the life of the process.
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_state.service.submit_limiter().cleanup().await;
            cleanup_state.service.status_limiter().cleanup().await;
        }
    });

    let app = router(state).layer(cors_layer()).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Restrictive CORS: only the origins named in `ALLOWED_ORIGINS`.
fn cors_layer() -> CorsLayer {
    let allowed_origins =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let origins: Vec<http::HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::CONTENT_TYPE])
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let defaults = Config::default();
    Config {
        bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
        database_url: env_or("DATABASE_URL", defaults.database_url),
        public_base_url: env_or("PUBLIC_BASE_URL", defaults.public_base_url),
        admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        submit_rate_limit: RateLimitPolicy {
            max_per_window: env_parse("SUBMIT_MAX_PER_HOUR", 10),
            max_per_sub_window: Some(env_parse("SUBMIT_MAX_PER_MINUTE", 3)),
            ..RateLimitPolicy::submission()
        },
        status_rate_limit: RateLimitPolicy {
            max_per_window: env_parse("STATUS_MAX_PER_HOUR", 10),
            ..RateLimitPolicy::status_lookup()
        },
        scan_pause_ms: env_parse("SCAN_PAUSE_MS", defaults.scan_pause_ms),
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
