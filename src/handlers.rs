// SPDX-License-Identifier: Apache-2.0

//! HTTP handlers for the story backend.
//!
//! Handlers stay thin: extract input, resolve the client identifier, delegate
//! to [`StoryService`], let [`AppError`](crate::error::AppError) shape the
//! failure response.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{NewStory, Post, PostStatus, PostSummary, StatusLookup, SubmissionReceipt};
use crate::stories::StoryService;

/// Shared application state.
pub struct AppState {
    pub service: StoryService,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub edit_token: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub edit_token: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub edit_token: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub like_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub status: PostStatus,
}

/// Build the full route table.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/posts", get(list_posts).post(submit_post))
        .route(
            "/api/posts/{slug}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/posts/{slug}/like", post(like_post))
        .route("/api/posts/{slug}/status", post(moderate_post))
        .route("/api/status", post(check_status))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<PostSummary>>> {
    Ok(Json(state.service.list_approved().await?))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Post>> {
    Ok(Json(state.service.get(&slug).await?))
}

async fn submit_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<NewStory>,
) -> Result<(StatusCode, Json<SubmissionReceipt>)> {
    let ip = client_ip(&headers);
    debug!(%ip, "processing submission");
    let receipt = state.service.submit(input, &ip).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn like_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeResponse>> {
    let like_count = state.service.like(id).await?;
    Ok(Json(LikeResponse { like_count }))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>> {
    let ip = client_ip(&headers);
    let slug = state
        .service
        .update(&slug, &req.edit_token, &req.title, &req.content, &ip)
        .await?;
    Ok(Json(UpdateResponse { slug }))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>> {
    let ip = client_ip(&headers);
    state.service.delete(&slug, &req.edit_token, &ip).await?;
    Ok(Json(DeleteResponse { success: true }))
}

async fn check_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusLookup>> {
    Ok(Json(state.service.check_status(&req.edit_token).await?))
}

/// Moderation endpoint, guarded by the shared admin token. Disabled entirely
/// while no token is configured.
async fn moderate_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ModerateRequest>,
) -> Result<Json<DeleteResponse>> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(AppError::Forbidden);
    };
    let provided = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        return Err(AppError::Forbidden);
    }

    state.service.moderate(&slug, req.status).await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// Resolve the client identifier for rate limiting: first entry of
/// `X-Forwarded-For`, then `X-Real-IP`, else `"unknown"` (only reachable when
/// no proxy fronts the service).
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "unknown".to_string()
}
