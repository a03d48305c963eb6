//! HTTP routes.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::error::FeedError;
use crate::feed::generate_feed;
use crate::state::AppState;

pub const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/calendar/{file}", get(calendar_feed))
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub available_feeds: Vec<String>,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub calendar_feed: &'static str,
    pub health: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub views_configured: usize,
    pub uptime_seconds: u64,
}

/// GET / - List the configured feeds
async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Notion iCalendar feed server",
        available_feeds: state.views.names().map(str::to_string).collect(),
        endpoints: Endpoints {
            calendar_feed: "/calendar/{view_name}.ics",
            health: "/health",
        },
    })
}

/// GET /health - Liveness
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        views_configured: state.views.len(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET /calendar/{name}.ics - One view as an iCalendar document
async fn calendar_feed(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, FeedError> {
    let name = file.strip_suffix(".ics").unwrap_or(&file);
    debug!(view = name, "feed requested");

    let body = tokio::time::timeout(state.request_timeout, generate_feed(&state, name, Utc::now()))
        .await
        .map_err(|_| FeedError::Timeout)??;

    Ok(([(header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE)], body).into_response())
}
