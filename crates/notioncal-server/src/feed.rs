//! The fetch, map and render pipeline behind one feed request.

use chrono::{DateTime, Utc};
use notioncal_core::CalendarMeta;
use notioncal_providers::map_records;
use tracing::info;

use crate::error::FeedError;
use crate::state::AppState;

/// Builds the calendar document for view `name` at `now`.
///
/// Skipped records only shrink the output. Any upstream or render failure
/// fails the whole request so no partial document is ever returned.
pub async fn generate_feed(
    state: &AppState,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, FeedError> {
    let view = state.views.get(name)?;

    let records = state
        .fetcher
        .fetch_all(view, now)
        .await
        .map_err(|e| FeedError::upstream(name, e))?;
    let events = map_records(&records, view);

    let body = state
        .renderer
        .render_at(&events, &CalendarMeta::for_view(view), now)
        .map_err(|e| FeedError::render(name, e))?;

    info!(
        view = name,
        records = records.len(),
        events = events.len(),
        bytes = body.len(),
        "generated feed"
    );
    Ok(body)
}
