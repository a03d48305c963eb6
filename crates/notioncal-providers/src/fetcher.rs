//! Paginating record fetcher.
//!
//! Pages are requested lazily as the returned stream is polled. Every
//! request, retries included, first passes through the shared
//! [`RateLimiter`]. A rate-limited page is re-requested with the same cursor
//! after a backoff; any other failure ends the stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use notioncal_core::{DateWindow, MAX_PAGE_SIZE, NotionSettings, ViewConfig};
use tracing::{debug, info, warn};

use crate::error::{UpstreamError, UpstreamResult};
use crate::filter::build_filter;
use crate::rate_limit::RateLimiter;
use crate::record::RawRecord;
use crate::source::{Page, PageRequest, RecordSource};

/// Retry schedule for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries per page after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Computed delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();
        Duration::from_secs_f64(delay.min(max))
    }

    /// Delay before retry `attempt` of a request that failed with `err`.
    ///
    /// A server-provided `Retry-After` replaces the computed backoff; both
    /// are capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32, err: &UpstreamError) -> Duration {
        err.retry_after()
            .unwrap_or_else(|| self.backoff_delay(attempt))
            .min(self.max_backoff)
    }
}

/// Progress of one paginated fetch.
struct FetchState {
    /// `None` once the last page has been yielded.
    cursor: Option<Option<String>>,
    pages: u32,
    records: usize,
}

/// Pulls every record of a view from a [`RecordSource`].
#[derive(Clone)]
pub struct RecordFetcher {
    source: Arc<dyn RecordSource>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    page_size: u32,
}

impl std::fmt::Debug for RecordFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFetcher")
            .field("source", &self.source.name())
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl RecordFetcher {
    pub fn new(source: Arc<dyn RecordSource>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            source,
            limiter,
            retry: RetryPolicy::default(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Creates a fetcher using the retry and page settings of `[notion]`.
    pub fn from_settings(
        source: Arc<dyn RecordSource>,
        limiter: Arc<RateLimiter>,
        settings: &NotionSettings,
    ) -> Self {
        Self::new(source, limiter)
            .with_retry(RetryPolicy::new(settings.max_retries))
            .with_page_size(settings.page_size)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the page size, clamped to `1..=100`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Streams every record of `view` inside its date window at `now`.
    ///
    /// The stream ends after the last page, or right after yielding the
    /// first unrecoverable error.
    pub fn fetch<'a>(
        &'a self,
        view: &'a ViewConfig,
        now: DateTime<Utc>,
    ) -> impl Stream<Item = UpstreamResult<RawRecord>> + Send + 'a {
        let window = DateWindow::for_view(view, now);
        let filter = build_filter(view, &window);
        let initial = FetchState {
            cursor: Some(None),
            pages: 0,
            records: 0,
        };

        stream::unfold(initial, move |mut state| {
            let filter = filter.clone();
            async move {
                let cursor = state.cursor.take()?;
                let request = PageRequest::new(view.database_id.clone(), self.page_size)
                    .with_filter(filter)
                    .with_cursor(cursor);

                match self.query_with_retry(&view.name, request).await {
                    Ok(page) => {
                        state.pages += 1;
                        state.records += page.records.len();
                        debug!(
                            view = %view.name,
                            page = state.pages,
                            records = page.records.len(),
                            "fetched page"
                        );
                        match page.next_cursor {
                            Some(next) => state.cursor = Some(Some(next)),
                            None => info!(
                                view = %view.name,
                                pages = state.pages,
                                records = state.records,
                                "fetched records"
                            ),
                        }
                        Some((Ok(page.records), state))
                    }
                    Err(err) => Some((Err(err), state)),
                }
            }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, UpstreamError>)))
        .try_flatten()
    }

    /// Collects the whole result set of `view`.
    pub async fn fetch_all(
        &self,
        view: &ViewConfig,
        now: DateTime<Utc>,
    ) -> UpstreamResult<Vec<RawRecord>> {
        self.fetch(view, now).try_collect().await
    }

    async fn query_with_retry(&self, view: &str, request: PageRequest) -> UpstreamResult<Page> {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;
            match self.source.query_page(request.clone()).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt, &err);
                    warn!(
                        view,
                        source = self.source.name(),
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "upstream rate limited, retrying page"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(view, attempts = attempt + 1, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}
