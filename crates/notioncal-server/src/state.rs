//! Shared, read-only server state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use notioncal_core::{AppConfig, CalendarRenderer, ViewRegistry};
use notioncal_providers::{NotionClient, NotionConfig, RateLimiter, RecordFetcher};
use tracing::debug;

use crate::error::ServerResult;

/// Default budget for generating one feed.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// State handed to every request.
///
/// Nothing in here is mutated after startup. The fetcher carries the
/// process-wide rate limiter, so all requests share one upstream budget.
#[derive(Debug, Clone)]
pub struct AppState {
    pub views: Arc<ViewRegistry>,
    pub fetcher: Arc<RecordFetcher>,
    pub renderer: Arc<CalendarRenderer>,
    pub request_timeout: Duration,
    started_at: Instant,
}

impl AppState {
    pub fn new(views: ViewRegistry, fetcher: RecordFetcher, renderer: CalendarRenderer) -> Self {
        Self {
            views: Arc::new(views),
            fetcher: Arc::new(fetcher),
            renderer: Arc::new(renderer),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            started_at: Instant::now(),
        }
    }

    /// Wires the Notion client, the shared limiter and the renderer from a
    /// loaded configuration.
    pub fn from_config(config: &AppConfig) -> ServerResult<Self> {
        let client = NotionClient::new(NotionConfig::from_settings(&config.notion)?)?;
        let limiter = Arc::new(RateLimiter::per_second(config.notion.requests_per_second));
        debug!(interval = ?limiter.interval(), "rate limiter configured");

        let fetcher = RecordFetcher::from_settings(Arc::new(client), limiter, &config.notion);
        let renderer = CalendarRenderer::new(config.ics_prodid.clone());

        Ok(Self::new(config.views.clone(), fetcher, renderer)
            .with_request_timeout(config.server.request_timeout))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn builds_from_config() {
        let config = AppConfig::from_str(
            r#"
            ics_prodid = "-//Acme//Feeds//EN"

            [notion]
            api_token = "secret_test"
            requests_per_second = 5
            max_retries = 1

            [server]
            request_timeout_secs = 15

            [calendar_views.team]
            database_id = "db1"
            date_property = "When"
            "#,
        )
        .unwrap();

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.views.len(), 1);
        assert_eq!(state.request_timeout, Duration::from_secs(15));
        assert_eq!(state.renderer.prodid(), "-//Acme//Feeds//EN");
        assert_eq!(state.fetcher.retry_policy().max_retries, 1);
    }

    #[test]
    fn invalid_base_url_fails_startup() {
        let config = AppConfig::from_str(
            r#"
            [notion]
            api_token = "secret_test"
            base_url = "not a url"

            [calendar_views.team]
            database_id = "db1"
            date_property = "When"
            "#,
        )
        .unwrap();

        assert!(AppState::from_config(&config).is_err());
    }
}
