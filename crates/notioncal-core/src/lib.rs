//! Core types: view configuration, calendar events, date windows, rendering.
//!
//! The feed pipeline is split across the workspace:
//!
//! ```text
//! ViewConfig ──► RecordFetcher ──► map_record ──► CalendarRenderer
//!  (core)        (providers)       (providers)       (core)
//! ```
//!
//! This crate owns the pieces that do not talk to the network.

pub mod config;
pub mod error;
pub mod event;
pub mod ics;
pub mod time;
pub mod tracing;
pub mod view;

pub use config::{ApiToken, AppConfig, MAX_PAGE_SIZE, NotionSettings, ServerSettings};
pub use error::{ConfigError, ViewNotFound};
pub use event::CalendarEvent;
pub use ics::{CalendarMeta, CalendarRenderer, DEFAULT_PRODID, RenderError};
pub use time::{DateWindow, EventTime, next_day};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use view::{DaySpan, ViewConfig, ViewRegistry};
