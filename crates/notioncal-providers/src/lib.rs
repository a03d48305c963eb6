//! Notion record source, paginating fetcher and record-to-event mapping.
//!
//! ```text
//! ┌──────────────┐  query_page   ┌───────────────┐
//! │ NotionClient │◄──────────────│ RecordFetcher │◄── RateLimiter (shared)
//! └──────────────┘  RecordSource └───────┬───────┘
//!                                        │ Stream<RawRecord>
//!                                        ▼
//!                                  map_record()
//!                                        │
//!                                        ▼
//!                                 CalendarEvent
//! ```
//!
//! ```ignore
//! use notioncal_providers::{NotionClient, RateLimiter, RecordFetcher, map_records};
//!
//! let fetcher = RecordFetcher::new(Arc::new(client), Arc::new(RateLimiter::per_second(3)));
//! let records = fetcher.fetch_all(&view, Utc::now()).await?;
//! let events = map_records(&records, &view);
//! ```

pub mod error;
pub mod fetcher;
pub mod filter;
pub mod mapper;
pub mod notion;
pub mod rate_limit;
pub mod record;
pub mod source;

pub use error::{UpstreamError, UpstreamErrorCode, UpstreamResult};
pub use fetcher::{RecordFetcher, RetryPolicy};
pub use filter::build_filter;
pub use mapper::{SkipReason, map_record, map_records};
pub use notion::{NotionClient, NotionConfig};
pub use rate_limit::RateLimiter;
pub use record::{DateValue, PropertyValue, RawRecord};
pub use source::{BoxFuture, Page, PageRequest, RecordSource};
