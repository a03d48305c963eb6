//! The [`RecordSource`] trait: one page of records per call.
//!
//! Pagination, retry and rate limiting live in the fetcher; a source only
//! knows how to issue a single query.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::UpstreamResult;
use crate::record::RawRecord;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so sources can be swapped
/// behind an `Arc<dyn RecordSource>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single page query.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub database_id: String,
    /// Predicate sent upstream, if any.
    pub filter: Option<Value>,
    /// Continuation token from the previous page.
    pub start_cursor: Option<String>,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(database_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            database_id: database_id.into(),
            filter: None,
            start_cursor: None,
            page_size,
        }
    }

    pub fn with_filter(mut self, filter: Option<Value>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.start_cursor = cursor;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Present iff more records follow.
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(records: Vec<RawRecord>, next_cursor: Option<String>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// A store that can be queried one page at a time.
pub trait RecordSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Issues one query.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` on transport, status or decoding failures.
    /// Implementations do not retry.
    fn query_page(&self, request: PageRequest) -> BoxFuture<'_, UpstreamResult<Page>>;
}
