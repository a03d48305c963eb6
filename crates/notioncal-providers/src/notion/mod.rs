//! Notion database query client.
//!
//! Talks to `POST /databases/{id}/query` and decodes result pages into
//! [`RawRecord`](crate::record::RawRecord)s.

mod client;
mod config;

pub use client::NotionClient;
pub use config::NotionConfig;
