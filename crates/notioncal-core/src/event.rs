//! The calendar event model.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::time::EventTime;

/// A record that has been mapped onto a calendar.
///
/// `start` and `end` are always the same kind: both all-day or both timed.
/// An all-day `end` is exclusive: a single-day event ends the next day.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    /// Globally unique and stable across fetches.
    pub uid: String,
    pub title: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    /// Zone the view resolves times into.
    pub timezone: Tz,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    /// Link back to the record in Notion.
    pub source_url: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    pub fn new(uid: impl Into<String>, title: impl Into<String>, start: EventTime, timezone: Tz) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            start,
            end: None,
            timezone,
            description: None,
            location: None,
            url: None,
            source_url: None,
            created: None,
            last_modified: None,
        }
    }

    /// Returns `true` if the event spans whole days.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Start instant in UTC, used to order events.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.to_utc(&self.timezone)
    }

    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Builder method to set the created and last-modified timestamps.
    pub fn with_timestamps(
        mut self,
        created: Option<DateTime<Utc>>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = created;
        self.last_modified = last_modified;
        self
    }
}
