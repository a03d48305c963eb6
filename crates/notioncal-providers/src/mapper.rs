//! RawRecord to CalendarEvent conversion.
//!
//! Mapping is pure: the same record under the same view always produces the
//! same event. Records that cannot become an event are skipped with a
//! [`SkipReason`] instead of failing the batch.

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use notioncal_core::{CalendarEvent, EventTime, ViewConfig, next_day};
use tracing::{debug, warn};
use url::Url;

use crate::record::{DateValue, PropertyValue, RawRecord};

/// Domain appended to record ids to form event UIDs.
pub const UID_DOMAIN: &str = "notioncal";

/// Why a record produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The record has no identifier to derive a UID from.
    MissingId,
    /// The title property is absent or blank and no default is configured.
    MissingTitle,
    /// The date property is absent or empty.
    MissingDate,
    /// The date property holds a value that is not a date.
    InvalidDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => f.write_str("missing record id"),
            Self::MissingTitle => f.write_str("missing title"),
            Self::MissingDate => f.write_str("missing or invalid date"),
            Self::InvalidDate(value) => write!(f, "missing or invalid date '{value}'"),
        }
    }
}

/// Converts one record into a calendar event.
pub fn map_record(record: &RawRecord, view: &ViewConfig) -> Result<CalendarEvent, SkipReason> {
    if record.id.trim().is_empty() {
        return Err(SkipReason::MissingId);
    }

    let title = record
        .text(&view.title_property)
        .or_else(|| view.default_title.clone())
        .ok_or(SkipReason::MissingTitle)?;
    let title = match &view.title_prefix {
        Some(prefix) => format!("{prefix}{title}"),
        None => title,
    };

    let date = record
        .property(&view.date_property)
        .and_then(|p| p.as_date())
        .filter(|d| !d.start.trim().is_empty())
        .ok_or(SkipReason::MissingDate)?;
    let (start, end) = resolve_dates(record, date, view.timezone)?;

    let uid = format!("{}@{UID_DOMAIN}", record.compact_id());
    let mut event = CalendarEvent::new(uid, title, start, view.timezone)
        .with_source_url(record.notion_link())
        .with_timestamps(record.created_time, record.last_edited_time);
    event.end = end;

    let text = |property: &Option<String>| property.as_deref().and_then(|p| record.text(p));
    event.description = text(&view.description_property);
    event.location = text(&view.location_property);
    event.url = view
        .url_property
        .as_deref()
        .and_then(|p| record.property(p))
        .and_then(link_url);

    Ok(event)
}

/// Reads a link from a `url` property.
///
/// Other property kinds and values that do not parse as a URL yield
/// nothing. The parsed form is returned so it never carries whitespace or
/// line breaks into the calendar.
fn link_url(value: &PropertyValue) -> Option<String> {
    let PropertyValue::Url(Some(raw)) = value else {
        return None;
    };
    let raw = raw.trim();
    if raw.chars().any(char::is_control) {
        return None;
    }
    Url::parse(raw).ok().map(String::from)
}

/// Maps a batch, logging and dropping skipped records.
pub fn map_records(records: &[RawRecord], view: &ViewConfig) -> Vec<CalendarEvent> {
    let events: Vec<CalendarEvent> = records
        .iter()
        .filter_map(|record| match map_record(record, view) {
            Ok(event) => Some(event),
            Err(reason) => {
                warn!(view = %view.name, record_id = %record.id, %reason, "skipping record");
                None
            }
        })
        .collect();

    debug!(
        view = %view.name,
        records = records.len(),
        events = events.len(),
        "mapped records"
    );
    events
}

/// Resolves start and end, both in `view_tz`.
///
/// All-day ends are made exclusive. An end that is unparsable, of the other
/// kind, or earlier than the start is dropped.
fn resolve_dates(
    record: &RawRecord,
    date: &DateValue,
    view_tz: Tz,
) -> Result<(EventTime, Option<EventTime>), SkipReason> {
    // The property's own zone governs times written without an offset.
    let source_tz = date
        .time_zone
        .as_deref()
        .and_then(|tz| tz.parse::<Tz>().ok())
        .unwrap_or(view_tz);

    let start = parse_date(&date.start, source_tz, view_tz)
        .ok_or_else(|| SkipReason::InvalidDate(date.start.clone()))?;

    let explicit_end = date
        .end
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .and_then(|raw| {
            let parsed = parse_date(raw, source_tz, view_tz);
            if parsed.is_none() {
                warn!(record_id = %record.id, end = raw, "ignoring unparsable end date");
            }
            parsed
        });

    let end = match (start, explicit_end) {
        (EventTime::AllDay(start_day), end) => {
            let last = match end {
                Some(end) if end.date() >= start_day => end.date(),
                Some(_) => {
                    warn!(record_id = %record.id, "ignoring end date before start");
                    start_day
                }
                None => start_day,
            };
            Some(EventTime::AllDay(next_day(last)))
        }
        (EventTime::DateTime(start_at), Some(EventTime::DateTime(end_at))) => {
            if end_at < start_at {
                warn!(record_id = %record.id, "ignoring end time before start");
                None
            } else {
                Some(EventTime::DateTime(end_at))
            }
        }
        (EventTime::DateTime(_), Some(EventTime::AllDay(_))) => {
            warn!(record_id = %record.id, "ignoring all-day end on timed event");
            None
        }
        (EventTime::DateTime(_), None) => None,
    };

    Ok((start, end))
}

/// Parses a Notion date string.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 with `Z` or an offset, and date-times
/// without offset, which are read as wall time in `source_tz`.
fn parse_date(raw: &str, source_tz: Tz, view_tz: Tz) -> Option<EventTime> {
    let raw = raw.trim();

    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(EventTime::AllDay);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(EventTime::at(dt, view_tz));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| EventTime::at(resolve_local(source_tz, naive), view_tz))
}

/// Places a wall-clock time in `tz`.
///
/// Ambiguous times take the earlier instant. Times inside a DST gap are read
/// with the offset in force before the gap, so 02:30 on a spring-forward
/// night lands at 03:30.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            let before = naive - Duration::days(1);
            let offset = tz.offset_from_utc_datetime(&before).fix().local_minus_utc();
            let utc = naive - Duration::seconds(i64::from(offset));
            tz.from_utc_datetime(&utc)
        }
    }
}
