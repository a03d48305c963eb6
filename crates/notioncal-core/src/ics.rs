//! iCalendar rendering.
//!
//! Events are built with the `icalendar` crate; the calendar header and the
//! `VTIMEZONE` blocks are written here since the crate emits neither the way
//! subscribing clients expect.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use icalendar::{Calendar, Component, EventLike, Property, ValueType};
use thiserror::Error;

use crate::event::CalendarEvent;
use crate::time::{EventTime, next_day};
use crate::view::ViewConfig;

/// Product identifier used when none is configured.
pub const DEFAULT_PRODID: &str = "-//notioncal//EN";

/// Longest description kept before truncation, in characters.
pub const DESCRIPTION_LIMIT: usize = 2000;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";
const FOLD_OCTETS: usize = 75;

/// An event that cannot be written to a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("event '{uid}' has an empty title")]
    EmptyTitle { uid: String },

    #[error("event '{uid}' ends before it starts")]
    EndBeforeStart { uid: String },

    #[error("event '{uid}' mixes all-day and timed values")]
    MixedTimeKinds { uid: String },
}

/// Calendar-level properties of one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMeta {
    pub name: String,
    pub description: Option<String>,
    pub timezone: Tz,
}

impl CalendarMeta {
    pub fn new(name: impl Into<String>, timezone: Tz) -> Self {
        Self {
            name: name.into(),
            description: None,
            timezone,
        }
    }

    /// Derives the header of a view's feed.
    pub fn for_view(view: &ViewConfig) -> Self {
        Self {
            name: view.display_name().to_string(),
            description: view.calendar_description.clone(),
            timezone: view.timezone,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Serializes events into an RFC 5545 document.
#[derive(Debug, Clone)]
pub struct CalendarRenderer {
    prodid: String,
}

impl Default for CalendarRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PRODID)
    }
}

impl CalendarRenderer {
    pub fn new(prodid: impl Into<String>) -> Self {
        Self {
            prodid: prodid.into(),
        }
    }

    pub fn prodid(&self) -> &str {
        &self.prodid
    }

    /// Renders a calendar stamped with the current time.
    pub fn render(
        &self,
        events: &[CalendarEvent],
        meta: &CalendarMeta,
    ) -> Result<Vec<u8>, RenderError> {
        self.render_at(events, meta, Utc::now())
    }

    /// Renders a calendar with an explicit `DTSTAMP`.
    ///
    /// Events are written in start order; events starting together keep
    /// their input order.
    pub fn render_at(
        &self,
        events: &[CalendarEvent],
        meta: &CalendarMeta,
        stamp: DateTime<Utc>,
    ) -> Result<Vec<u8>, RenderError> {
        let mut ordered: Vec<&CalendarEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.start_utc());

        let mut calendar = Calendar::new();
        let mut zones = ZoneSpans::default();
        for event in &ordered {
            validate(event)?;
            zones.record(event);
            calendar.push(build_event(event, stamp));
        }
        let calendar = calendar.done();

        let timezones: Vec<String> = zones
            .spans
            .values()
            .map(|(tz, first, last)| vtimezone(*tz, *first, *last))
            .collect();

        let header = self.header_lines(meta);
        Ok(assemble(&calendar.to_string(), &header, &timezones).into_bytes())
    }

    fn header_lines(&self, meta: &CalendarMeta) -> Vec<String> {
        let mut lines = vec![
            "VERSION:2.0".to_string(),
            content_line("PRODID", &self.prodid),
            "CALSCALE:GREGORIAN".to_string(),
            "METHOD:PUBLISH".to_string(),
            content_line("X-WR-CALNAME", &escape_text(&meta.name)),
        ];
        if let Some(description) = &meta.description {
            lines.push(content_line("X-WR-CALDESC", &escape_text(description)));
        }
        lines.push(content_line("X-WR-TIMEZONE", meta.timezone.name()));
        lines
    }
}

fn validate(event: &CalendarEvent) -> Result<(), RenderError> {
    if event.title.trim().is_empty() {
        return Err(RenderError::EmptyTitle {
            uid: event.uid.clone(),
        });
    }
    if let Some(end) = &event.end {
        if end.is_all_day() != event.start.is_all_day() {
            return Err(RenderError::MixedTimeKinds {
                uid: event.uid.clone(),
            });
        }
        if end.to_utc(&event.timezone) < event.start_utc() {
            return Err(RenderError::EndBeforeStart {
                uid: event.uid.clone(),
            });
        }
    }
    Ok(())
}

fn build_event(event: &CalendarEvent, stamp: DateTime<Utc>) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.title);
    ics_event.add_property("DTSTAMP", stamp.format(UTC_FORMAT).to_string());

    add_time_property(&mut ics_event, "DTSTART", &event.start);
    match (&event.start, &event.end) {
        (_, Some(end)) => add_time_property(&mut ics_event, "DTEND", end),
        (EventTime::AllDay(start), None) => {
            add_time_property(&mut ics_event, "DTEND", &EventTime::AllDay(next_day(*start)));
        }
        (EventTime::DateTime(_), None) => {}
    }

    if let Some(description) = event_description(event) {
        ics_event.description(&description);
    }
    if let Some(location) = &event.location {
        ics_event.location(location);
    }
    // URI values are written unescaped; a line break would split the property.
    let link = |url: &Option<String>| url.as_deref().filter(|u| !u.chars().any(char::is_control));
    if let Some(url) = link(&event.url).or_else(|| link(&event.source_url)) {
        ics_event.add_property("URL", url);
    }
    if let Some(created) = event.created {
        ics_event.add_property("CREATED", created.format(UTC_FORMAT).to_string());
    }
    if let Some(modified) = event.last_modified {
        ics_event.add_property("LAST-MODIFIED", modified.format(UTC_FORMAT).to_string());
    }

    ics_event.done()
}

fn add_time_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::AllDay(date) => {
            let mut prop = Property::new(name, date.format(DATE_FORMAT).to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTime(dt) if is_utc(&dt.timezone()) => {
            ics_event.add_property(name, dt.with_timezone(&Utc).format(UTC_FORMAT).to_string());
        }
        EventTime::DateTime(dt) => {
            let mut prop = Property::new(name, dt.format(LOCAL_FORMAT).to_string());
            prop.add_parameter("TZID", dt.timezone().name());
            ics_event.append_property(prop);
        }
    }
}

/// Builds the event description: the record text without carriage returns,
/// cut at [`DESCRIPTION_LIMIT`] characters, then the link back to Notion.
pub fn event_description(event: &CalendarEvent) -> Option<String> {
    let body = event
        .description
        .as_deref()
        .map(|text| text.replace('\r', ""))
        .filter(|text| !text.trim().is_empty())
        .map(|text| match text.char_indices().nth(DESCRIPTION_LIMIT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        });

    match (body, &event.source_url) {
        (Some(body), Some(link)) => Some(format!("{body}\n\nNotion: {link}")),
        (None, Some(link)) => Some(format!("Notion: {link}")),
        (body, None) => body,
    }
}

fn is_utc(tz: &Tz) -> bool {
    matches!(
        tz.name(),
        "UTC" | "Etc/UTC" | "Etc/UCT" | "UCT" | "Universal" | "Etc/Universal" | "Zulu"
            | "Etc/Zulu" | "GMT" | "Etc/GMT" | "Etc/GMT0" | "Etc/GMT+0" | "Etc/GMT-0"
            | "Etc/Greenwich" | "Greenwich" | "GMT0" | "GMT+0" | "GMT-0"
    )
}

/// First and last instant rendered in each non-UTC zone.
#[derive(Default)]
struct ZoneSpans {
    spans: BTreeMap<&'static str, (Tz, DateTime<Utc>, DateTime<Utc>)>,
}

impl ZoneSpans {
    fn record(&mut self, event: &CalendarEvent) {
        for time in std::iter::once(&event.start).chain(event.end.as_ref()) {
            let EventTime::DateTime(dt) = time else {
                continue;
            };
            let tz = dt.timezone();
            if is_utc(&tz) {
                continue;
            }
            let instant = dt.with_timezone(&Utc);
            self.spans
                .entry(tz.name())
                .and_modify(|(_, first, last)| {
                    *first = (*first).min(instant);
                    *last = (*last).max(instant);
                })
                .or_insert((tz, instant, instant));
        }
    }
}

fn utc_offset(tz: Tz, at: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc()
}

/// Finds the instants in `[from, to]` at which the zone's UTC offset changes.
///
/// The range is sampled daily and each change is narrowed to the second.
fn offset_transitions(tz: Tz, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut transitions = Vec::new();
    let mut cursor = from;
    let mut offset = utc_offset(tz, cursor);
    while cursor < to {
        let next = (cursor + Duration::days(1)).min(to);
        let next_offset = utc_offset(tz, next);
        if next_offset != offset {
            let (mut lo, mut hi) = (cursor, next);
            while hi - lo > Duration::seconds(1) {
                let mid = lo + (hi - lo) / 2;
                if utc_offset(tz, mid) == offset {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            transitions.push(hi);
            offset = next_offset;
        }
        cursor = next;
    }
    transitions
}

/// Writes a `VTIMEZONE` covering the rendered span with a year of margin.
fn vtimezone(tz: Tz, first: DateTime<Utc>, last: DateTime<Utc>) -> String {
    let from = first - Duration::days(366);
    let to = last + Duration::days(366);

    let mut out = String::new();
    out.push_str("BEGIN:VTIMEZONE\r\n");
    out.push_str(&content_line("TZID", tz.name()));
    out.push_str("\r\n");

    let initial = utc_offset(tz, from);
    out.push_str(&observance(tz, from, initial, initial));
    let mut previous = initial;
    for at in offset_transitions(tz, from, to) {
        let current = utc_offset(tz, at);
        out.push_str(&observance(tz, at, previous, current));
        previous = current;
    }

    out.push_str("END:VTIMEZONE\r\n");
    out
}

fn observance(tz: Tz, at: DateTime<Utc>, from_offset: i32, to_offset: i32) -> String {
    let offset = tz.offset_from_utc_datetime(&at.naive_utc());
    let kind = if offset.dst_offset().is_zero() {
        "STANDARD"
    } else {
        "DAYLIGHT"
    };
    // DTSTART is local time as observed before the change.
    let local = at.naive_utc() + Duration::seconds(i64::from(from_offset));
    format!(
        "BEGIN:{kind}\r\nDTSTART:{}\r\nTZOFFSETFROM:{}\r\nTZOFFSETTO:{}\r\nEND:{kind}\r\n",
        local.format(LOCAL_FORMAT),
        format_offset(from_offset),
        format_offset(to_offset),
    )
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (hours, minutes, secs) = (abs / 3600, (abs % 3600) / 60, abs % 60);
    if secs == 0 {
        format!("{sign}{hours:02}{minutes:02}")
    } else {
        format!("{sign}{hours:02}{minutes:02}{secs:02}")
    }
}

/// Replaces the crate's calendar-level lines with ours and inserts the
/// timezone blocks ahead of the first component.
fn assemble(rendered: &str, header: &[String], timezones: &[String]) -> String {
    let mut out = String::with_capacity(rendered.len() + 512);
    let mut depth = 0usize;
    let mut timezones_written = timezones.is_empty();

    for line in rendered.lines() {
        if let Some(component) = line.strip_prefix("BEGIN:") {
            if component == "VCALENDAR" {
                out.push_str("BEGIN:VCALENDAR\r\n");
                for header_line in header {
                    out.push_str(header_line);
                    out.push_str("\r\n");
                }
                depth = 1;
                continue;
            }
            if depth == 1 && !timezones_written {
                timezones.iter().for_each(|block| out.push_str(block));
                timezones_written = true;
            }
            depth += 1;
        } else if line == "END:VCALENDAR" {
            if !timezones_written {
                timezones.iter().for_each(|block| out.push_str(block));
                timezones_written = true;
            }
            depth = 0;
        } else if line.starts_with("END:") {
            depth = depth.saturating_sub(1);
        } else if depth == 1 && is_calendar_header(line) {
            continue;
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

fn is_calendar_header(line: &str) -> bool {
    ["VERSION", "PRODID", "CALSCALE", "METHOD"]
        .iter()
        .any(|name| line.starts_with(name) && line[name.len()..].starts_with([':', ';']))
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Joins name and value and folds the line at 75 octets.
fn content_line(name: &str, value: &str) -> String {
    let line = format!("{name}:{value}");
    if line.len() <= FOLD_OCTETS {
        return line;
    }

    let mut out = String::with_capacity(line.len() + line.len() / FOLD_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > FOLD_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out
}
