//! Records as returned by the upstream store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Base of the human-facing link to a record.
pub const NOTION_PAGE_BASE: &str = "https://www.notion.so";

/// A date property value. `start` and `end` are the strings Notion sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DateValue {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl DateValue {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: None,
            time_zone: None,
        }
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }
}

/// One typed property of a record.
///
/// Empty upstream values (`"select": null`) are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Title(String),
    RichText(String),
    Date(Option<DateValue>),
    Url(Option<String>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    Status(Option<String>),
    Checkbox(bool),
    Number(Option<f64>),
    Email(Option<String>),
    PhoneNumber(Option<String>),
    /// A property type this service does not read (formula, relation...).
    Unsupported { kind: String },
}

#[derive(Deserialize)]
struct PlainText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Deserialize)]
struct NamedOption {
    name: String,
}

impl PropertyValue {
    /// Decodes one entry of a page's `properties` object.
    ///
    /// Anything that does not match the expected shape for its declared
    /// type is reported as unsupported rather than failing the whole page.
    pub fn from_json(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let payload = value.get(&kind).cloned().unwrap_or(Value::Null);

        let decoded = match kind.as_str() {
            "title" => join_plain_text(payload).map(Self::Title),
            "rich_text" => join_plain_text(payload).map(Self::RichText),
            "date" => serde_json::from_value(payload).ok().map(Self::Date),
            "url" => serde_json::from_value(payload).ok().map(Self::Url),
            "email" => serde_json::from_value(payload).ok().map(Self::Email),
            "phone_number" => serde_json::from_value(payload).ok().map(Self::PhoneNumber),
            "number" => serde_json::from_value(payload).ok().map(Self::Number),
            "checkbox" => serde_json::from_value(payload).ok().map(Self::Checkbox),
            "select" => option_name(payload).map(Self::Select),
            "status" => option_name(payload).map(Self::Status),
            "multi_select" => serde_json::from_value::<Vec<NamedOption>>(payload)
                .ok()
                .map(|opts| Self::MultiSelect(opts.into_iter().map(|o| o.name).collect())),
            _ => None,
        };

        decoded.unwrap_or(Self::Unsupported { kind })
    }

    /// Renders the value as display text.
    ///
    /// Returns `None` for empty values, dates and unsupported types.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Self::Title(text) | Self::RichText(text) => text.clone(),
            Self::Url(v)
            | Self::Email(v)
            | Self::PhoneNumber(v)
            | Self::Select(v)
            | Self::Status(v) => v.clone()?,
            Self::MultiSelect(names) => names.join(", "),
            Self::Number(n) => n.as_ref()?.to_string(),
            Self::Checkbox(checked) => (if *checked { "Yes" } else { "No" }).to_string(),
            Self::Date(_) | Self::Unsupported { .. } => return None,
        };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Returns the date payload if this is a non-empty date property.
    pub fn as_date(&self) -> Option<&DateValue> {
        match self {
            Self::Date(date) => date.as_ref(),
            _ => None,
        }
    }

    /// The upstream type name.
    pub fn kind(&self) -> &str {
        match self {
            Self::Title(_) => "title",
            Self::RichText(_) => "rich_text",
            Self::Date(_) => "date",
            Self::Url(_) => "url",
            Self::Select(_) => "select",
            Self::MultiSelect(_) => "multi_select",
            Self::Status(_) => "status",
            Self::Checkbox(_) => "checkbox",
            Self::Number(_) => "number",
            Self::Email(_) => "email",
            Self::PhoneNumber(_) => "phone_number",
            Self::Unsupported { kind } => kind,
        }
    }
}

fn join_plain_text(payload: Value) -> Option<String> {
    let parts: Vec<PlainText> = serde_json::from_value(payload).ok()?;
    Some(parts.into_iter().map(|p| p.plain_text).collect())
}

fn option_name(payload: Value) -> Option<Option<String>> {
    serde_json::from_value::<Option<NamedOption>>(payload)
        .ok()
        .map(|opt| opt.map(|o| o.name))
}

/// One page of the database, with its properties decoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub id: String,
    pub created_time: Option<DateTime<Utc>>,
    pub last_edited_time: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub properties: HashMap<String, PropertyValue>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder method to add a property.
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Builder method to set created and last-edited times.
    pub fn with_times(mut self, created: DateTime<Utc>, edited: DateTime<Utc>) -> Self {
        self.created_time = Some(created);
        self.last_edited_time = Some(edited);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Text of the named property, if present and non-empty.
    pub fn text(&self, name: &str) -> Option<String> {
        self.property(name).and_then(PropertyValue::as_text)
    }

    /// The identifier with hyphens removed.
    pub fn compact_id(&self) -> String {
        self.id.replace('-', "")
    }

    /// Builder method to set the page URL reported by Notion.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Link to the record in the Notion web app.
    ///
    /// Uses the page URL Notion returned, else one built from the id.
    pub fn notion_link(&self) -> String {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map_or_else(
                || format!("{NOTION_PAGE_BASE}/{}", self.compact_id()),
                str::to_string,
            )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_title_by_joining_fragments() {
        let value = json!({
            "id": "title",
            "type": "title",
            "title": [{ "plain_text": "Quarterly " }, { "plain_text": "review" }]
        });
        let prop = PropertyValue::from_json(&value);
        assert_eq!(prop, PropertyValue::Title("Quarterly review".into()));
        assert_eq!(prop.as_text().as_deref(), Some("Quarterly review"));
    }

    #[test]
    fn decodes_date_with_time_zone() {
        let value = json!({
            "type": "date",
            "date": { "start": "2024-03-01T09:00:00.000", "end": null, "time_zone": "Europe/Paris" }
        });
        let prop = PropertyValue::from_json(&value);
        let date = prop.as_date().unwrap();
        assert_eq!(date.start, "2024-03-01T09:00:00.000");
        assert!(date.end.is_none());
        assert_eq!(date.time_zone.as_deref(), Some("Europe/Paris"));
        assert!(prop.as_text().is_none());
    }

    #[test]
    fn empty_date_has_no_payload() {
        let prop = PropertyValue::from_json(&json!({ "type": "date", "date": null }));
        assert_eq!(prop, PropertyValue::Date(None));
        assert!(prop.as_date().is_none());
    }

    #[test]
    fn text_rendering_per_type() {
        let cases = [
            (json!({"type": "select", "select": {"name": "High"}}), Some("High")),
            (json!({"type": "select", "select": null}), None),
            (json!({"type": "status", "status": {"name": "Done"}}), Some("Done")),
            (
                json!({"type": "multi_select", "multi_select": [{"name": "a"}, {"name": "b"}]}),
                Some("a, b"),
            ),
            (json!({"type": "checkbox", "checkbox": true}), Some("Yes")),
            (json!({"type": "checkbox", "checkbox": false}), Some("No")),
            (json!({"type": "number", "number": 42}), Some("42")),
            (json!({"type": "number", "number": 2.5}), Some("2.5")),
            (json!({"type": "number", "number": null}), None),
            (json!({"type": "url", "url": "https://x.test"}), Some("https://x.test")),
            (json!({"type": "email", "email": "a@b.test"}), Some("a@b.test")),
            (json!({"type": "phone_number", "phone_number": "+1 555"}), Some("+1 555")),
            (json!({"type": "rich_text", "rich_text": []}), None),
        ];
        for (value, expected) in cases {
            let prop = PropertyValue::from_json(&value);
            assert_eq!(prop.as_text().as_deref(), expected, "for {value}");
        }
    }

    #[test]
    fn unknown_and_malformed_types_are_unsupported() {
        let formula = PropertyValue::from_json(&json!({"type": "formula", "formula": {}}));
        assert_eq!(formula, PropertyValue::Unsupported { kind: "formula".into() });

        let broken = PropertyValue::from_json(&json!({"type": "checkbox", "checkbox": "yes"}));
        assert_eq!(broken.kind(), "checkbox");
        assert!(matches!(broken, PropertyValue::Unsupported { .. }));
    }

    #[test]
    fn record_links() {
        let record = RawRecord::new("1a2b3c4d-0000-1111-2222-333344445555");
        assert_eq!(record.compact_id(), "1a2b3c4d000011112222333344445555");
        assert_eq!(
            record.notion_link(),
            "https://www.notion.so/1a2b3c4d000011112222333344445555"
        );
    }

    #[test]
    fn page_url_is_preferred_link() {
        let record = RawRecord::new("1a2b3c4d-0000-1111-2222-333344445555")
            .with_url("https://www.notion.so/acme/Team-sync-1a2b3c4d000011112222333344445555");
        assert_eq!(
            record.notion_link(),
            "https://www.notion.so/acme/Team-sync-1a2b3c4d000011112222333344445555"
        );

        let blank = RawRecord::new("abcd").with_url("  ");
        assert_eq!(blank.notion_link(), "https://www.notion.so/abcd");
    }
}
