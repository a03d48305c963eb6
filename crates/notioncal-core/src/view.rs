//! Calendar view configuration.
//!
//! A view is one named calendar feed backed by one Notion database. Views
//! are validated once at startup and shared read-only by every request.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, ViewNotFound};

/// Property used for event titles when a view does not name one.
pub const DEFAULT_TITLE_PROPERTY: &str = "Name";

/// How far a view reaches into the past or future, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaySpan {
    /// A bounded number of days.
    Days(u32),
    /// No bound on this side.
    #[default]
    Unbounded,
}

impl DaySpan {
    /// Returns the number of days, or `None` when unbounded.
    pub fn days(&self) -> Option<u32> {
        match self {
            Self::Days(days) => Some(*days),
            Self::Unbounded => None,
        }
    }

    /// Returns `true` if this side of the window is open.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

/// A lookback/lookahead value as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawDaySpan {
    Days(i64),
    Keyword(String),
    Other(serde::de::IgnoredAny),
}

impl RawDaySpan {
    fn resolve(&self, view: &str, field: &'static str) -> Result<DaySpan, ConfigError> {
        let invalid = || ConfigError::InvalidDaySpan {
            view: view.to_string(),
            field,
        };
        match self {
            Self::Days(days) => u32::try_from(*days).map(DaySpan::Days).map_err(|_| invalid()),
            Self::Keyword(word) if word.trim().eq_ignore_ascii_case("unbounded") => {
                Ok(DaySpan::Unbounded)
            }
            Self::Keyword(_) | Self::Other(_) => Err(invalid()),
        }
    }
}

/// One `[calendar_views.<name>]` table, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ViewSettings {
    database_id: Option<String>,
    date_property: Option<String>,
    title_property: Option<String>,
    title_prefix: Option<String>,
    default_title: Option<String>,
    description_property: Option<String>,
    location_property: Option<String>,
    url_property: Option<String>,
    query_days_back: Option<RawDaySpan>,
    query_days_forward: Option<RawDaySpan>,
    timezone: Option<String>,
    filters: Option<Value>,
    calendar_name: Option<String>,
    calendar_description: Option<String>,
}

/// A validated calendar view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// The name the feed is served under.
    pub name: String,
    /// Notion database the records come from.
    pub database_id: String,
    /// Date property that positions records on the calendar.
    pub date_property: String,
    /// Property read for the event title.
    pub title_property: String,
    /// Text prepended to every title.
    pub title_prefix: Option<String>,
    /// Title used when a record has none; records are skipped when unset.
    pub default_title: Option<String>,
    pub description_property: Option<String>,
    pub location_property: Option<String>,
    pub url_property: Option<String>,
    /// Days before "now" to include.
    pub lookback: DaySpan,
    /// Days after "now" to include.
    pub lookahead: DaySpan,
    /// Timezone events are resolved into.
    pub timezone: Tz,
    /// Extra Notion filter, passed through untouched.
    pub filter: Option<Value>,
    pub calendar_name: Option<String>,
    pub calendar_description: Option<String>,
}

impl ViewConfig {
    /// Creates a view with defaults for everything but the required fields.
    pub fn new(
        name: impl Into<String>,
        database_id: impl Into<String>,
        date_property: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            database_id: database_id.into(),
            date_property: date_property.into(),
            title_property: DEFAULT_TITLE_PROPERTY.to_string(),
            title_prefix: None,
            default_title: None,
            description_property: None,
            location_property: None,
            url_property: None,
            lookback: DaySpan::Unbounded,
            lookahead: DaySpan::Unbounded,
            timezone: Tz::UTC,
            filter: None,
            calendar_name: None,
            calendar_description: None,
        }
    }

    pub(crate) fn from_settings(name: &str, settings: ViewSettings) -> Result<Self, ConfigError> {
        let required = |value: Option<String>, field: &'static str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingField {
                    view: name.to_string(),
                    field,
                })
        };

        let database_id = required(settings.database_id, "database_id")?;
        let date_property = required(settings.date_property, "date_property")?;

        let title_property = match settings.title_property {
            Some(title) if title.trim().is_empty() => {
                return Err(ConfigError::invalid(
                    format!("{name}.title_property"),
                    "must not be empty",
                ));
            }
            Some(title) => title,
            None => DEFAULT_TITLE_PROPERTY.to_string(),
        };

        let lookback = settings
            .query_days_back
            .map(|raw| raw.resolve(name, "query_days_back"))
            .transpose()?
            .unwrap_or_default();
        let lookahead = settings
            .query_days_forward
            .map(|raw| raw.resolve(name, "query_days_forward"))
            .transpose()?
            .unwrap_or_default();

        let timezone = match settings.timezone {
            Some(tz) => tz
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownTimezone {
                    view: name.to_string(),
                    timezone: tz.clone(),
                })?,
            None => Tz::UTC,
        };

        Ok(Self {
            name: name.to_string(),
            database_id,
            date_property,
            title_property,
            title_prefix: non_empty(settings.title_prefix),
            default_title: non_empty(settings.default_title),
            description_property: non_empty(settings.description_property),
            location_property: non_empty(settings.location_property),
            url_property: non_empty(settings.url_property),
            lookback,
            lookahead,
            timezone,
            filter: settings.filters.filter(|f| !f.is_null()),
            calendar_name: non_empty(settings.calendar_name),
            calendar_description: non_empty(settings.calendar_description),
        })
    }

    /// Name shown to calendar clients.
    pub fn display_name(&self) -> &str {
        self.calendar_name.as_deref().unwrap_or(&self.name)
    }

    /// Builder method to set the title property.
    pub fn with_title_property(mut self, property: impl Into<String>) -> Self {
        self.title_property = property.into();
        self
    }

    /// Builder method to set the title prefix.
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = Some(prefix.into());
        self
    }

    /// Builder method to set the fallback title.
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = Some(title.into());
        self
    }

    /// Builder method to set the description property.
    pub fn with_description_property(mut self, property: impl Into<String>) -> Self {
        self.description_property = Some(property.into());
        self
    }

    /// Builder method to set the location property.
    pub fn with_location_property(mut self, property: impl Into<String>) -> Self {
        self.location_property = Some(property.into());
        self
    }

    /// Builder method to set the URL property.
    pub fn with_url_property(mut self, property: impl Into<String>) -> Self {
        self.url_property = Some(property.into());
        self
    }

    /// Builder method to set the lookback and lookahead bounds.
    pub fn with_window(mut self, lookback: DaySpan, lookahead: DaySpan) -> Self {
        self.lookback = lookback;
        self.lookahead = lookahead;
        self
    }

    /// Builder method to set the timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Builder method to set the custom filter.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The table of configured views, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    views: BTreeMap<String, ViewConfig>,
}

impl ViewRegistry {
    /// Parses a TOML document whose top-level tables are views.
    ///
    /// ```toml
    /// [work]
    /// database_id = "0f3c..."
    /// date_property = "When"
    /// ```
    pub fn load(raw: &str) -> Result<Self, ConfigError> {
        let settings: BTreeMap<String, ViewSettings> = toml::from_str(raw)?;
        Self::from_settings(settings)
    }

    pub(crate) fn from_settings(
        settings: BTreeMap<String, ViewSettings>,
    ) -> Result<Self, ConfigError> {
        let views = settings
            .into_iter()
            .map(|(name, settings)| {
                let view = ViewConfig::from_settings(&name, settings)?;
                Ok((name, view))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;
        Ok(Self { views })
    }

    /// Builds a registry from already-validated views.
    pub fn from_views(views: impl IntoIterator<Item = ViewConfig>) -> Self {
        Self {
            views: views.into_iter().map(|v| (v.name.clone(), v)).collect(),
        }
    }

    /// Looks up a view by name.
    pub fn get(&self, name: &str) -> Result<&ViewConfig, ViewNotFound> {
        self.views.get(name).ok_or_else(|| ViewNotFound::new(name))
    }

    /// Configured view names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
