//! Builds the query predicate for a view.

use chrono::{DateTime, SecondsFormat, Utc};
use notioncal_core::{DateWindow, ViewConfig};
use serde_json::{Map, Value, json};

/// Builds the predicate sent with every page query of `view`.
///
/// Date bounds from the window become `on_or_after` / `on_or_before`
/// clauses on the view's date property. A custom filter object adds one
/// clause, a custom list adds each of its elements. A single clause is sent
/// as-is, several are joined with `and`, none means no filter.
pub fn build_filter(view: &ViewConfig, window: &DateWindow) -> Option<Value> {
    let mut clauses = Vec::new();

    if let Some(start) = window.start {
        clauses.push(date_clause(&view.date_property, "on_or_after", start));
    }
    if let Some(end) = window.end {
        clauses.push(date_clause(&view.date_property, "on_or_before", end));
    }

    match &view.filter {
        Some(Value::Array(items)) => clauses.extend(items.iter().cloned()),
        Some(Value::Null) | None => {}
        Some(other) => clauses.push(other.clone()),
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "and": clauses })),
    }
}

fn date_clause(property: &str, operator: &str, at: DateTime<Utc>) -> Value {
    let mut condition = Map::new();
    condition.insert(
        operator.to_string(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    json!({ "property": property, "date": condition })
}
