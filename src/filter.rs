//! Attribute filter evaluation.
//!
//! A filter set maps attribute names to criteria whose shape depends on the
//! attribute's declared kind: a plain value, `{min, max}` for number ranges,
//! `{from, to}` for date ranges, or an array for multi-select and tags.
//! Criteria are ANDed together; the tag criterion is an OR over its own tags.
//!
//! Evaluation never fails. Unknown attributes, unknown kinds, and unset
//! (`null` or empty) criteria all pass, so a data-model mismatch shows too
//! many items rather than silently hiding some.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value, json};

use crate::{
    attribute::{AttributeDefinition, AttributeKind},
    data::{display_value, is_blank, is_truthy, is_unset, to_number},
};

/// Active criteria keyed by attribute name.
pub type FilterSet = Map<String, Value>;

pub fn passes_filters(
    attributes: &Map<String, Value>,
    filters: &FilterSet,
    definitions: &[AttributeDefinition],
) -> bool {
    filters.iter().all(|(name, criterion)| {
        let Some(definition) = definitions.iter().find(|d| &d.name == name) else {
            return true;
        };
        if is_unset(criterion) {
            return true;
        }
        matches_criterion(definition.kind, attributes.get(name), criterion)
    })
}

fn matches_criterion(kind: AttributeKind, item: Option<&Value>, criterion: &Value) -> bool {
    match kind {
        AttributeKind::Text => item.is_some_and(|value| {
            is_truthy(value)
                && display_value(value)
                    .to_lowercase()
                    .contains(&display_value(criterion).to_lowercase())
        }),
        AttributeKind::Number => match range_bounds(criterion, "min", "max") {
            Some((min, max)) => number_in_range(item, min, max),
            None => match (item.and_then(to_number), to_number(criterion)) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            },
        },
        AttributeKind::Select => match criterion {
            Value::Array(choices) => {
                choices.is_empty() || item.is_some_and(|value| choices.contains(value))
            }
            scalar => item == Some(scalar),
        },
        AttributeKind::Checkbox => {
            is_truthy(item.unwrap_or(&Value::Null)) == is_truthy(criterion)
        }
        AttributeKind::Date => match range_bounds(criterion, "from", "to") {
            Some((from, to)) => date_in_range(item, from, to),
            None => item
                .and_then(Value::as_str)
                .is_some_and(|value| Some(value) == criterion.as_str()),
        },
        AttributeKind::Tags => {
            let wanted = match criterion {
                Value::Array(tags) => tags.as_slice(),
                scalar => std::slice::from_ref(scalar),
            };
            if wanted.is_empty() {
                return true;
            }
            match item {
                Some(Value::Array(tags)) => wanted.iter().any(|tag| tags.contains(tag)),
                _ => false,
            }
        }
        AttributeKind::Unknown => true,
    }
}

/// Returns the active (non-blank) bounds when `criterion` is a range object.
fn range_bounds<'a>(
    criterion: &'a Value,
    lower: &str,
    upper: &str,
) -> Option<(Option<&'a Value>, Option<&'a Value>)> {
    let object = criterion.as_object()?;
    if !object.contains_key(lower) && !object.contains_key(upper) {
        return None;
    }
    let active = |key: &str| object.get(key).filter(|value| !is_unset(value));
    Some((active(lower), active(upper)))
}

fn number_in_range(item: Option<&Value>, min: Option<&Value>, max: Option<&Value>) -> bool {
    let min = min.and_then(to_number);
    let max = max.and_then(to_number);
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = item.and_then(to_number) else {
        return false;
    };
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

/// ISO-8601 dates order lexically, so bounds compare as strings.
fn date_in_range(item: Option<&Value>, from: Option<&Value>, to: Option<&Value>) -> bool {
    let from = from.map(display_value);
    let to = to.map(display_value);
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(value) = item.filter(|value| !is_blank(value)).map(display_value) else {
        return false;
    };
    from.is_none_or(|from| value >= from) && to.is_none_or(|to| value <= to)
}

/// Parses `attribute=value` expressions into a filter set.
///
/// The value is read as JSON when it parses (`[..]`, `{..}`, numbers,
/// booleans), `a..b` is a range shorthand resolved against the attribute's
/// kind, and anything else is a plain string. Later expressions for the same
/// attribute replace earlier ones.
pub fn parse_criteria(expressions: &[String], definitions: &[AttributeDefinition]) -> Result<FilterSet> {
    let mut filters = FilterSet::new();
    for expression in expressions {
        let (name, value) = parse_criterion(expression, definitions)?;
        filters.insert(name, value);
    }
    Ok(filters)
}

fn parse_criterion(expression: &str, definitions: &[AttributeDefinition]) -> Result<(String, Value)> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }
    let (name, raw) = trimmed
        .split_once('=')
        .ok_or_else(|| anyhow!("Filter '{trimmed}' must have the form attribute=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Filter '{trimmed}' is missing an attribute name"));
    }
    let raw = raw.trim();
    let kind = definitions
        .iter()
        .find(|d| d.name == name)
        .map(|d| d.kind);

    if let Some((lower, upper)) = raw.split_once("..") {
        let keys = match kind {
            Some(AttributeKind::Number) => Some(("min", "max")),
            Some(AttributeKind::Date) => Some(("from", "to")),
            _ => None,
        };
        if let Some((lower_key, upper_key)) = keys {
            let bound = |text: &str| match (kind, text.trim()) {
                (_, "") => Value::String(String::new()),
                (Some(AttributeKind::Number), text) => text
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(text.to_string())),
                (_, text) => Value::String(text.to_string()),
            };
            return Ok((
                name.to_string(),
                json!({ lower_key: bound(lower), upper_key: bound(upper) }),
            ));
        }
    }

    let plain = || Value::String(unquote(raw).to_string());
    let value = match kind {
        Some(AttributeKind::Text) => plain(),
        // Imported select, tag, and date values are stored as strings, so
        // scalars and list entries are compared in string form.
        Some(AttributeKind::Select | AttributeKind::Tags | AttributeKind::Date) => {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(values)) => Value::Array(
                    values
                        .iter()
                        .map(|value| Value::String(display_value(value)))
                        .collect(),
                ),
                Ok(object @ Value::Object(_)) => object,
                _ => plain(),
            }
        }
        _ => serde_json::from_str::<Value>(raw).unwrap_or_else(|_| plain()),
    };
    Ok((name.to_string(), value))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}
