//! Coercion helpers for the JSON-like values that flow through imports,
//! attribute bags, and filter criteria.
//!
//! Attribute bags are free-form, so the same attribute can hold `"12"`, `12`,
//! or `12.0` depending on where the item came from. The helpers here give the
//! filter evaluator and the import pipeline one consistent reading of those
//! values.

use std::{str::FromStr, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

/// Loose truthiness as used by checkbox criteria.
///
/// `null`, `false`, `0`, `NaN`, and the empty string are falsy. Everything
/// else, including empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// True for values a criterion or import cell treats as "not set".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// True for criteria that are not set at all: `null` or the empty string.
/// Unlike [`is_blank`], whitespace counts as a value.
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Numeric reading of a value.
///
/// Strings are trimmed and parsed; blank strings, `null`, arrays, and objects
/// have no numeric reading. Booleans read as `1`/`0`.
pub fn to_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// String form used for substring matching, table cells, and CSV export.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(values) => values
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

fn money_pattern() -> &'static Regex {
    static MONEY: OnceLock<Regex> = OnceLock::new();
    MONEY.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:[€$£¥]|eur|usd|gbp|chf)?\s*(-?[0-9][0-9.,]*)\s*(?:[€$£¥]|eur|usd|gbp|chf)?$",
        )
        .expect("valid money regex")
    })
}

/// Parses a price the way collectors type them: `12.50`, `12,50`, `€ 1.234,56`,
/// `$1,234.56`, `12 EUR`.
///
/// Only a single leading or trailing currency symbol or code is accepted
/// around the digits; any other text is an error.
///
/// When both separators appear, the one that comes last is the decimal mark.
/// A lone comma is always a decimal mark.
pub fn parse_decimal(value: &str) -> Result<Decimal> {
    let cleaned = money_pattern()
        .captures(value.trim())
        .and_then(|captures| captures.get(1))
        .map(|amount| amount.as_str())
        .ok_or_else(|| anyhow!("Failed to parse '{value}' as amount"))?;
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned.to_string(),
    };
    Decimal::from_str(&normalized).with_context(|| format!("Failed to parse '{value}' as amount"))
}
