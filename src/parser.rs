//! Tabular import parser for CSV and JSON uploads.
//!
//! Both parsers are total: malformed input yields an empty record list rather
//! than an error, and the import pipeline decides how to report that.
//!
//! The CSV dialect is deliberately small. The delimiter is detected per line
//! (semicolon when the line contains one, otherwise comma), fields may be
//! wrapped in double quotes, and a doubled quote inside a quoted field is a
//! literal quote.

use std::path::Path;

use log::debug;
use serde_json::{Map, Value};

/// One parsed row, keyed by column name in column order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        if extension.eq_ignore_ascii_case("csv") {
            Some(ImportFormat::Csv)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(ImportFormat::Json)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFormat::Csv => "csv",
            ImportFormat::Json => "json",
        }
    }
}

pub fn parse_content(content: &str, format: ImportFormat) -> Vec<Record> {
    match format {
        ImportFormat::Csv => parse_delimited(content),
        ImportFormat::Json => parse_json(content),
    }
}

/// Delimiter used for a single line.
pub fn detect_delimiter(line: &str) -> char {
    if line.contains(';') { ';' } else { ',' }
}

/// Splits one line into raw (untrimmed) fields, honouring double quotes.
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> {
    content.split('\n').filter(|line| !line.trim().is_empty())
}

fn split_trimmed(line: &str) -> Vec<String> {
    split_line(line, detect_delimiter(line))
        .into_iter()
        .map(|field| field.trim().to_string())
        .collect()
}

/// Header columns of a delimited file, in file order.
pub fn parse_header(content: &str) -> Vec<String> {
    non_blank_lines(content)
        .next()
        .map(split_trimmed)
        .unwrap_or_default()
}

pub fn parse_delimited(content: &str) -> Vec<Record> {
    let mut lines = non_blank_lines(content);
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers = split_trimmed(header_line);

    let records = lines
        .map(|line| {
            let fields = split_trimmed(line);
            let mut record = Record::new();
            for (idx, header) in headers.iter().enumerate() {
                let value = fields.get(idx).cloned().unwrap_or_default();
                record.insert(header.clone(), Value::String(value));
            }
            record
        })
        .collect::<Vec<_>>();
    debug!(
        "Parsed {} delimited row(s) across {} column(s)",
        records.len(),
        headers.len()
    );
    records
}

pub fn parse_json(content: &str) -> Vec<Record> {
    let parsed: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(err) => {
            debug!("Ignoring unparseable JSON import: {err}");
            return Vec::new();
        }
    };
    match parsed {
        Value::Array(values) => {
            let total = values.len();
            let records = values
                .into_iter()
                .filter_map(|value| match value {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if records.len() < total {
                debug!(
                    "Skipped {} JSON array element(s) that are not objects",
                    total - records.len()
                );
            }
            records
        }
        Value::Object(map) => vec![map],
        other => {
            debug!("Ignoring JSON import whose top-level value is {other}");
            Vec::new()
        }
    }
}

/// Distinct column names across `records`, in first-seen order.
pub fn source_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|existing| existing == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}
