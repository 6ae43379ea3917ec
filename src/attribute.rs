//! User-defined, typed attribute definitions.
//!
//! Every category in a collection carries its own attribute set (a coin
//! category might define `mint`, `year`, `grade`; a record category `genre`,
//! `label`, `rpm`). Items store attribute values in a free-form bag, and the
//! definitions here give those values their declared [`AttributeKind`].

use std::{fmt, fs::File, io::BufReader, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use heck::ToSnakeCase;
use log::debug;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{display_value, is_blank, parse_decimal, parse_naive_date};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    #[default]
    Text,
    Number,
    Select,
    Checkbox,
    Date,
    Tags,
    /// Any type name this build does not know. Filters on it always pass.
    #[serde(other)]
    Unknown,
}

impl AttributeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Text => "text",
            AttributeKind::Number => "number",
            AttributeKind::Select => "select",
            AttributeKind::Checkbox => "checkbox",
            AttributeKind::Date => "date",
            AttributeKind::Tags => "tags",
            AttributeKind::Unknown => "unknown",
        }
    }

    /// Converts an import cell into the shape stored in an item's attribute bag.
    ///
    /// Blank cells yield `None`. Cells that cannot be read as the declared
    /// kind are errors so the importer can report them per row.
    pub fn coerce(&self, raw: &Value) -> Result<Option<Value>> {
        if is_blank(raw) {
            return Ok(None);
        }
        let coerced = match self {
            AttributeKind::Number => match raw {
                Value::Number(_) => raw.clone(),
                other => {
                    let text = display_value(other);
                    let amount = parse_decimal(&text)?;
                    match amount.fract().is_zero().then(|| amount.to_i64()).flatten() {
                        Some(whole) => Value::from(whole),
                        None => amount
                            .to_f64()
                            .and_then(serde_json::Number::from_f64)
                            .map(Value::Number)
                            .ok_or_else(|| anyhow!("'{text}' is not a finite number"))?,
                    }
                }
            },
            AttributeKind::Checkbox => Value::Bool(parse_checkbox(raw)?),
            AttributeKind::Date => {
                let text = display_value(raw);
                let date = parse_naive_date(&text)?;
                Value::String(date.format("%Y-%m-%d").to_string())
            }
            AttributeKind::Tags => {
                let tags = match raw {
                    Value::Array(values) => values
                        .iter()
                        .map(display_value)
                        .map(|tag| tag.trim().to_string())
                        .filter(|tag| !tag.is_empty())
                        .collect::<Vec<_>>(),
                    other => split_tags(&display_value(other)),
                };
                if tags.is_empty() {
                    return Ok(None);
                }
                Value::Array(tags.into_iter().map(Value::String).collect())
            }
            AttributeKind::Text | AttributeKind::Select | AttributeKind::Unknown => {
                Value::String(display_value(raw).trim().to_string())
            }
        };
        Ok(Some(coerced))
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn tag_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[,;|]").expect("valid tag separator regex"))
}

pub fn split_tags(raw: &str) -> Vec<String> {
    tag_separator()
        .split(raw)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn checkbox_token(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "ja" | "j" | "x" | "1" => Some(true),
        "false" | "no" | "n" | "nein" | "0" => Some(false),
        _ => None,
    }
}

fn parse_checkbox(raw: &Value) -> Result<bool> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        other => {
            let text = display_value(other);
            checkbox_token(&text).ok_or_else(|| anyhow!("Failed to parse '{text}' as checkbox"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub kind: AttributeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            kind,
            min: None,
            max: None,
            unit: None,
            choices: Vec::new(),
            category: None,
        }
    }

    /// Builds a definition for an import column that had no existing match.
    ///
    /// The machine name is the snake_case form of the column; the kind is
    /// inferred from the column's non-blank values.
    pub fn from_column<'a, I>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut candidate = KindCandidate::new();
        for value in values {
            candidate.update(value);
        }
        let kind = candidate.decide();
        debug!("Inferred attribute kind '{kind}' for column '{column}'");
        Self::new(machine_name(column), column.trim(), kind)
    }

    /// Display name, falling back to the machine name.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

pub fn machine_name(column: &str) -> String {
    let name = column.trim().to_snake_case();
    if name.is_empty() {
        "attribute".to_string()
    } else {
        name
    }
}

#[derive(Debug, Clone)]
struct KindCandidate {
    possible_checkbox: bool,
    possible_number: bool,
    possible_date: bool,
    seen: usize,
}

impl KindCandidate {
    fn new() -> Self {
        Self {
            possible_checkbox: true,
            possible_number: true,
            possible_date: true,
            seen: 0,
        }
    }

    fn update(&mut self, value: &Value) {
        if is_blank(value) {
            return;
        }
        self.seen += 1;
        match value {
            Value::Bool(_) => {
                self.possible_number = false;
                self.possible_date = false;
            }
            Value::Number(_) => {
                self.possible_checkbox = false;
                self.possible_date = false;
            }
            Value::String(text) => {
                if self.possible_checkbox && checkbox_token(text).is_none() {
                    self.possible_checkbox = false;
                }
                if self.possible_number && parse_decimal(text).is_err() {
                    self.possible_number = false;
                }
                if self.possible_number && text.chars().any(|c| c.is_alphabetic()) {
                    self.possible_number = false;
                }
                if self.possible_date && parse_naive_date(text).is_err() {
                    self.possible_date = false;
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Null => {
                self.possible_checkbox = false;
                self.possible_number = false;
                self.possible_date = false;
            }
        }
    }

    fn decide(&self) -> AttributeKind {
        if self.seen == 0 {
            AttributeKind::Text
        } else if self.possible_checkbox {
            AttributeKind::Checkbox
        } else if self.possible_date {
            AttributeKind::Date
        } else if self.possible_number {
            AttributeKind::Number
        } else {
            AttributeKind::Text
        }
    }
}

/// The attribute definitions of one collection, persisted as YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

impl AttributeSet {
    pub fn new(attributes: Vec<AttributeDefinition>) -> Self {
        Self { attributes }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening attribute file {path:?}"))?;
        let set: AttributeSet = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing attribute YAML {path:?}"))?;
        set.validate()?;
        Ok(set)
    }

    /// Loads the set at `path`, or an empty set when the file does not exist yet.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating attribute file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing attribute YAML")
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for definition in &self.attributes {
            if definition.name.trim().is_empty() {
                bail!("Attribute definitions must have a non-empty name");
            }
            if !seen.insert(definition.name.as_str()) {
                bail!("Duplicate attribute definition '{}'", definition.name);
            }
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|definition| definition.name == name)
    }

    /// Appends definitions whose machine name is not present yet. Returns how
    /// many were added.
    pub fn merge<I>(&mut self, definitions: I) -> usize
    where
        I: IntoIterator<Item = AttributeDefinition>,
    {
        let mut added = 0usize;
        for definition in definitions {
            if self.get(&definition.name).is_none() {
                self.attributes.push(definition);
                added += 1;
            }
        }
        added
    }
}
