//! Column auto-mapping for tabular imports.
//!
//! [`propose_mapping`] guesses a target for every source column so the user
//! only has to correct the misses. Matching is substring based on normalized
//! names (lowercased, with underscores, hyphens, and whitespace removed), which
//! catches both German and English headers such as `Kaufpreis` or
//! `Purchase Price` at the cost of the occasional false positive. The user can
//! always override a proposal, either interactively or through a saved
//! mapping file.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{attribute::AttributeDefinition, error::ImportError};

/// Prefix of a target that references a user-defined attribute.
pub const ATTRIBUTE_PREFIX: &str = "attr:";
/// Target that creates a new attribute from the column.
pub const NEW_ATTRIBUTE: &str = "new_attribute";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinField {
    Name,
    Description,
    PurchasePrice,
    PurchaseDate,
    Barcode,
    Notes,
    Status,
    PurchaseLocation,
    CurrentValue,
}

impl BuiltinField {
    pub const ALL: [BuiltinField; 9] = [
        BuiltinField::Name,
        BuiltinField::Description,
        BuiltinField::Status,
        BuiltinField::PurchasePrice,
        BuiltinField::CurrentValue,
        BuiltinField::PurchaseDate,
        BuiltinField::PurchaseLocation,
        BuiltinField::Barcode,
        BuiltinField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinField::Name => "name",
            BuiltinField::Description => "description",
            BuiltinField::PurchasePrice => "purchase_price",
            BuiltinField::PurchaseDate => "purchase_date",
            BuiltinField::Barcode => "barcode",
            BuiltinField::Notes => "notes",
            BuiltinField::Status => "status",
            BuiltinField::PurchaseLocation => "purchase_location",
            BuiltinField::CurrentValue => "current_value",
        }
    }
}

impl fmt::Display for BuiltinField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinField {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BuiltinField::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| ImportError::UnknownTarget(value.to_string()))
    }
}

/// Keyword groups in priority order. The first group with a keyword contained
/// in the normalized column name wins.
const KEYWORD_GROUPS: &[(BuiltinField, &[&str])] = &[
    (BuiltinField::Name, &["name", "titel", "title", "bezeichnung"]),
    (BuiltinField::Description, &["beschreibung", "description"]),
    (BuiltinField::PurchasePrice, &["preis", "price", "kosten"]),
    (BuiltinField::PurchaseDate, &["datum", "date"]),
    (BuiltinField::Barcode, &["barcode", "ean", "upc"]),
    (BuiltinField::Notes, &["notiz", "note", "kommentar"]),
    (BuiltinField::Status, &["status"]),
    (BuiltinField::PurchaseLocation, &["ort", "location", "gekauft"]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum MappingTarget {
    #[default]
    Ignore,
    Field(BuiltinField),
    Attribute(String),
    NewAttribute,
}

impl MappingTarget {
    pub fn attribute(name: impl Into<String>) -> Self {
        MappingTarget::Attribute(name.into())
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, MappingTarget::Ignore)
    }
}

impl fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingTarget::Ignore => Ok(()),
            MappingTarget::Field(field) => f.write_str(field.as_str()),
            MappingTarget::Attribute(name) => write!(f, "{ATTRIBUTE_PREFIX}{name}"),
            MappingTarget::NewAttribute => f.write_str(NEW_ATTRIBUTE),
        }
    }
}

impl FromStr for MappingTarget {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(MappingTarget::Ignore);
        }
        if trimmed == NEW_ATTRIBUTE {
            return Ok(MappingTarget::NewAttribute);
        }
        if let Some(name) = trimmed.strip_prefix(ATTRIBUTE_PREFIX) {
            let name = name.trim();
            if name.is_empty() {
                return Err(ImportError::UnknownTarget(value.to_string()));
            }
            return Ok(MappingTarget::Attribute(name.to_string()));
        }
        trimmed.parse::<BuiltinField>().map(MappingTarget::Field)
    }
}

impl Serialize for MappingTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MappingTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    #[serde(default)]
    pub target: MappingTarget,
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, target: MappingTarget) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }
}

fn separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[_\-\s]+").expect("valid separator regex"))
}

/// Lowercases and strips underscores, hyphens, and whitespace runs.
pub fn normalize_column(name: &str) -> String {
    separators().replace_all(&name.to_lowercase(), "").into_owned()
}

/// A column named exactly like a built-in field (as in exported files) maps to
/// it; otherwise the keyword groups decide. `current_value` has no keyword
/// group and is only reached by its exact name.
fn match_builtin(normalized: &str) -> Option<BuiltinField> {
    BuiltinField::ALL
        .into_iter()
        .find(|field| normalize_column(field.as_str()) == normalized)
        .or_else(|| {
            KEYWORD_GROUPS
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|keyword| normalized.contains(keyword)))
                .map(|(field, _)| *field)
        })
}

fn names_overlap(column: &str, candidate: &str) -> bool {
    !candidate.is_empty() && (column.contains(candidate) || candidate.contains(column))
}

fn match_attribute<'a>(
    normalized: &str,
    attributes: &'a [AttributeDefinition],
) -> Option<&'a AttributeDefinition> {
    if normalized.is_empty() {
        return None;
    }
    attributes.iter().find(|definition| {
        names_overlap(normalized, &normalize_column(&definition.name))
            || names_overlap(normalized, &normalize_column(&definition.display_name))
    })
}

/// Best-guess target for a single source column.
pub fn propose_target(column: &str, attributes: &[AttributeDefinition]) -> MappingTarget {
    let normalized = normalize_column(column);
    if let Some(field) = match_builtin(&normalized) {
        return MappingTarget::Field(field);
    }
    match match_attribute(&normalized, attributes) {
        Some(definition) => MappingTarget::Attribute(definition.name.clone()),
        None => MappingTarget::Ignore,
    }
}

/// Proposes one mapping per source column, in column order.
pub fn propose_mapping(columns: &[String], attributes: &[AttributeDefinition]) -> Vec<ColumnMapping> {
    let mappings = columns
        .iter()
        .map(|column| ColumnMapping::new(column.clone(), propose_target(column, attributes)))
        .collect::<Vec<_>>();
    debug!(
        "Proposed {} of {} column mapping(s)",
        mappings.iter().filter(|m| !m.target.is_ignored()).count(),
        mappings.len()
    );
    mappings
}

/// A saved set of mapping overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFile {
    #[serde(default)]
    pub mappings: Vec<ColumnMapping>,
}

impl MappingFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing mapping YAML {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating mapping file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing mapping YAML")
    }

    /// Builds overrides from `column=target` expressions.
    pub fn from_overrides(expressions: &[String]) -> Result<Self> {
        let mappings = expressions
            .iter()
            .map(|expression| {
                let (source, target) = expression.rsplit_once('=').ok_or_else(|| {
                    anyhow!("Mapping override '{expression}' must have the form column=target")
                })?;
                let source = source.trim();
                if source.is_empty() {
                    return Err(anyhow!("Mapping override '{expression}' is missing a column"));
                }
                let target = target
                    .parse::<MappingTarget>()
                    .with_context(|| format!("Parsing mapping override '{expression}'"))?;
                Ok(ColumnMapping::new(source, target))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { mappings })
    }

    /// Applies the saved targets over `proposed`, matching by source column.
    /// Columns the file does not mention keep their proposal.
    pub fn apply_to(&self, proposed: &[ColumnMapping]) -> Vec<ColumnMapping> {
        proposed
            .iter()
            .map(|mapping| {
                self.mappings
                    .iter()
                    .rev()
                    .find(|saved| saved.source == mapping.source)
                    .cloned()
                    .unwrap_or_else(|| mapping.clone())
            })
            .collect()
    }
}

/// Two or more columns mapped to the same target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateTarget {
    pub target: MappingTarget,
    pub sources: Vec<String>,
    /// The source whose value ends up on the item.
    pub winner: String,
}

/// Finalized mappings, ready for execution.
///
/// Columns are applied in order, so when several columns share a target the
/// last non-blank one wins. Those collisions are allowed but reported.
#[derive(Debug, Clone)]
pub struct MappingPlan {
    mappings: Vec<ColumnMapping>,
    duplicates: Vec<DuplicateTarget>,
}

impl MappingPlan {
    pub fn new(mappings: Vec<ColumnMapping>) -> Result<Self, ImportError> {
        if !mappings
            .iter()
            .any(|m| m.target == MappingTarget::Field(BuiltinField::Name))
        {
            return Err(ImportError::MissingNameMapping);
        }

        let mut by_target: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for mapping in &mappings {
            if matches!(
                mapping.target,
                MappingTarget::Field(_) | MappingTarget::Attribute(_)
            ) {
                by_target
                    .entry(mapping.target.to_string())
                    .or_default()
                    .push(mapping.source.clone());
            }
        }
        let mut duplicates = Vec::new();
        for (target, sources) in by_target {
            if sources.len() < 2 {
                continue;
            }
            let winner = sources.last().cloned().unwrap_or_default();
            warn!(
                "Columns {} all map to '{target}'; '{winner}' takes precedence",
                sources.iter().map(|s| format!("'{s}'")).join(", ")
            );
            duplicates.push(DuplicateTarget {
                target: target.parse()?,
                sources,
                winner,
            });
        }

        Ok(Self {
            mappings,
            duplicates,
        })
    }

    /// Mappings that import something, in column order.
    pub fn active(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter().filter(|m| !m.target.is_ignored())
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn duplicate_targets(&self) -> &[DuplicateTarget] {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_column_strips_separators() {
        assert_eq!(normalize_column("Purchase_Price"), "purchaseprice");
        assert_eq!(normalize_column("  Kauf - Datum "), "kaufdatum");
        assert_eq!(normalize_column("EAN\tCode"), "eancode");
    }

    #[test]
    fn targets_round_trip_through_strings() {
        for raw in ["", "name", "purchase_location", "attr:grade", "new_attribute"] {
            let target: MappingTarget = raw.parse().unwrap();
            assert_eq!(target.to_string(), raw);
        }
        assert!("attr:".parse::<MappingTarget>().is_err());
        assert!("price".parse::<MappingTarget>().is_err());
    }

    #[test]
    fn builtin_groups_follow_priority_order() {
        // "Preisdatum" contains both "preis" and "datum"; price is tested first.
        assert_eq!(
            propose_target("Preisdatum", &[]),
            MappingTarget::Field(BuiltinField::PurchasePrice)
        );
        assert_eq!(
            propose_target("Kaufort", &[]),
            MappingTarget::Field(BuiltinField::PurchaseLocation)
        );
        assert_eq!(propose_target("Schätzwert", &[]), MappingTarget::Ignore);
        assert_eq!(
            propose_target("Current Value", &[]),
            MappingTarget::Field(BuiltinField::CurrentValue)
        );
        assert_eq!(propose_target("Zustand", &[]), MappingTarget::Ignore);
    }

    #[test]
    fn overrides_replace_matching_proposals() {
        let proposed = propose_mapping(&["Name".to_string(), "Zustand".to_string()], &[]);
        let overrides =
            MappingFile::from_overrides(&["Zustand=attr:grade".to_string()]).unwrap();
        let applied = overrides.apply_to(&proposed);
        assert_eq!(applied[0].target, MappingTarget::Field(BuiltinField::Name));
        assert_eq!(applied[1].target, MappingTarget::attribute("grade"));

        assert!(MappingFile::from_overrides(&["Zustand".to_string()]).is_err());
        assert!(MappingFile::from_overrides(&["Zustand=grade".to_string()]).is_err());
    }

    #[test]
    fn plan_requires_a_name_mapping() {
        let mappings = vec![ColumnMapping::new(
            "Preis",
            MappingTarget::Field(BuiltinField::PurchasePrice),
        )];
        assert_eq!(
            MappingPlan::new(mappings).unwrap_err(),
            ImportError::MissingNameMapping
        );
    }
}
