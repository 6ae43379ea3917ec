//! The import pipeline.
//!
//! An import runs as a sequence of explicit stages, each taking the previous
//! stage's output:
//!
//! 1. [`ImportSource::read`] checks the extension and size limits and decodes
//!    the file.
//! 2. [`ImportSession::parse`] parses records and enforces the row limit.
//! 3. [`ImportSession::propose`] suggests column mappings.
//! 4. [`MappingPlan::new`] validates the (possibly user-edited) mappings.
//! 5. [`ImportSession::execute`] converts rows into items and auto-creates
//!    attribute definitions. It has no side effects.
//! 6. An [`ItemSink`] persists the outcome.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    attribute::{AttributeDefinition, AttributeKind, AttributeSet, machine_name},
    data::{display_value, is_blank, parse_decimal, parse_naive_date},
    error::ImportError,
    io_utils,
    item::{Collection, Item, ItemStatus},
    mapping::{BuiltinField, ColumnMapping, MappingPlan, MappingTarget, propose_mapping},
    parser::{self, ImportFormat, Record},
};

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ROWS: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_bytes: u64,
    pub max_rows: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// Raw text of an import file that passed the extension and size checks.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub name: String,
    pub format: ImportFormat,
    pub content: String,
}

impl ImportSource {
    pub fn read(path: &Path, limits: &ImportLimits, encoding: &'static Encoding) -> Result<Self> {
        let format = ImportFormat::from_path(path).ok_or_else(|| ImportError::UnsupportedExtension {
            extension: path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or_default()
                .to_string(),
        })?;
        let size = io_utils::file_size(path)?;
        if size > limits.max_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                limit: limits.max_bytes,
            }
            .into());
        }
        let content = io_utils::read_text(path, encoding)?;
        debug!("Read {size} byte(s) of {} from {path:?}", format.as_str());
        Ok(Self {
            name: path.display().to_string(),
            format,
            content,
        })
    }

    pub fn from_text(name: impl Into<String>, format: ImportFormat, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format,
            content: content.into(),
        }
    }
}

/// Parsed rows of one import, carried through mapping and execution.
#[derive(Debug, Clone)]
pub struct ImportSession {
    source_name: String,
    format: ImportFormat,
    columns: Vec<String>,
    records: Vec<Record>,
}

impl ImportSession {
    pub fn parse(source: ImportSource, limits: &ImportLimits) -> Result<Self, ImportError> {
        let records = parser::parse_content(&source.content, source.format);
        if records.is_empty() {
            return Err(ImportError::NoRows {
                source_name: source.name,
            });
        }
        if records.len() > limits.max_rows {
            return Err(ImportError::TooManyRows {
                rows: records.len(),
                limit: limits.max_rows,
            });
        }
        let columns = match source.format {
            ImportFormat::Csv => parser::parse_header(&source.content),
            ImportFormat::Json => parser::source_columns(&records),
        };
        info!(
            "Parsed {} row(s) with {} column(s) from {}",
            records.len(),
            columns.len(),
            source.name
        );
        Ok(Self {
            source_name: source.name,
            format: source.format,
            columns,
            records,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn format(&self) -> ImportFormat {
        self.format
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn propose(&self, attributes: &[AttributeDefinition]) -> Vec<ColumnMapping> {
        propose_mapping(&self.columns, attributes)
    }

    fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().filter_map(move |record| record.get(column))
    }

    /// Converts every row into an item according to `plan`.
    pub fn execute(
        &self,
        plan: &MappingPlan,
        attributes: &[AttributeDefinition],
    ) -> Result<ImportOutcome, ImportError> {
        let mut new_attributes: Vec<AttributeDefinition> = Vec::new();
        let mut targets = Vec::new();

        for mapping in plan.active() {
            let target = match &mapping.target {
                MappingTarget::Ignore => continue,
                MappingTarget::Field(field) => ResolvedTarget::Field(*field),
                MappingTarget::Attribute(name) => {
                    let definition = attributes
                        .iter()
                        .chain(new_attributes.iter())
                        .find(|d| &d.name == name)
                        .ok_or_else(|| ImportError::UnknownAttribute {
                            column: mapping.source.clone(),
                            attribute: name.clone(),
                        })?;
                    ResolvedTarget::Attribute(definition.name.clone(), definition.kind)
                }
                MappingTarget::NewAttribute => {
                    let name = machine_name(&mapping.source);
                    let existing = attributes
                        .iter()
                        .chain(new_attributes.iter())
                        .find(|d| d.name == name)
                        .map(|d| d.kind);
                    let kind = match existing {
                        Some(kind) => kind,
                        None => {
                            let definition = AttributeDefinition::from_column(
                                &mapping.source,
                                self.column_values(&mapping.source),
                            );
                            info!(
                                "Creating attribute '{}' ({}) from column '{}'",
                                definition.name, definition.kind, mapping.source
                            );
                            let kind = definition.kind;
                            new_attributes.push(definition);
                            kind
                        }
                    };
                    ResolvedTarget::Attribute(name, kind)
                }
            };
            targets.push((mapping.source.as_str(), target));
        }

        let mut outcome = ImportOutcome {
            new_attributes,
            ..ImportOutcome::default()
        };
        for (idx, record) in self.records.iter().enumerate() {
            let row = idx + 1;
            let mut item = Item::new(String::new());
            for (source, target) in &targets {
                let Some(raw) = record.get(*source).filter(|value| !is_blank(value)) else {
                    continue;
                };
                let applied = match target {
                    ResolvedTarget::Field(field) => apply_field(&mut item, *field, raw),
                    ResolvedTarget::Attribute(name, kind) => kind.coerce(raw).map(|value| {
                        if let Some(value) = value {
                            item.attributes.insert(name.clone(), value);
                        }
                    }),
                };
                if let Err(err) = applied {
                    outcome.warnings.push(RowIssue {
                        row,
                        message: format!("Column '{source}': {err}"),
                    });
                }
            }
            if item.name.trim().is_empty() {
                outcome.skipped.push(RowIssue {
                    row,
                    message: "Missing name".to_string(),
                });
                continue;
            }
            outcome.items.push(item);
        }

        if !outcome.skipped.is_empty() {
            warn!(
                "Skipped {} row(s) without a name in {}",
                outcome.skipped.len(),
                self.source_name
            );
        }
        for issue in &outcome.warnings {
            warn!("Row {}: {}", issue.row, issue.message);
        }
        Ok(outcome)
    }
}

enum ResolvedTarget {
    Field(BuiltinField),
    Attribute(String, AttributeKind),
}

fn non_empty(raw: &Value) -> Option<String> {
    let text = display_value(raw).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn apply_field(item: &mut Item, field: BuiltinField, raw: &Value) -> Result<()> {
    match field {
        BuiltinField::Name => item.name = non_empty(raw).unwrap_or_default(),
        BuiltinField::Description => item.description = non_empty(raw),
        BuiltinField::Barcode => item.barcode = non_empty(raw),
        BuiltinField::Notes => item.notes = non_empty(raw),
        BuiltinField::PurchaseLocation => item.purchase_location = non_empty(raw),
        BuiltinField::PurchasePrice => {
            item.purchase_price = Some(parse_decimal(&display_value(raw))?);
        }
        BuiltinField::CurrentValue => {
            item.current_value = Some(parse_decimal(&display_value(raw))?);
        }
        BuiltinField::PurchaseDate => {
            item.purchase_date = Some(parse_naive_date(&display_value(raw))?);
        }
        BuiltinField::Status => {
            let text = display_value(raw);
            match ItemStatus::parse_lenient(&text) {
                Some(status) => item.status = status,
                None => anyhow::bail!("Unknown status '{text}', keeping '{}'", item.status),
            }
        }
    }
    Ok(())
}

/// A row-level note produced while importing. Rows are 1-based data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub items: Vec<Item>,
    pub new_attributes: Vec<AttributeDefinition>,
    /// Rows that produced no item.
    pub skipped: Vec<RowIssue>,
    /// Cells that could not be converted; the item was still imported.
    pub warnings: Vec<RowIssue>,
}

/// Destination of a finished import. This is the pipeline's only side effect.
pub trait ItemSink {
    fn persist(&mut self, outcome: &ImportOutcome) -> Result<()>;
}

/// Appends items to a local collection file and merges new attribute
/// definitions into an attribute YAML file.
#[derive(Debug, Clone)]
pub struct CollectionFileSink {
    collection: PathBuf,
    attributes: Option<PathBuf>,
    category: Option<String>,
}

impl CollectionFileSink {
    pub fn new(collection: impl Into<PathBuf>, attributes: Option<PathBuf>) -> Self {
        Self {
            collection: collection.into(),
            attributes,
            category: None,
        }
    }

    /// Tags every imported item (and created attribute) with `category`.
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }
}

impl ItemSink for CollectionFileSink {
    fn persist(&mut self, outcome: &ImportOutcome) -> Result<()> {
        let mut collection = Collection::load_or_new(&self.collection)?;
        let before = collection.items.len();
        collection.items.extend(outcome.items.iter().cloned().map(|mut item| {
            if item.category.is_none() {
                item.category = self.category.clone();
            }
            item
        }));
        collection
            .save(&self.collection)
            .with_context(|| format!("Saving collection {:?}", self.collection))?;
        info!(
            "Collection {:?} now holds {} item(s) ({} imported)",
            self.collection,
            collection.items.len(),
            collection.items.len() - before
        );

        if outcome.new_attributes.is_empty() {
            return Ok(());
        }
        let Some(path) = &self.attributes else {
            warn!(
                "{} new attribute(s) were created but no attribute file was given; they are not saved",
                outcome.new_attributes.len()
            );
            return Ok(());
        };
        let mut set = AttributeSet::load_or_default(Some(path))?;
        let added = set.merge(outcome.new_attributes.iter().cloned().map(|mut definition| {
            if definition.category.is_none() {
                definition.category = self.category.clone();
            }
            definition
        }));
        set.save(path)
            .with_context(|| format!("Saving attribute definitions {path:?}"))?;
        info!("Added {added} attribute definition(s) to {path:?}");
        Ok(())
    }
}
