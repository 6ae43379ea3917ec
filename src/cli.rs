use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    export::ExportFormat,
    import::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ROWS},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Catalog, import, and filter hobby collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the first rows of a CSV or JSON import file as parsed
    Preview(PreviewArgs),
    /// Propose a column mapping for an import file
    Map(MapArgs),
    /// Import a CSV or JSON file into a collection
    Import(ImportArgs),
    /// List collection items matching search, status, price, and attribute filters
    Filter(FilterArgs),
    /// Export collection items as CSV or JSON
    Export(ExportArgs),
    /// List attribute definitions
    Attributes(AttributesArgs),
    /// Summarize item counts and totals for a collection
    Summary(SummaryArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Import file (.csv or .json)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Maximum file size in bytes
    #[arg(long = "max-bytes", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,
    /// Maximum number of data rows
    #[arg(long = "max-rows", default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Attribute definitions (YAML) to match columns against
    #[arg(short = 'a', long = "attributes")]
    pub attributes: Option<PathBuf>,
    /// Write the proposed mapping to this YAML file for editing
    #[arg(long = "save")]
    pub save: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Collection file (JSON) to append items to; created when missing
    #[arg(short = 'c', long = "collection")]
    pub collection: PathBuf,
    /// Attribute definitions (YAML); new attributes are merged into it
    #[arg(short = 'a', long = "attributes")]
    pub attributes: Option<PathBuf>,
    /// Mapping overrides (YAML) produced by `map --save`
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Override a single column, e.g. `Zustand=attr:grade` or `Serie=new_attribute`
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
    /// Create attributes for every column that has no proposal
    #[arg(long = "create-attributes")]
    pub create_attributes: bool,
    /// Category assigned to imported items and created attributes
    #[arg(long)]
    pub category: Option<String>,
    /// Report what would be imported without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Collection file (JSON)
    #[arg(short = 'c', long = "collection")]
    pub collection: PathBuf,
    /// Attribute definitions (YAML)
    #[arg(short = 'a', long = "attributes")]
    pub attributes: Option<PathBuf>,
    /// Attribute criteria such as `year=1950..1960`, `genre=["rock","jazz"]`, or `signed=true`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Case-insensitive text search over name, description, notes, and barcode
    #[arg(short = 's', long)]
    pub search: Option<String>,
    /// Only items with this status
    #[arg(long)]
    pub status: Option<String>,
    /// Minimum purchase price
    #[arg(long = "min-price")]
    pub min_price: Option<String>,
    /// Maximum purchase price
    #[arg(long = "max-price")]
    pub max_price: Option<String>,
    /// Sort directives of the form `field[:asc|desc]` (name, price, value, date, created, attr:<name>)
    #[arg(long = "sort", action = clap::ArgAction::Append)]
    pub sort: Vec<String>,
    /// Limit number of rows shown
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Collection file (JSON)
    #[arg(short = 'c', long = "collection")]
    pub collection: PathBuf,
    /// Attribute definitions (YAML) that become extra CSV columns
    #[arg(short = 'a', long = "attributes")]
    pub attributes: Option<PathBuf>,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// CSV delimiter character (supports ';', ',', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for the output (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Export only items in this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Debug, Args)]
pub struct AttributesArgs {
    /// Attribute definitions (YAML)
    #[arg(short = 'a', long = "attributes")]
    pub attributes: PathBuf,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Collection file (JSON)
    #[arg(short = 'c', long = "collection")]
    pub collection: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
