//! Collection export to CSV and JSON.
//!
//! CSV exports use built-in field names plus one column per attribute
//! definition (headed by its display name), so an exported file maps straight
//! back onto the same fields when re-imported.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use clap::ValueEnum;
use encoding_rs::Encoding;
use log::info;

use crate::{
    attribute::AttributeDefinition, data::display_value, io_utils, item::Item,
    mapping::BuiltinField,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

pub fn export_headers(definitions: &[AttributeDefinition]) -> Vec<String> {
    BuiltinField::ALL
        .iter()
        .map(|field| field.as_str().to_string())
        .chain(definitions.iter().map(|d| d.label().to_string()))
        .collect()
}

pub fn export_row(item: &Item, definitions: &[AttributeDefinition]) -> Vec<String> {
    BuiltinField::ALL
        .iter()
        .map(|field| item.field_display(*field))
        .chain(definitions.iter().map(|d| {
            item.attributes
                .get(&d.name)
                .map(display_value)
                .unwrap_or_default()
        }))
        .collect()
}

pub fn write_csv<W: Write>(
    writer: &mut csv::Writer<W>,
    items: &[&Item],
    definitions: &[AttributeDefinition],
) -> Result<()> {
    writer
        .write_record(export_headers(definitions))
        .context("Writing export headers")?;
    for (idx, item) in items.iter().enumerate() {
        writer
            .write_record(export_row(item, definitions))
            .with_context(|| format!("Writing export row {}", idx + 1))?;
    }
    writer.flush().context("Flushing export writer")
}

pub fn write_json<W: Write>(mut writer: W, items: &[&Item]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, items).context("Writing export JSON")?;
    writeln!(writer).context("Writing export JSON")?;
    writer.flush().context("Flushing export output")
}

pub fn export_items(
    items: &[&Item],
    definitions: &[AttributeDefinition],
    output: Option<&Path>,
    format: ExportFormat,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            let mut writer = io_utils::open_csv_writer(output, delimiter, encoding)?;
            write_csv(&mut writer, items, definitions)?;
        }
        ExportFormat::Json => {
            let writer = io_utils::open_output(output, encoding)?;
            write_json(writer, items)?;
        }
    }
    let destination = output
        .filter(|path| !io_utils::is_dash(path))
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    info!(
        "Exported {} item(s) as {:?} -> {}",
        items.len(),
        format,
        destination
    );
    Ok(())
}
