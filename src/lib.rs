pub mod attribute;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod filter;
pub mod import;
pub mod io_utils;
pub mod item;
pub mod mapping;
pub mod parser;
pub mod preview;
pub mod query;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    attribute::AttributeSet,
    cli::{Cli, Commands},
    data::{display_value, parse_decimal},
    import::{CollectionFileSink, ImportLimits, ImportSession, ImportSource, ItemSink},
    item::{Collection, ItemStatus},
    mapping::{ColumnMapping, MappingFile, MappingPlan, MappingTarget},
    query::{CollectionSummary, ItemQuery, SortDirective},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("collectr", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => preview::execute(&args),
        Commands::Map(args) => handle_map(&args),
        Commands::Import(args) => handle_import(&args),
        Commands::Filter(args) => handle_filter(&args),
        Commands::Export(args) => handle_export(&args),
        Commands::Attributes(args) => handle_attributes(&args),
        Commands::Summary(args) => handle_summary(&args),
    }
}

pub(crate) fn open_session(args: &cli::SourceArgs) -> Result<ImportSession> {
    let limits = ImportLimits {
        max_bytes: args.max_bytes,
        max_rows: args.max_rows,
    };
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let source = ImportSource::read(&args.input, &limits, encoding)?;
    let session = ImportSession::parse(source, &limits)
        .with_context(|| format!("Parsing import file {:?}", args.input))?;
    Ok(session)
}

fn describe_target(target: &MappingTarget, attributes: &AttributeSet) -> String {
    match target {
        MappingTarget::Ignore => "not imported".to_string(),
        MappingTarget::Field(_) => "built-in field".to_string(),
        MappingTarget::Attribute(name) => match attributes.get(name) {
            Some(definition) => format!("{} ({})", definition.label(), definition.kind),
            None => "unknown attribute".to_string(),
        },
        MappingTarget::NewAttribute => "new attribute".to_string(),
    }
}

fn print_mappings(mappings: &[ColumnMapping], attributes: &AttributeSet) {
    let headers = vec![
        "column".to_string(),
        "target".to_string(),
        "meaning".to_string(),
    ];
    let rows = mappings
        .iter()
        .map(|mapping| {
            vec![
                mapping.source.clone(),
                mapping.target.to_string(),
                describe_target(&mapping.target, attributes),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
}

fn handle_map(args: &cli::MapArgs) -> Result<()> {
    let session = open_session(&args.source)?;
    let attributes = AttributeSet::load_or_default(args.attributes.as_deref())?;
    let mappings = session.propose(attributes.as_slice());
    print_mappings(&mappings, &attributes);

    let mapped = mappings.iter().filter(|m| !m.target.is_ignored()).count();
    info!(
        "Proposed targets for {} of {} column(s) in {}",
        mapped,
        mappings.len(),
        session.source_name()
    );
    if let Err(err) = MappingPlan::new(mappings.clone()) {
        warn!("{err}; add an override before importing");
    }
    if let Some(path) = &args.save {
        MappingFile { mappings }
            .save(path)
            .with_context(|| format!("Saving mapping to {path:?}"))?;
        info!("Mapping written to {path:?}");
    }
    Ok(())
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let session = open_session(&args.source)?;
    let attributes = AttributeSet::load_or_default(args.attributes.as_deref())?;

    let mut mappings = session.propose(attributes.as_slice());
    if let Some(path) = &args.mapping {
        let saved = MappingFile::load(path)?;
        mappings = saved.apply_to(&mappings);
    }
    if !args.map.is_empty() {
        mappings = MappingFile::from_overrides(&args.map)?.apply_to(&mappings);
    }
    if args.create_attributes {
        for mapping in mappings.iter_mut().filter(|m| m.target.is_ignored()) {
            mapping.target = MappingTarget::NewAttribute;
        }
    }
    debug!("Final mapping: {:?}", mappings);
    print_mappings(&mappings, &attributes);

    let plan = MappingPlan::new(mappings)?;
    let outcome = session.execute(&plan, attributes.as_slice())?;
    for skipped in &outcome.skipped {
        info!("Row {} skipped: {}", skipped.row, skipped.message);
    }
    info!(
        "{} item(s) ready, {} row(s) skipped, {} new attribute(s), {} cell warning(s)",
        outcome.items.len(),
        outcome.skipped.len(),
        outcome.new_attributes.len(),
        outcome.warnings.len()
    );

    if args.dry_run {
        info!("Dry run: nothing written to {:?}", args.collection);
        return Ok(());
    }
    let mut sink = CollectionFileSink::new(&args.collection, args.attributes.clone())
        .with_category(args.category.clone());
    sink.persist(&outcome)
        .with_context(|| format!("Persisting import into {:?}", args.collection))
}

fn build_query(args: &cli::FilterArgs, attributes: &AttributeSet) -> Result<ItemQuery> {
    let status = args
        .status
        .as_deref()
        .map(str::parse::<ItemStatus>)
        .transpose()?;
    let min_price = args
        .min_price
        .as_deref()
        .map(parse_decimal)
        .transpose()
        .context("Parsing --min-price")?;
    let max_price = args
        .max_price
        .as_deref()
        .map(parse_decimal)
        .transpose()
        .context("Parsing --max-price")?;
    let sort = args
        .sort
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SortDirective::parse)
        .collect::<Result<Vec<_>>>()?;
    Ok(ItemQuery {
        search: args.search.clone(),
        status,
        min_price,
        max_price,
        attributes: filter::parse_criteria(&args.filters, attributes.as_slice())?,
        sort,
    })
}

fn handle_filter(args: &cli::FilterArgs) -> Result<()> {
    let collection = Collection::load(&args.collection)?;
    let attributes = AttributeSet::load_or_default(args.attributes.as_deref())?;
    let query = build_query(args, &attributes)?;
    debug!("Query: {:?}", query);

    let matched = query.apply(&collection.items, attributes.as_slice());
    let shown = args.limit.unwrap_or(matched.len()).min(matched.len());

    let attribute_columns = query
        .attributes
        .keys()
        .filter_map(|name| attributes.get(name))
        .collect::<Vec<_>>();
    let mut headers = vec![
        "name".to_string(),
        "status".to_string(),
        "purchase_price".to_string(),
        "current_value".to_string(),
    ];
    headers.extend(attribute_columns.iter().map(|d| d.label().to_string()));
    let rows = matched
        .iter()
        .take(shown)
        .map(|item| {
            let mut row = vec![
                item.name.clone(),
                item.status.to_string(),
                item.purchase_price.map(|p| p.to_string()).unwrap_or_default(),
                item.current_value.map(|v| v.to_string()).unwrap_or_default(),
            ];
            row.extend(attribute_columns.iter().map(|d| {
                item.attributes
                    .get(&d.name)
                    .map(display_value)
                    .unwrap_or_default()
            }));
            row
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "{} of {} item(s) match; showing {}",
        matched.len(),
        collection.items.len(),
        shown
    );
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let collection = Collection::load(&args.collection)?;
    let attributes = AttributeSet::load_or_default(args.attributes.as_deref())?;
    let category = args.category.as_deref();
    let items = collection
        .items
        .iter()
        .filter(|item| category.is_none_or(|c| item.category.as_deref() == Some(c)))
        .collect::<Vec<_>>();
    let definitions = attributes
        .as_slice()
        .iter()
        .filter(|d| category.is_none_or(|c| d.category.as_deref().is_none_or(|dc| dc == c)))
        .cloned()
        .collect::<Vec<_>>();
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let delimiter = args.delimiter.unwrap_or(io_utils::DEFAULT_EXPORT_DELIMITER);
    debug!(
        "Exporting with delimiter '{}' and encoding {}",
        printable_delimiter(delimiter),
        encoding.name()
    );
    export::export_items(
        &items,
        &definitions,
        args.output.as_deref(),
        args.format,
        delimiter,
        encoding,
    )
}

fn handle_attributes(args: &cli::AttributesArgs) -> Result<()> {
    let attributes = AttributeSet::load(&args.attributes)?;
    if attributes.attributes.is_empty() {
        info!("{:?} does not define any attributes", args.attributes);
        return Ok(());
    }
    let headers = vec![
        "#".to_string(),
        "name".to_string(),
        "display".to_string(),
        "type".to_string(),
        "options".to_string(),
    ];
    let rows = attributes
        .as_slice()
        .iter()
        .enumerate()
        .map(|(idx, definition)| {
            let mut options = Vec::new();
            if let Some(min) = definition.min {
                options.push(format!("min={min}"));
            }
            if let Some(max) = definition.max {
                options.push(format!("max={max}"));
            }
            if let Some(unit) = &definition.unit {
                options.push(format!("unit={unit}"));
            }
            if !definition.choices.is_empty() {
                options.push(format!("choices={}", definition.choices.join("|")));
            }
            vec![
                (idx + 1).to_string(),
                definition.name.clone(),
                definition.label().to_string(),
                definition.kind.to_string(),
                options.join(" "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Listed {} attribute(s) from {:?}",
        attributes.attributes.len(),
        args.attributes
    );
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let collection = Collection::load(&args.collection)?;
    let summary = CollectionSummary::from_items(&collection.items);
    let headers = vec!["status".to_string(), "items".to_string()];
    let mut rows = summary
        .by_status
        .iter()
        .map(|(status, count)| vec![status.to_string(), count.to_string()])
        .collect::<Vec<_>>();
    rows.push(vec!["total".to_string(), summary.items.to_string()]);
    table::print_table(&headers, &rows);
    println!("purchase total: {}", summary.total_purchase_price);
    println!("current value:  {}", summary.total_current_value);
    println!("gain:           {}", summary.gain());
    info!("Summarized collection '{}'", collection.name);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
