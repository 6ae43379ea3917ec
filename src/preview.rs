use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, data::display_value, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let session = crate::open_session(&args.source)?;
    let columns = session.columns().to_vec();
    let rows = session
        .records()
        .iter()
        .take(args.rows)
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map(display_value).unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    table::print_table(&columns, &rows);
    info!(
        "Displayed {} of {} row(s) from {}",
        rows.len(),
        session.records().len(),
        session.source_name()
    );
    Ok(())
}
