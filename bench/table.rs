//! Result table assembly.
//!
//! Reshapes the aggregated efficiency cells into the long-format table handed
//! to the presentation layer: one row per cell, columns {fk, dim, qmc, t,
//! log10_gain} plus the combined `fk_qmc` category label ("boot SQMC",
//! "guided SMC", ...). No computation happens here beyond labeling; the row
//! count is checked against the cell count so no cell can be dropped
//! silently.

use crate::gain::EfficiencyCell;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Result table has {rows} rows for {cells} efficiency cells; every cell must produce exactly one row.")]
    RowCountMismatch { rows: usize, cells: usize },
}

/// The combined category label: algorithm label plus driving-mode suffix.
fn combined_label(cell: &EfficiencyCell) -> String {
    format!("{}{}", cell.kind.label(), cell.mode.suffix())
}

/// Builds the long-format result table, one row per efficiency cell.
pub fn build_table(cells: &[EfficiencyCell]) -> Result<DataFrame, TableError> {
    let fk: Vec<&str> = cells.iter().map(|c| c.kind.label()).collect();
    let dim: Vec<u32> = cells.iter().map(|c| c.dim as u32).collect();
    let qmc: Vec<bool> = cells.iter().map(|c| c.mode.is_qmc()).collect();
    let t: Vec<u32> = cells.iter().map(|c| c.t as u32).collect();
    let log10_gain: Vec<f64> = cells.iter().map(|c| c.log10_gain).collect();
    let fk_qmc: Vec<String> = cells.iter().map(combined_label).collect();

    let df = DataFrame::new(vec![
        Series::new("fk".into(), fk).into(),
        Series::new("dim".into(), dim).into(),
        Series::new("qmc".into(), qmc).into(),
        Series::new("t".into(), t).into(),
        Series::new("log10_gain".into(), log10_gain).into(),
        Series::new("fk_qmc".into(), fk_qmc).into(),
    ])?;

    if df.height() != cells.len() {
        return Err(TableError::RowCountMismatch {
            rows: df.height(),
            cells: cells.len(),
        });
    }
    log::info!("Result table built: {} rows", df.height());
    Ok(df)
}

/// Grouped summary of the table: mean and median gain per (dim, category),
/// the statistics the grouped distribution plot visualizes.
pub fn summarize(df: &DataFrame) -> Result<DataFrame, TableError> {
    let summary = df
        .clone()
        .lazy()
        .group_by([col("dim"), col("fk_qmc")])
        .agg([
            col("log10_gain").mean().alias("mean_gain"),
            col("log10_gain").median().alias("median_gain"),
        ])
        .sort(["dim", "fk_qmc"], SortMultipleOptions::default())
        .collect()?;
    Ok(summary)
}

/// Writes the table as TSV, the on-disk form of the artifact handed to the
/// presentation layer.
pub fn write_tsv(df: &mut DataFrame, path: &Path) -> Result<(), TableError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).with_separator(b'\t').finish(df)?;
    log::info!("Result table written to {}", path.display());
    Ok(())
}
