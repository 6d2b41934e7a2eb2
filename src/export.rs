//! CSV and JSON snapshots of analysis results.
//!
//! | Output | Function |
//! |--------|----------|
//! | Statistics table (CSV) | [`export_statistics_csv`] |
//! | Statistics table (JSON) | [`export_statistics_json`] |
//! | Price table, long format | [`export_table_csv`] |
//! | Train/test split | [`export_split_csv`] |
//!
//! Parent directories are created as needed. Missing values and NaN are
//! written as empty cells.

use crate::analytics::TickerStatistics;
use crate::error::Result;
use crate::split::Split;
use crate::types::{PriceField, PriceTable};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Header of the statistics CSV snapshot.
pub const STATISTICS_HEADER: &str =
    "ticker,count,mean,std,min,25%,50%,75%,max,abs_change,rel_change,max_fall,max_rise";

/// Date format of exported tables, readable by [`crate::data::load_prices_csv`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn format_cell(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

/// Render statistics rows as CSV text, in the given order.
pub fn statistics_to_csv(rows: &[TickerStatistics]) -> String {
    let mut out = String::new();
    out.push_str(STATISTICS_HEADER);
    out.push('\n');
    for row in rows {
        let floats: Vec<String> = row
            .stats
            .float_columns()
            .iter()
            .map(|(_, v)| format_float(*v))
            .collect();
        out.push_str(&format!(
            "{},{},{}\n",
            row.ticker,
            row.stats.count,
            floats.join(",")
        ));
    }
    out
}

/// Export statistics rows to CSV.
pub fn export_statistics_csv(rows: &[TickerStatistics], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    fs::write(path, statistics_to_csv(rows))?;
    info!("Saved statistics of {} tickers to {}", rows.len(), path.display());
    Ok(())
}

/// Export statistics rows as a pretty JSON array. Non-finite numbers become `null`.
pub fn export_statistics_json(rows: &[TickerStatistics], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), rows)?;
    info!("Saved statistics of {} tickers to {}", rows.len(), path.display());
    Ok(())
}

/// Export a price table in long format: one line per (date, ticker).
///
/// Columns are `Date,Ticker,Open,High,Low,Close,Adj Close`, followed by
/// `day,weekday,month,year` when the table carries calendar features.
pub fn export_table_csv(table: &PriceTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let with_calendar = table.has_calendar();
    let fields: Vec<&str> = PriceField::ALL.iter().map(|f| f.column_name()).collect();
    write!(writer, "Date,Ticker,{}", fields.join(","))?;
    if with_calendar {
        write!(writer, ",day,weekday,month,year")?;
    }
    writeln!(writer)?;

    for (i, date) in table.dates().iter().enumerate() {
        for ticker in table.ticker_columns() {
            let cells: Vec<String> = PriceField::ALL
                .iter()
                .map(|f| format_cell(ticker.column(*f).and_then(|c| c[i])))
                .collect();
            write!(
                writer,
                "{},{},{}",
                date.format(DATE_FORMAT),
                ticker.symbol,
                cells.join(",")
            )?;
            if with_calendar {
                let cal = table.calendar()[i];
                write!(writer, ",{},{},{},{}", cal.day, cal.weekday, cal.month, cal.year)?;
            }
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    info!(
        "Saved {} rows x {} tickers to {}",
        table.len(),
        table.ticker_count(),
        path.display()
    );
    Ok(())
}

/// Write `train.csv` and `test.csv` into `dir`, returning their paths.
pub fn export_split_csv(split: &Split, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let train_path = dir.join("train.csv");
    let test_path = dir.join("test.csv");
    export_table_csv(&split.train, &train_path)?;
    export_table_csv(&split.test, &test_path)?;
    Ok((train_path, test_path))
}
