//! Loading of portfolios and price tables.
//!
//! Prices come either from a single long-format CSV file
//! (`Date,Ticker,Open,High,Low,Close,Adj Close[,Volume]`) or from a directory
//! holding one `<TICKER>.csv` file per ticker. Both are exposed through the
//! [`PriceSource`] trait, which stands in for a market-data provider.

use crate::error::{AnalyticsError, Result};
use crate::types::{DateRange, PriceField, PriceTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw CSV row with tolerant header names.
///
/// Numeric cells are read as text so that empty, `NaN` and `null` cells can all
/// be treated as missing.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(
        alias = "Date",
        alias = "DATE",
        alias = "Datetime",
        alias = "datetime",
        alias = "Timestamp",
        alias = "timestamp"
    )]
    date: String,
    #[serde(
        default,
        alias = "Ticker",
        alias = "TICKER",
        alias = "Symbol",
        alias = "symbol"
    )]
    ticker: Option<String>,
    #[serde(default, alias = "Open", alias = "o")]
    open: Option<String>,
    #[serde(default, alias = "High", alias = "h")]
    high: Option<String>,
    #[serde(default, alias = "Low", alias = "l")]
    low: Option<String>,
    #[serde(default, alias = "Close", alias = "c")]
    close: Option<String>,
    #[serde(
        default,
        alias = "Adj Close",
        alias = "Adj_Close",
        alias = "AdjClose",
        alias = "adjclose"
    )]
    adj_close: Option<String>,
}

/// Parsed row, values in [`PriceField::ALL`] order.
#[derive(Debug)]
struct PriceRow {
    date: NaiveDate,
    ticker: Option<String>,
    values: [Option<f64>; 5],
}

impl PriceRow {
    fn validate(&self) -> bool {
        let [_, high, low, _, _] = self.values;
        let non_negative = self.values.iter().flatten().all(|v| *v >= 0.0);
        let ordered = match (high, low) {
            (Some(h), Some(l)) => h >= l,
            _ => true,
        };
        non_negative && ordered
    }
}

/// Data source configuration.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Date format string tried before the built-in formats (e.g. "%d.%m.%Y").
    pub date_format: Option<String>,
    /// CSV delimiter character. If None, delimiter is auto-detected.
    pub delimiter: Option<u8>,
    /// Skip invalid rows instead of failing.
    pub skip_invalid: bool,
    /// Reject rows with negative prices or a high below the low.
    pub validate_prices: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: None,
            skip_invalid: true,
            validate_prices: true,
        }
    }
}

impl DataConfig {
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Fail on the first invalid row.
    pub fn strict(mut self) -> Self {
        self.skip_invalid = false;
        self
    }
}

// =============================================================================
// Portfolios
// =============================================================================

/// Parse a portfolio file body: one ticker per line.
///
/// The ticker is the first whitespace-separated token, so trailing notes such
/// as `AAPL  Apple Inc.` are allowed. Blank lines and `#` comments are skipped.
/// Symbols are upper-cased and duplicates dropped, keeping the first occurrence.
pub fn parse_portfolio(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        let ticker = token.to_uppercase();
        if seen.insert(ticker.clone()) {
            tickers.push(ticker);
        } else {
            warn!("Duplicate ticker {} in portfolio, ignoring", ticker);
        }
    }
    tickers
}

/// Read and parse a portfolio file.
pub fn load_portfolio(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    info!("Loading portfolio from: {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| with_path(e, path))?;
    let tickers = parse_portfolio(&text);
    if tickers.is_empty() {
        warn!("Portfolio {} lists no tickers", path.display());
    } else {
        info!("Portfolio has {} tickers: {}", tickers.len(), tickers.join(", "));
    }
    Ok(tickers)
}

// =============================================================================
// CSV parsing
// =============================================================================

fn with_path(err: std::io::Error, path: &Path) -> AnalyticsError {
    AnalyticsError::IoError(std::io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}

/// Detect the CSV delimiter by analyzing the first few lines of the file.
///
/// Tries comma, tab, semicolon and pipe, and returns the one that splits every
/// sampled line into the same number (at least two) of fields.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).map_err(|e| with_path(e, path))?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().take(5).map_while(|l| l.ok()).collect();

    if lines.is_empty() {
        return Ok(b',');
    }

    let delimiters = [b',', b'\t', b';', b'|'];
    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in &delimiters {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.as_bytes().iter().filter(|&&b| b == delim).count() + 1)
            .collect();

        let first_count = counts[0];
        let consistent = counts.iter().all(|&c| c == first_count);
        if consistent && first_count >= 2 && first_count > best_score {
            best_score = first_count;
            best_delimiter = delim;
        }
    }

    debug!(
        "Detected delimiter {:?} with {} fields",
        best_delimiter as char, best_score
    );
    Ok(best_delimiter)
}

/// Parse a date with an optional explicit format, then common formats.
///
/// Timestamps with a time component are truncated to their date. Plain
/// integers are read as Unix timestamps in seconds.
pub fn parse_date(s: &str, format: Option<&str>) -> Result<NaiveDate> {
    let s = s.trim();

    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y/%m/%d %H:%M:%S",
    ];
    for fmt in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    // Offset-aware timestamps, e.g. "2023-01-03 00:00:00-05:00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    let date_formats = [
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%d/%m/%Y",
        "%m/%d/%Y",
        "%d-%b-%Y",  // 15-Jan-2024
        "%d %b %Y",  // 15 Jan 2024
        "%b %d, %Y", // Jan 15, 2024
    ];
    for fmt in &date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    if let Ok(ts) = s.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp(ts, 0) {
            return Ok(dt.date_naive());
        }
    }

    Err(AnalyticsError::DataError(format!(
        "Could not parse date: '{}'",
        s
    )))
}

/// Parse a numeric cell. Empty, `NaN`, `null`, `None` and `NA` are missing.
fn parse_cell(cell: &Option<String>) -> Result<Option<f64>> {
    let Some(raw) = cell else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty()
        || ["nan", "null", "none", "na"]
            .iter()
            .any(|m| raw.eq_ignore_ascii_case(m))
    {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| Some(v).filter(|v| !v.is_nan()))
        .map_err(|_| AnalyticsError::DataError(format!("Invalid number: '{}'", raw)))
}

fn parse_row(row: &CsvRow, config: &DataConfig) -> Result<PriceRow> {
    let date = parse_date(&row.date, config.date_format.as_deref())?;
    let ticker = row
        .ticker
        .as_deref()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty());
    Ok(PriceRow {
        date,
        ticker,
        values: [
            parse_cell(&row.open)?,
            parse_cell(&row.high)?,
            parse_cell(&row.low)?,
            parse_cell(&row.close)?,
            parse_cell(&row.adj_close)?,
        ],
    })
}

/// Read every valid row of a price CSV file.
fn read_rows(path: &Path, config: &DataConfig) -> Result<Vec<PriceRow>> {
    let delimiter = match config.delimiter {
        Some(d) => d,
        None => detect_delimiter(path)?,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0;

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row_num = idx + 1;
        let parsed = result
            .map_err(AnalyticsError::from)
            .and_then(|raw| parse_row(&raw, config))
            .and_then(|row| {
                if config.validate_prices && !row.validate() {
                    Err(AnalyticsError::DataError(format!(
                        "Invalid prices at row {}: {:?}",
                        row_num, row.values
                    )))
                } else {
                    Ok(row)
                }
            });

        match parsed {
            Ok(row) => rows.push(row),
            Err(e) if config.skip_invalid => {
                debug!("Skipping row {}: {}", row_num, e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows in {}", skipped, path.display());
    }
    Ok(rows)
}

/// Accumulates rows per ticker and joins them on the union of their dates.
#[derive(Default)]
struct TableBuilder {
    tickers: Vec<String>,
    rows: HashMap<String, BTreeMap<NaiveDate, [Option<f64>; 5]>>,
    duplicates: usize,
}

impl TableBuilder {
    fn push(&mut self, ticker: &str, date: NaiveDate, values: [Option<f64>; 5]) {
        if !self.rows.contains_key(ticker) {
            self.tickers.push(ticker.to_string());
        }
        let by_date = self.rows.entry(ticker.to_string()).or_default();
        if by_date.insert(date, values).is_some() {
            self.duplicates += 1;
        }
    }

    fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Build the table. Columns without a single value are left out.
    fn build(self) -> Result<PriceTable> {
        if self.duplicates > 0 {
            warn!(
                "Found {} duplicate (date, ticker) rows, keeping the last occurrence",
                self.duplicates
            );
        }

        let dates: BTreeSet<NaiveDate> = self
            .rows
            .values()
            .flat_map(|by_date| by_date.keys().copied())
            .collect();
        let dates: Vec<NaiveDate> = dates.into_iter().collect();
        let mut table = PriceTable::new(dates.clone())?;

        for ticker in &self.tickers {
            let Some(by_date) = self.rows.get(ticker) else {
                continue;
            };
            for (k, field) in PriceField::ALL.iter().enumerate() {
                let column: Vec<Option<f64>> = dates
                    .iter()
                    .map(|d| by_date.get(d).and_then(|v| v[k]))
                    .collect();
                if column.iter().any(Option::is_some) {
                    table.insert_column(ticker, *field, column)?;
                }
            }
        }
        Ok(table)
    }
}

fn log_loaded(table: &PriceTable, origin: &Path) {
    info!(
        "Loaded {} tickers x {} dates ({} to {}) from {}",
        table.ticker_count(),
        table.len(),
        table
            .first_date()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        table.last_date().map(|d| d.to_string()).unwrap_or_default(),
        origin.display()
    );
}

// =============================================================================
// Loaders
// =============================================================================

/// Load a long-format price CSV file into a table.
///
/// Tickers keep the order of their first appearance. When a (date, ticker)
/// pair occurs more than once the last row wins.
///
/// # Errors
/// [`AnalyticsError::NoData`] if the file holds no valid rows.
pub fn load_prices_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<PriceTable> {
    let path = path.as_ref();
    info!("Loading prices from: {}", path.display());

    let mut builder = TableBuilder::default();
    let mut unnamed = 0;
    for row in read_rows(path, config)? {
        match &row.ticker {
            Some(ticker) => builder.push(ticker, row.date, row.values),
            None if config.skip_invalid => unnamed += 1,
            None => {
                return Err(AnalyticsError::DataError(format!(
                    "Row dated {} in {} has no ticker",
                    row.date,
                    path.display()
                )))
            }
        }
    }
    if unnamed > 0 {
        warn!("Skipped {} rows without a ticker", unnamed);
    }

    if builder.is_empty() {
        return Err(AnalyticsError::NoData);
    }
    let table = builder.build()?;
    log_loaded(&table, path);
    Ok(table)
}

/// Load one `<TICKER>.csv` file per ticker from `dir` and outer-join them.
///
/// File names match tickers case-insensitively, see [`list_dir_files`].
///
/// Files use the single-ticker layout `Date,Open,High,Low,Close,Adj Close`.
/// Dates missing from a ticker's file are missing in its columns.
///
/// # Errors
/// An [`AnalyticsError::IoError`] naming the file when one is absent, and
/// [`AnalyticsError::NoData`] if no file holds a valid row.
pub fn load_dir<S: AsRef<str>>(
    dir: impl AsRef<Path>,
    tickers: &[S],
    config: &DataConfig,
) -> Result<PriceTable> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(AnalyticsError::DataError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let files = list_dir_files(dir)?;
    let mut builder = TableBuilder::default();
    for ticker in tickers {
        let ticker = ticker.as_ref().trim().to_uppercase();
        let path = files.get(&ticker).ok_or_else(|| {
            AnalyticsError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "No price file for {}: {}",
                    ticker,
                    dir.join(format!("{}.csv", ticker)).display()
                ),
            ))
        })?;

        debug!("Loading {} from {}", ticker, path.display());
        let rows = read_rows(path, config)?;
        if rows.is_empty() {
            warn!("{} has no valid rows", path.display());
        }
        for row in rows {
            builder.push(&ticker, row.date, row.values);
        }
    }

    if builder.is_empty() {
        return Err(AnalyticsError::NoData);
    }
    let table = builder.build()?;
    log_loaded(&table, dir);
    Ok(table)
}

/// Price files in `dir`, keyed by ticker symbol.
///
/// The symbol is the upper-cased stem of each `*.csv` file, so `aapl.csv`
/// serves `AAPL`. When two files map to the same symbol the first path in
/// sorted order is kept.
pub fn list_dir_files(dir: impl AsRef<Path>) -> Result<BTreeMap<String, PathBuf>> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| with_path(e, dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in paths {
        let Some(ticker) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_uppercase)
        else {
            continue;
        };
        if let Some(kept) = files.get(&ticker) {
            warn!(
                "Ignoring {}: {} already provides {}",
                path.display(),
                kept.display(),
                ticker
            );
            continue;
        }
        files.insert(ticker, path);
    }
    Ok(files)
}

/// Ticker symbols of the `*.csv` files in `dir`, sorted.
pub fn list_dir_tickers(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    Ok(list_dir_files(dir)?.into_keys().collect())
}

/// Keep rows with `start <= date < end`. Unset bounds are open.
pub fn filter_date_range(
    table: &PriceTable,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> PriceTable {
    let range = DateRange { start, end };
    table.filter_dates(|d| range.contains(d))
}

// =============================================================================
// Price sources
// =============================================================================

/// Provider of historical prices for a set of tickers.
pub trait PriceSource {
    /// Prices of `tickers` within `range`, with tickers in request order.
    ///
    /// An empty request returns every available ticker. Requested tickers
    /// without data are left out of the table.
    fn fetch(&self, tickers: &[String], range: DateRange) -> Result<PriceTable>;
}

fn select_requested(table: &PriceTable, tickers: &[String], range: DateRange) -> PriceTable {
    let table = filter_date_range(table, range.start, range.end);
    if tickers.is_empty() {
        return table;
    }
    for ticker in tickers.iter().filter(|t| !table.contains(t)) {
        warn!("No price data for {}", ticker);
    }
    table.select_tickers(tickers)
}

/// Long-format CSV file as a price source.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
    config: DataConfig,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>, config: DataConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(&self, tickers: &[String], range: DateRange) -> Result<PriceTable> {
        let table = load_prices_csv(&self.path, &self.config)?;
        Ok(select_requested(&table, tickers, range))
    }
}

/// Directory of per-ticker CSV files as a price source.
#[derive(Debug, Clone)]
pub struct DirPriceSource {
    dir: PathBuf,
    config: DataConfig,
}

impl DirPriceSource {
    pub fn new(dir: impl Into<PathBuf>, config: DataConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }
}

impl PriceSource for DirPriceSource {
    fn fetch(&self, tickers: &[String], range: DateRange) -> Result<PriceTable> {
        let available = list_dir_tickers(&self.dir)?;
        let wanted: Vec<String> = if tickers.is_empty() {
            available
        } else {
            let present: Vec<String> = tickers
                .iter()
                .filter(|t| available.contains(*t))
                .cloned()
                .collect();
            if present.is_empty() {
                return Err(AnalyticsError::NoData);
            }
            present
        };
        let table = load_dir(&self.dir, &wanted, &self.config)?;
        Ok(select_requested(&table, tickers, range))
    }
}

/// Pick the source matching `path`: a directory of per-ticker files or a
/// single long-format CSV file.
pub fn source_for_path(path: impl AsRef<Path>, config: DataConfig) -> Box<dyn PriceSource> {
    let path = path.as_ref();
    if path.is_dir() {
        Box::new(DirPriceSource::new(path, config))
    } else {
        Box::new(CsvPriceSource::new(path, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_long_csv() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Date,Ticker,Open,High,Low,Close,Adj Close,Volume").unwrap();
        writeln!(file, "2024-01-02,MSFT,370,375,366,370.9,368.2,25000").unwrap();
        writeln!(file, "2024-01-02,AAPL,187,188,183,185.6,184.9,82000").unwrap();
        writeln!(file, "2024-01-03,AAPL,184,185,182,184.2,183.5,58000").unwrap();
        writeln!(file, "2024-01-04,AAPL,182,183,180,181.9,,71000").unwrap();
        writeln!(file, "2024-01-04,MSFT,367,373,367,367.9,NaN,20000").unwrap();
        file
    }

    #[test]
    fn test_parse_portfolio() {
        let text = "aapl Apple Inc.\n\n# big tech\nMSFT\n  googl  \nAAPL\n";
        assert_eq!(parse_portfolio(text), vec!["AAPL", "MSFT", "GOOGL"]);
        assert!(parse_portfolio("").is_empty());
    }

    #[test]
    fn test_load_portfolio_missing_file() {
        let err = load_portfolio("/nonexistent/portfolio.txt").unwrap_err();
        assert!(matches!(err, AnalyticsError::IoError(_)));
        assert!(err.to_string().contains("portfolio.txt"));
    }

    #[test]
    fn test_load_prices_csv() {
        let file = create_long_csv();
        let table = load_prices_csv(file.path(), &DataConfig::default()).unwrap();

        assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["MSFT", "AAPL"]);
        assert_eq!(
            table.dates(),
            &[date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)]
        );
        assert_eq!(
            table.column("AAPL", PriceField::AdjClose).unwrap(),
            &[Some(184.9), Some(183.5), None]
        );
        // MSFT has no row on Jan 3, and its Jan 4 adjusted close is NaN
        assert_eq!(
            table.column("MSFT", PriceField::AdjClose).unwrap(),
            &[Some(368.2), None, None]
        );
        assert_eq!(table.column("MSFT", PriceField::Open).unwrap()[2], Some(367.0));
    }

    #[test]
    fn test_load_prices_csv_duplicates_last_wins() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "date,symbol,adj_close").unwrap();
        writeln!(file, "2024-01-02,aapl,1.0").unwrap();
        writeln!(file, "2024-01-02,AAPL,2.0").unwrap();
        let table = load_prices_csv(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.column("AAPL", PriceField::AdjClose).unwrap(), &[Some(2.0)]);
        assert!(table.column("AAPL", PriceField::Open).is_none());
    }

    #[test]
    fn test_invalid_rows_skipped_or_rejected() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Date,Ticker,Open,High,Low,Close,Adj Close").unwrap();
        writeln!(file, "2024-01-02,AAPL,1,2,1,2,2").unwrap();
        writeln!(file, "not-a-date,AAPL,1,2,1,2,2").unwrap();
        writeln!(file, "2024-01-03,AAPL,1,0.5,1,2,2").unwrap(); // high < low
        writeln!(file, "2024-01-04,AAPL,abc,2,1,2,2").unwrap();

        let table = load_prices_csv(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(table.len(), 1);

        assert!(load_prices_csv(file.path(), &DataConfig::default().strict()).is_err());
    }

    #[test]
    fn test_load_prices_csv_no_rows() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Date,Ticker,Adj Close").unwrap();
        assert!(matches!(
            load_prices_csv(file.path(), &DataConfig::default()),
            Err(AnalyticsError::NoData)
        ));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Date;Ticker;Adj Close").unwrap();
        writeln!(file, "2024-01-02;AAPL;10.5").unwrap();
        writeln!(file, "2024-01-03;AAPL;11.5").unwrap();
        let table = load_prices_csv(file.path(), &DataConfig::default()).unwrap();
        assert_eq!(
            table.column("AAPL", PriceField::AdjClose).unwrap(),
            &[Some(10.5), Some(11.5)]
        );
    }

    #[test]
    fn test_date_parsing() {
        assert_eq!(parse_date("2024-01-15", None).unwrap(), date(2024, 1, 15));
        assert_eq!(
            parse_date("2024-01-15 09:30:00", None).unwrap(),
            date(2024, 1, 15)
        );
        assert_eq!(
            parse_date("2023-01-03 00:00:00-05:00", None).unwrap(),
            date(2023, 1, 3)
        );
        assert_eq!(parse_date("15-Jan-2024", None).unwrap(), date(2024, 1, 15));
        assert_eq!(parse_date("Jan 15, 2024", None).unwrap(), date(2024, 1, 15));
        assert_eq!(
            parse_date("15.01.2024", Some("%d.%m.%Y")).unwrap(),
            date(2024, 1, 15)
        );
        assert!(parse_date("yesterday", None).is_err());
    }

    #[test]
    fn test_load_dir_outer_join() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("AAPL.csv"),
            "Date,Open,High,Low,Close,Adj Close\n\
             2024-01-02,1,2,1,2,2\n\
             2024-01-03,2,3,2,3,3\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("MSFT.csv"),
            "Date,Open,High,Low,Close,Adj Close\n\
             2024-01-03,5,6,5,6,6\n\
             2024-01-04,6,7,6,7,7\n",
        )
        .unwrap();

        let table = load_dir(dir.path(), &["MSFT", "aapl"], &DataConfig::default()).unwrap();
        assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["MSFT", "AAPL"]);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.column("AAPL", PriceField::AdjClose).unwrap(),
            &[Some(2.0), Some(3.0), None]
        );
        assert_eq!(
            table.column("MSFT", PriceField::AdjClose).unwrap(),
            &[None, Some(6.0), Some(7.0)]
        );

        let err = load_dir(dir.path(), &["GOOGL"], &DataConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::IoError(_)));
        assert!(err.to_string().contains("GOOGL.csv"));

        assert_eq!(list_dir_tickers(dir.path()).unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_filter_date_range_end_exclusive() {
        let file = create_long_csv();
        let table = load_prices_csv(file.path(), &DataConfig::default()).unwrap();
        let filtered = filter_date_range(&table, Some(date(2024, 1, 3)), Some(date(2024, 1, 4)));
        assert_eq!(filtered.dates(), &[date(2024, 1, 3)]);
        assert_eq!(filter_date_range(&table, None, None).len(), 3);
    }

    #[test]
    fn test_csv_source_fetch() {
        let file = create_long_csv();
        let source = CsvPriceSource::new(file.path(), DataConfig::default());
        let tickers = vec!["AAPL".to_string(), "TSLA".to_string(), "MSFT".to_string()];
        let range = DateRange::new(Some(date(2024, 1, 3)), None).unwrap();

        let table = source.fetch(&tickers, range).unwrap();
        assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(table.first_date(), Some(date(2024, 1, 3)));

        let all = source.fetch(&[], DateRange::all()).unwrap();
        assert_eq!(all.ticker_count(), 2);
    }

    #[test]
    fn test_dir_source_fetch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("AAPL.csv"),
            "Date,Adj Close\n2024-01-02,2\n2024-01-03,3\n",
        )
        .unwrap();

        let source = source_for_path(dir.path(), DataConfig::default());
        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];
        let table = source.fetch(&tickers, DateRange::all()).unwrap();
        assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["AAPL"]);
        assert_eq!(table.len(), 2);

        let missing = vec!["MSFT".to_string()];
        assert!(matches!(
            source.fetch(&missing, DateRange::all()),
            Err(AnalyticsError::NoData)
        ));
    }

    #[test]
    fn test_dir_source_lower_case_file_names() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("aapl.csv"),
            "Date,Adj Close\n2024-01-02,2\n2024-01-03,3\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not prices\n").unwrap();

        let files = list_dir_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["AAPL"], dir.path().join("aapl.csv"));

        let source = source_for_path(dir.path(), DataConfig::default());
        let all = source.fetch(&[], DateRange::all()).unwrap();
        assert_eq!(all.tickers().collect::<Vec<_>>(), vec!["AAPL"]);
        assert_eq!(all.len(), 2);

        let table = load_dir(dir.path(), &["Aapl"], &DataConfig::default()).unwrap();
        assert_eq!(
            table.column("AAPL", PriceField::AdjClose).unwrap(),
            &[Some(2.0), Some(3.0)]
        );
    }
}
