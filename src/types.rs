//! Core data types: price fields, price series and multi-ticker price tables.

use crate::error::{AnalyticsError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Named price column of a ticker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum PriceField {
    #[serde(rename = "Open", alias = "open")]
    Open,
    #[serde(rename = "High", alias = "high")]
    High,
    #[serde(rename = "Low", alias = "low")]
    Low,
    #[serde(rename = "Close", alias = "close")]
    Close,
    /// Closing price adjusted for dividends and splits. Canonical field for statistics.
    #[default]
    #[serde(
        rename = "Adj Close",
        alias = "adj_close",
        alias = "AdjClose",
        alias = "adjclose"
    )]
    AdjClose,
}

impl PriceField {
    /// All fields in column order.
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::AdjClose,
    ];

    /// Column header used in CSV files.
    pub fn column_name(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::AdjClose => "Adj Close",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for PriceField {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" | "o" => Ok(PriceField::Open),
            "high" | "h" => Ok(PriceField::High),
            "low" | "l" => Ok(PriceField::Low),
            "close" | "c" => Ok(PriceField::Close),
            "adj close" | "adj_close" | "adjclose" | "adjusted close" => Ok(PriceField::AdjClose),
            other => Err(AnalyticsError::InvalidInput(format!(
                "Unknown price field: '{}'",
                other
            ))),
        }
    }
}

/// Treat NaN as a missing observation.
#[inline]
fn normalize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

fn check_strictly_increasing(dates: &[NaiveDate]) -> Result<()> {
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(AnalyticsError::InvalidInput(format!(
            "Dates must be strictly increasing: {} is followed by {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Ordered (date, value) observations of one ticker and one price field.
///
/// Dates are strictly increasing. Missing observations are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct RawPriceSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = AnalyticsError;

    fn try_from(raw: RawPriceSeries) -> Result<Self> {
        PriceSeries::new(raw.dates, raw.values)
    }
}

impl PriceSeries {
    /// Create a series, validating date order and lengths.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(AnalyticsError::InvalidInput(format!(
                "Series has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        check_strictly_increasing(&dates)?;
        let values = values.into_iter().map(normalize).collect();
        Ok(Self { dates, values })
    }

    /// Create a series of consecutive calendar days starting at `start`.
    /// NaN values are stored as missing.
    pub fn daily(start: NaiveDate, values: &[f64]) -> Result<Self> {
        let dates: Vec<NaiveDate> = start.iter_days().take(values.len()).collect();
        Self::new(dates, values.iter().map(|&v| Some(v)).collect())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Iterate over (date, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Non-missing values in chronological order.
    pub fn observed(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| *v).collect()
    }

    /// Same dates with every value passed through `f`. NaN results are stored as missing.
    pub fn map_values(&self, f: impl Fn(Option<f64>) -> Option<f64>) -> PriceSeries {
        PriceSeries {
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| normalize(f(*v))).collect(),
        }
    }

    /// Non-missing observations with their dates.
    pub fn observed_with_dates(&self) -> Vec<(NaiveDate, f64)> {
        self.iter().filter_map(|(d, v)| v.map(|v| (d, v))).collect()
    }
}

/// Date-derived exogenous variables attached to a preprocessed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Day of month, 1-31.
    pub day: u32,
    /// Day of week, 0 = Monday through 6 = Sunday.
    pub weekday: u32,
    /// Month, 1-12.
    pub month: u32,
    pub year: i32,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day(),
            weekday: date.weekday().num_days_from_monday(),
            month: date.month(),
            year: date.year(),
        }
    }
}

/// Half-open date interval `[start, end)`. Unset bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Err(AnalyticsError::InvalidRange(format!(
                    "Start date {} must be before end date {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date < e)
    }
}

/// Price columns of a single ticker, aligned with the table's date axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerColumns {
    pub symbol: String,
    columns: BTreeMap<PriceField, Vec<Option<f64>>>,
}

impl TickerColumns {
    fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = PriceField> + '_ {
        self.columns.keys().copied()
    }

    pub fn column(&self, field: PriceField) -> Option<&[Option<f64>]> {
        self.columns.get(&field).map(|c| c.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (PriceField, &[Option<f64>])> + '_ {
        self.columns.iter().map(|(f, c)| (*f, c.as_slice()))
    }
}

/// Per-ticker price columns on a common, strictly increasing date axis.
///
/// Tickers keep their insertion order, which is the tie-break order used when
/// ranking statistics. Preprocessed tables also carry one [`CalendarFeatures`]
/// entry per row.
///
/// Deserialized tables go through the same checks as [`PriceTable::new`] and
/// [`PriceTable::insert_column`]. Calendar features are recomputed from the dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceTable")]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<TickerColumns>,
    calendar: Vec<CalendarFeatures>,
}

#[derive(Deserialize)]
struct RawPriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<TickerColumns>,
    #[serde(default)]
    calendar: Vec<CalendarFeatures>,
}

impl TryFrom<RawPriceTable> for PriceTable {
    type Error = AnalyticsError;

    fn try_from(raw: RawPriceTable) -> Result<Self> {
        let mut table = PriceTable::new(raw.dates)?;
        for ticker in raw.tickers {
            for (field, values) in ticker.columns {
                table.insert_column(&ticker.symbol, field, values)?;
            }
        }
        if !raw.calendar.is_empty() {
            if raw.calendar.len() != table.len() {
                return Err(AnalyticsError::InvalidInput(format!(
                    "Table has {} calendar rows but {} dates",
                    raw.calendar.len(),
                    table.len()
                )));
            }
            table.attach_calendar();
        }
        Ok(table)
    }
}

impl PriceTable {
    /// Create a table with the given date axis and no columns.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self> {
        check_strictly_increasing(&dates)?;
        Ok(Self {
            dates,
            tickers: Vec::new(),
            calendar: Vec::new(),
        })
    }

    /// Insert or replace a column. NaN values are stored as missing.
    pub fn insert_column(
        &mut self,
        symbol: &str,
        field: PriceField,
        values: Vec<Option<f64>>,
    ) -> Result<()> {
        if values.len() != self.dates.len() {
            return Err(AnalyticsError::InvalidInput(format!(
                "Column {}/{} has {} values but the table has {} dates",
                symbol,
                field,
                values.len(),
                self.dates.len()
            )));
        }
        let values = values.into_iter().map(normalize).collect();
        let idx = match self.tickers.iter().position(|t| t.symbol == symbol) {
            Some(i) => i,
            None => {
                self.tickers.push(TickerColumns::new(symbol));
                self.tickers.len() - 1
            }
        };
        self.tickers[idx].columns.insert(field, values);
        Ok(())
    }

    /// Insert a series whose dates match the table's date axis.
    pub fn insert_series(
        &mut self,
        symbol: &str,
        field: PriceField,
        series: &PriceSeries,
    ) -> Result<()> {
        if series.dates() != self.dates.as_slice() {
            return Err(AnalyticsError::InvalidInput(format!(
                "Series {}/{} is not aligned with the table's dates",
                symbol, field
            )));
        }
        self.insert_column(symbol, field, series.values().to_vec())
    }

    /// Build a single-ticker table from one series.
    pub fn from_series(symbol: &str, field: PriceField, series: &PriceSeries) -> Result<Self> {
        let mut table = Self::new(series.dates().to_vec())?;
        table.insert_series(symbol, field, series)?;
        Ok(table)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Ticker symbols in insertion order.
    pub fn tickers(&self) -> impl Iterator<Item = &str> + '_ {
        self.tickers.iter().map(|t| t.symbol.as_str())
    }

    pub fn ticker_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn ticker_columns(&self) -> &[TickerColumns] {
        &self.tickers
    }

    pub fn ticker(&self, symbol: &str) -> Option<&TickerColumns> {
        self.tickers.iter().find(|t| t.symbol == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.ticker(symbol).is_some()
    }

    pub fn column(&self, symbol: &str, field: PriceField) -> Option<&[Option<f64>]> {
        self.ticker(symbol).and_then(|t| t.column(field))
    }

    /// Copy one column out as a [`PriceSeries`].
    pub fn series(&self, symbol: &str, field: PriceField) -> Option<PriceSeries> {
        self.column(symbol, field).map(|values| PriceSeries {
            dates: self.dates.clone(),
            values: values.to_vec(),
        })
    }

    /// Calendar features, one per row for preprocessed tables, empty otherwise.
    pub fn calendar(&self) -> &[CalendarFeatures] {
        &self.calendar
    }

    pub fn has_calendar(&self) -> bool {
        !self.calendar.is_empty() && self.calendar.len() == self.dates.len()
    }

    /// Derive calendar features for every row from the date axis.
    pub(crate) fn attach_calendar(&mut self) {
        self.calendar = self
            .dates
            .iter()
            .map(|d| CalendarFeatures::from_date(*d))
            .collect();
    }

    /// Rebuild every column on a new date axis.
    ///
    /// `f` maps an existing column to one with `dates.len()` values; `dates` must
    /// be strictly increasing. Calendar features survive only when the axis is
    /// unchanged.
    pub(crate) fn remap_columns(
        &self,
        dates: Vec<NaiveDate>,
        f: impl Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    ) -> PriceTable {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        let calendar = if dates == self.dates {
            self.calendar.clone()
        } else {
            Vec::new()
        };
        let tickers = self
            .tickers
            .iter()
            .map(|t| TickerColumns {
                symbol: t.symbol.clone(),
                columns: t
                    .columns
                    .iter()
                    .map(|(field, c)| {
                        let mapped = f(c);
                        debug_assert_eq!(mapped.len(), dates.len());
                        (*field, mapped)
                    })
                    .collect(),
            })
            .collect();
        PriceTable {
            dates,
            tickers,
            calendar,
        }
    }

    /// True when every column of every ticker is missing on row `idx`.
    pub fn row_is_missing(&self, idx: usize) -> bool {
        self.tickers
            .iter()
            .flat_map(|t| t.columns.values())
            .all(|c| c.get(idx).map_or(true, |v| v.is_none()))
    }

    /// Total number of missing cells across all columns.
    pub fn missing_count(&self) -> usize {
        self.tickers
            .iter()
            .flat_map(|t| t.columns.values())
            .map(|c| c.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Contiguous slice of rows, keeping all tickers and calendar features.
    pub fn slice(&self, rows: Range<usize>) -> PriceTable {
        let end = rows.end.min(self.dates.len());
        let start = rows.start.min(end);
        let range = start..end;
        PriceTable {
            dates: self.dates[range.clone()].to_vec(),
            tickers: self
                .tickers
                .iter()
                .map(|t| TickerColumns {
                    symbol: t.symbol.clone(),
                    columns: t
                        .columns
                        .iter()
                        .map(|(f, c)| (*f, c[range.clone()].to_vec()))
                        .collect(),
                })
                .collect(),
            calendar: if self.has_calendar() {
                self.calendar[range].to_vec()
            } else {
                Vec::new()
            },
        }
    }

    /// Keep the rows whose date satisfies `keep`, in order.
    pub fn filter_dates(&self, keep: impl Fn(NaiveDate) -> bool) -> PriceTable {
        let indices: Vec<usize> = (0..self.dates.len())
            .filter(|&i| keep(self.dates[i]))
            .collect();
        let pick = |c: &Vec<Option<f64>>| indices.iter().map(|&i| c[i]).collect::<Vec<_>>();
        PriceTable {
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
            tickers: self
                .tickers
                .iter()
                .map(|t| TickerColumns {
                    symbol: t.symbol.clone(),
                    columns: t.columns.iter().map(|(f, c)| (*f, pick(c))).collect(),
                })
                .collect(),
            calendar: if self.has_calendar() {
                indices.iter().map(|&i| self.calendar[i]).collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Keep only the given tickers, in the given order. Unknown symbols are ignored.
    pub fn select_tickers<S: AsRef<str>>(&self, symbols: &[S]) -> PriceTable {
        PriceTable {
            dates: self.dates.clone(),
            tickers: symbols
                .iter()
                .filter_map(|s| self.ticker(s.as_ref()).cloned())
                .collect(),
            calendar: self.calendar.clone(),
        }
    }
}
