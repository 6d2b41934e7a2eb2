//! Chart-ready aggregates of price data.
//!
//! These are the tabular inputs behind the dashboard views: relative price
//! evolution, candles per day or per calendar year, and seasonality buckets.

use crate::analytics::percentile;
use crate::error::{AnalyticsError, Result};
use crate::types::{CalendarFeatures, PriceField, PriceSeries, PriceTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// =============================================================================
// Relative Evolution
// =============================================================================

/// Express every value as the percent change from the first observation.
///
/// Missing values stay missing. A series without observations comes back with
/// every value missing.
pub fn relative_evolution(series: &PriceSeries) -> PriceSeries {
    let base = series.values().iter().find_map(|v| *v);
    series.map_values(|v| match (v, base) {
        (Some(v), Some(base)) => Some((v - base) / base * 100.0),
        _ => None,
    })
}

// =============================================================================
// Candles
// =============================================================================

/// Open/high/low/close summary of one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Adjusted close.
    pub close: f64,
}

/// Open/high/low/close summary of one calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearlyCandle {
    pub year: i32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `(close - open) / open` in percent.
    pub open_close_change: f64,
}

/// The four columns a candle is built from.
struct OhlcColumns<'a> {
    open: &'a [Option<f64>],
    high: &'a [Option<f64>],
    low: &'a [Option<f64>],
    close: &'a [Option<f64>],
}

fn ohlc_columns<'a>(table: &'a PriceTable, ticker: &str) -> Result<OhlcColumns<'a>> {
    let columns = table
        .ticker(ticker)
        .ok_or_else(|| AnalyticsError::UnknownTicker(ticker.to_string()))?;
    let get = |field: PriceField| {
        columns.column(field).ok_or_else(|| {
            AnalyticsError::DataError(format!("Ticker {} has no '{}' column", ticker, field))
        })
    };
    Ok(OhlcColumns {
        open: get(PriceField::Open)?,
        high: get(PriceField::High)?,
        low: get(PriceField::Low)?,
        close: get(PriceField::AdjClose)?,
    })
}

/// One candle per row where Open, High, Low and Adj Close are all present.
///
/// # Errors
/// [`AnalyticsError::UnknownTicker`] if the ticker is not in the table, and
/// [`AnalyticsError::DataError`] if one of the four columns is absent.
pub fn daily_candles(table: &PriceTable, ticker: &str) -> Result<Vec<Candle>> {
    let cols = ohlc_columns(table, ticker)?;
    let candles: Vec<Candle> = table
        .dates()
        .iter()
        .enumerate()
        .filter_map(|(i, &date)| {
            Some(Candle {
                date,
                open: cols.open[i]?,
                high: cols.high[i]?,
                low: cols.low[i]?,
                close: cols.close[i]?,
            })
        })
        .collect();
    debug!("{}: {} daily candles", ticker, candles.len());
    Ok(candles)
}

/// Running aggregate of one year.
#[derive(Default)]
struct YearAccumulator {
    open: Option<f64>,
    close: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
}

/// One candle per calendar year.
///
/// The open is the year's first valid Open, the close its last valid Adj Close,
/// and high and low the extremes of the High and Low columns. Years without a
/// valid open or close are skipped.
pub fn yearly_candles(table: &PriceTable, ticker: &str) -> Result<Vec<YearlyCandle>> {
    let cols = ohlc_columns(table, ticker)?;

    let mut years: BTreeMap<i32, YearAccumulator> = BTreeMap::new();
    for (i, date) in table.dates().iter().enumerate() {
        let acc = years
            .entry(CalendarFeatures::from_date(*date).year)
            .or_default();
        if acc.open.is_none() {
            acc.open = cols.open[i];
        }
        if cols.close[i].is_some() {
            acc.close = cols.close[i];
        }
        if let Some(h) = cols.high[i] {
            acc.high = Some(acc.high.map_or(h, |cur| cur.max(h)));
        }
        if let Some(l) = cols.low[i] {
            acc.low = Some(acc.low.map_or(l, |cur| cur.min(l)));
        }
    }

    let candles: Vec<YearlyCandle> = years
        .into_iter()
        .filter_map(|(year, acc)| {
            let open = acc.open?;
            let close = acc.close?;
            Some(YearlyCandle {
                year,
                open,
                high: acc.high.unwrap_or(f64::NAN),
                low: acc.low.unwrap_or(f64::NAN),
                close,
                open_close_change: (close - open) / open * 100.0,
            })
        })
        .collect();
    debug!("{}: {} yearly candles", ticker, candles.len());
    Ok(candles)
}

// =============================================================================
// Seasonality
// =============================================================================

/// Calendar key used to group a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seasonality {
    /// Month of year, 1-12.
    #[default]
    Month,
    /// Day of month, 1-31.
    DayOfMonth,
    /// Day of week, 0 = Monday.
    Weekday,
}

impl Seasonality {
    fn key(&self, date: NaiveDate) -> u32 {
        let features = CalendarFeatures::from_date(date);
        match self {
            Seasonality::Month => features.month,
            Seasonality::DayOfMonth => features.day,
            Seasonality::Weekday => features.weekday,
        }
    }
}

impl fmt::Display for Seasonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seasonality::Month => write!(f, "month"),
            Seasonality::DayOfMonth => write!(f, "day"),
            Seasonality::Weekday => write!(f, "weekday"),
        }
    }
}

impl FromStr for Seasonality {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "month" | "m" => Ok(Seasonality::Month),
            "day" | "day_of_month" | "d" => Ok(Seasonality::DayOfMonth),
            "weekday" | "day_of_week" | "w" => Ok(Seasonality::Weekday),
            other => Err(AnalyticsError::InvalidInput(format!(
                "Unknown seasonality '{}', expected month, day or weekday",
                other
            ))),
        }
    }
}

/// Distribution summary of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
}

impl BucketSummary {
    fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();
        let mean = if count == 0 {
            f64::NAN
        } else {
            sorted.iter().sum::<f64>() / count as f64
        };
        Self {
            count,
            mean,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Values of a series sharing one calendar key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBucket {
    pub key: u32,
    /// Observations in chronological order.
    pub values: Vec<f64>,
    pub summary: BucketSummary,
}

/// Group the observed values of `series` by calendar key.
///
/// Buckets are ordered by key. Keys without observations are omitted.
pub fn seasonality(series: &PriceSeries, by: Seasonality) -> Vec<SeasonalBucket> {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, value) in series.observed_with_dates() {
        groups.entry(by.key(date)).or_default().push(value);
    }

    groups
        .into_iter()
        .map(|(key, values)| SeasonalBucket {
            key,
            summary: BucketSummary::from_values(&values),
            values,
        })
        .collect()
}
