//! Price statistics: descriptive summaries, start/end changes and the largest
//! peak-to-trough fall and trough-to-peak rise of a series.

use crate::error::Result;
use crate::types::{PriceField, PriceSeries, PriceTable};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tabled::{builder::Builder, settings::Style};
use tracing::{debug, warn};

/// Summary statistics of one price series.
///
/// Every statistic is computed on the non-missing values only. Degenerate inputs
/// yield NaN or infinities rather than errors:
/// - `std` is NaN with fewer than two values.
/// - `rel_change` is ±∞ (or NaN when `abs_change` is also zero) if the first value is zero.
/// - `max_fall` and `max_rise` are NaN with fewer than two values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
    /// Last value minus first value.
    pub abs_change: f64,
    /// `abs_change` as a percentage of the first value.
    pub rel_change: f64,
    /// Most negative fractional move from any earlier peak to any later trough.
    pub max_fall: f64,
    /// Largest fractional move from any earlier trough to any later peak.
    pub max_rise: f64,
}

impl StatisticsRow {
    /// Row for a series without any observations.
    pub fn empty() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            p50: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
            abs_change: f64::NAN,
            rel_change: f64::NAN,
            max_fall: f64::NAN,
            max_rise: f64::NAN,
        }
    }

    /// Copy with every float rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            count: self.count,
            mean: round2(self.mean),
            std: round2(self.std),
            min: round2(self.min),
            p25: round2(self.p25),
            p50: round2(self.p50),
            p75: round2(self.p75),
            max: round2(self.max),
            abs_change: round2(self.abs_change),
            rel_change: round2(self.rel_change),
            max_fall: round2(self.max_fall),
            max_rise: round2(self.max_rise),
        }
    }

    /// Float fields in column order, paired with their column names.
    pub fn float_columns(&self) -> [(&'static str, f64); 11] {
        [
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.p25),
            ("50%", self.p50),
            ("75%", self.p75),
            ("max", self.max),
            ("abs_change", self.abs_change),
            ("rel_change", self.rel_change),
            ("max_fall", self.max_fall),
            ("max_rise", self.max_rise),
        ]
    }
}

/// Statistics of one ticker, as emitted by [`compute_table_statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStatistics {
    pub ticker: String,
    #[serde(flatten)]
    pub stats: StatisticsRow,
}

/// Round to two decimals. NaN and infinities pass through.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}

/// Linear-interpolation percentile of an ascending slice, `q` in `[0, 1]`.
///
/// Returns NaN for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Best fractional move across all split points `i` in `[1, n-1]`.
///
/// `prior` folds the values strictly before `i` into a reference level, `later`
/// folds the values at or after `i` into a target level, and `better` picks
/// between candidate ratios `(target - reference) / reference`. The suffix
/// levels are precomputed right to left, the prefix level is carried left to
/// right, so the scan is linear.
fn split_point_extreme(
    values: &[f64],
    prior: fn(f64, f64) -> f64,
    later: fn(f64, f64) -> f64,
    better: fn(f64, f64) -> f64,
) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }

    let mut suffix = values.to_vec();
    for i in (0..n - 1).rev() {
        suffix[i] = later(suffix[i], suffix[i + 1]);
    }

    let mut reference = values[0];
    let mut best: Option<f64> = None;
    for i in 1..n {
        let ratio = (suffix[i] - reference) / reference;
        if ratio.is_nan() {
            return f64::NAN;
        }
        best = Some(best.map_or(ratio, |b| better(b, ratio)));
        reference = prior(reference, values[i]);
    }
    best.unwrap_or(f64::NAN)
}

/// Largest fractional fall from any earlier peak to any later trough.
///
/// Equal to `min over i of (min(x[i..]) - max(x[..i])) / max(x[..i])`.
/// Positive for strictly increasing input, since every later point is above
/// every earlier peak. NaN with fewer than two values.
pub fn max_fall(values: &[f64]) -> f64 {
    split_point_extreme(values, f64::max, f64::min, f64::min)
}

/// Largest fractional rise from any earlier trough to any later peak.
///
/// Equal to `max over i of (max(x[i..]) - min(x[..i])) / min(x[..i])`.
/// NaN with fewer than two values.
pub fn max_rise(values: &[f64]) -> f64 {
    split_point_extreme(values, f64::min, f64::max, f64::max)
}

/// Compute the statistics of one series at full precision.
pub fn compute_statistics(series: &PriceSeries) -> StatisticsRow {
    let values = series.observed();
    if values.is_empty() {
        return StatisticsRow::empty();
    }

    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean = mean(&values);
    let first = values[0];
    let last = values[values.len() - 1];
    let abs_change = last - first;

    StatisticsRow {
        count: values.len(),
        mean,
        std: sample_std(&values, mean),
        min: sorted[0],
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
        abs_change,
        rel_change: (abs_change / first) * 100.0,
        max_fall: max_fall(&values),
        max_rise: max_rise(&values),
    }
}

/// Descending order with NaN last.
fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Compute statistics for every ticker's `field` column.
///
/// Rows are ranked by descending `rel_change` at full precision. The sort is
/// stable, so ties keep the table's ticker order. Values are rounded to two
/// decimals only after ranking. Tickers without the requested column are skipped.
pub fn compute_table_statistics(table: &PriceTable, field: PriceField) -> Vec<TickerStatistics> {
    let mut rows: Vec<TickerStatistics> = table
        .tickers()
        .filter_map(|ticker| match table.series(ticker, field) {
            Some(series) => {
                let stats = compute_statistics(&series);
                debug!(
                    "{}: {} observations, rel_change {:.4}",
                    ticker, stats.count, stats.rel_change
                );
                Some(TickerStatistics {
                    ticker: ticker.to_string(),
                    stats,
                })
            }
            None => {
                warn!("Ticker {} has no '{}' column, skipping", ticker, field);
                None
            }
        })
        .collect();

    rows.sort_by(|a, b| descending_nan_last(a.stats.rel_change, b.stats.rel_change));

    for row in &mut rows {
        row.stats = row.stats.rounded();
    }
    rows
}

/// Format statistics tables for terminal display.
pub struct StatisticsFormatter;

impl StatisticsFormatter {
    /// Render the rows as a table. NaN cells are shown as `.`.
    pub fn to_table(rows: &[TickerStatistics]) -> String {
        let mut builder = Builder::new();
        let mut header = vec!["Ticker".to_string(), "count".to_string()];
        header.extend(
            StatisticsRow::empty()
                .float_columns()
                .iter()
                .map(|(name, _)| name.to_string()),
        );
        builder.push_record(header);

        for row in rows {
            let mut record = vec![row.ticker.clone(), row.stats.count.to_string()];
            record.extend(
                row.stats
                    .float_columns()
                    .iter()
                    .map(|(_, v)| Self::format_value(*v)),
            );
            builder.push_record(record);
        }

        builder.build().with(Style::rounded()).to_string()
    }

    /// Print the table with a short header naming the best and worst performer.
    pub fn print_report(rows: &[TickerStatistics]) {
        println!();
        println!("{}", " PRICE STATISTICS ".bold().blue());
        println!();

        if rows.is_empty() {
            println!("  No price data available.");
            return;
        }

        if let Some(best) = rows.first() {
            println!(
                "  Best performer:  {:<8} {}",
                best.ticker,
                Self::format_pct_change(best.stats.rel_change)
            );
        }
        if let Some(worst) = rows.iter().rev().find(|r| !r.stats.rel_change.is_nan()) {
            println!(
                "  Worst performer: {:<8} {}",
                worst.ticker,
                Self::format_pct_change(worst.stats.rel_change)
            );
        }
        println!();
        println!("{}", Self::to_table(rows));
    }

    /// Serialize the rows as pretty JSON. Non-finite numbers become `null`.
    pub fn to_json(rows: &[TickerStatistics]) -> Result<String> {
        Ok(serde_json::to_string_pretty(rows)?)
    }

    fn format_value(value: f64) -> String {
        if value.is_nan() {
            ".".to_string()
        } else {
            format!("{:.2}", value)
        }
    }

    fn format_pct_change(pct: f64) -> String {
        if pct.is_nan() {
            "(n/a)".to_string()
        } else if pct >= 0.0 {
            format!("(+{:.2}%)", pct).green().to_string()
        } else {
            format!("({:.2}%)", pct).red().to_string()
        }
    }
}
