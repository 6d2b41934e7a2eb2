//! Preparation of price tables for forecasting.
//!
//! [`preprocess`] runs the full chain: daily reindexing, trimming of empty
//! leading/trailing rows, forward fill, and calendar features. Each step is
//! also exposed on its own.

use crate::types::PriceTable;
use chrono::NaiveDate;
use tracing::debug;

/// Reindex the table to every calendar day between its first and last date.
///
/// Inserted days are missing in every column. Calendar features are dropped
/// when days are inserted.
pub fn reindex_daily(table: &PriceTable) -> PriceTable {
    let (first, last) = match (table.first_date(), table.last_date()) {
        (Some(f), Some(l)) => (f, l),
        _ => return PriceTable::default(),
    };

    let calendar: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    if calendar.len() == table.len() {
        return table.clone();
    }

    // Position of each input row on the daily axis
    let mut positions = Vec::with_capacity(table.len());
    let mut cursor = 0;
    for date in table.dates() {
        while calendar[cursor] < *date {
            cursor += 1;
        }
        positions.push(cursor);
    }

    debug!(
        "Reindexed {} rows onto {} calendar days",
        table.len(),
        calendar.len()
    );

    let len = calendar.len();
    table.remap_columns(calendar, |column| {
        let mut out = vec![None; len];
        for (value, &pos) in column.iter().zip(&positions) {
            out[pos] = *value;
        }
        out
    })
}

/// Drop leading and trailing rows in which every column is missing.
pub fn trim_missing(table: &PriceTable) -> PriceTable {
    let first = (0..table.len()).find(|&i| !table.row_is_missing(i));
    let last = (0..table.len()).rev().find(|&i| !table.row_is_missing(i));
    match (first, last) {
        (Some(first), Some(last)) => table.slice(first..last + 1),
        _ => PriceTable::default(),
    }
}

/// Carry the most recent observation forward over missing values.
///
/// Each column is filled independently. Values before a column's first
/// observation stay missing.
pub fn forward_fill(table: &PriceTable) -> PriceTable {
    table.remap_columns(table.dates().to_vec(), |column| {
        let mut last = None;
        column
            .iter()
            .map(|value| {
                if value.is_some() {
                    last = *value;
                }
                last
            })
            .collect()
    })
}

/// Attach day, weekday (0 = Monday), month and year to every row.
pub fn add_calendar_features(table: &PriceTable) -> PriceTable {
    let mut out = table.clone();
    out.attach_calendar();
    out
}

/// Reindex daily, trim empty edges, forward fill and attach calendar features.
///
/// An empty or entirely missing table yields an empty table.
pub fn preprocess(table: &PriceTable) -> PriceTable {
    let trimmed = trim_missing(&reindex_daily(table));
    if trimmed.is_empty() {
        return PriceTable::default();
    }
    let filled = forward_fill(&trimmed);
    debug!(
        "Preprocessed {} rows from {:?} to {:?}",
        filled.len(),
        filled.first_date(),
        filled.last_date()
    );
    add_calendar_features(&filled)
}
