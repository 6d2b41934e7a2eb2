//! Train/test partitioning that respects temporal ordering.

use crate::error::{AnalyticsError, Result};
use crate::types::PriceTable;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of newest rows held out for testing unless configured otherwise.
pub const DEFAULT_TEST_STEPS: usize = 28;

/// Train and test partitions of a price table.
///
/// Every train date is strictly earlier than every test date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub train: PriceTable,
    pub test: PriceTable,
}

impl Split {
    /// Last date of the training partition.
    pub fn train_end(&self) -> Option<NaiveDate> {
        self.train.last_date()
    }

    /// First date of the test partition.
    pub fn test_start(&self) -> Option<NaiveDate> {
        self.test.first_date()
    }
}

/// Split `table` into train and test partitions.
///
/// The test partition is the last `test_steps` rows. The train partition runs
/// from `start_train_date` (inclusive, or the first row when unset) through the
/// date `test_steps` calendar days before the table's last date. On a daily
/// table that is the day before the first test row. Rows on or after the first
/// test date never enter the train partition.
///
/// # Errors
/// [`AnalyticsError::InvalidRange`] when `test_steps` is zero, when it is not
/// smaller than the number of rows, or when `start_train_date` falls after the
/// train end date.
pub fn split_train_test(
    table: &PriceTable,
    test_steps: usize,
    start_train_date: Option<NaiveDate>,
) -> Result<Split> {
    let rows = table.len();
    if test_steps == 0 {
        return Err(AnalyticsError::InvalidRange(
            "test_steps must be at least 1".to_string(),
        ));
    }
    if test_steps >= rows {
        return Err(AnalyticsError::InvalidRange(format!(
            "test_steps ({}) must be smaller than the number of rows ({})",
            test_steps, rows
        )));
    }

    let last_date = table.last_date().ok_or(AnalyticsError::NoData)?;
    let train_end = last_date
        .checked_sub_days(Days::new(test_steps as u64))
        .ok_or_else(|| {
            AnalyticsError::InvalidRange(format!(
                "{} days before {} is out of the supported date range",
                test_steps, last_date
            ))
        })?;

    if let Some(start) = start_train_date {
        if start > train_end {
            return Err(AnalyticsError::InvalidRange(format!(
                "start_train_date {} is after the train end date {}",
                start, train_end
            )));
        }
    }

    let test_start = rows - test_steps;
    let train = table
        .slice(0..test_start)
        .filter_dates(|d| start_train_date.map_or(true, |s| d >= s) && d <= train_end);
    let test = table.slice(test_start..rows);

    if train.is_empty() {
        warn!(
            "Training partition is empty (train end {}, first row {:?})",
            train_end,
            table.first_date()
        );
    }
    debug!(
        "Split {} rows into {} train / {} test (train end {})",
        rows,
        train.len(),
        test.len(),
        train_end
    );

    Ok(Split { train, test })
}

/// Split parameters, defaulting to a 28-day test window over all history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_steps: usize,
    pub start_train_date: Option<NaiveDate>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_steps: DEFAULT_TEST_STEPS,
            start_train_date: None,
        }
    }
}

impl SplitConfig {
    pub fn new(test_steps: usize) -> Self {
        Self {
            test_steps,
            ..Default::default()
        }
    }

    /// Only train on rows from `date` onwards.
    pub fn with_start_train_date(mut self, date: NaiveDate) -> Self {
        self.start_train_date = Some(date);
        self
    }

    pub fn split(&self, table: &PriceTable) -> Result<Split> {
        split_train_test(table, self.test_steps, self.start_train_date)
    }
}
