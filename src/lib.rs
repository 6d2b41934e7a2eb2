//! StockPicker - price analytics for stock portfolios.
//!
//! # Overview
//!
//! StockPicker takes a list of tickers and a date-indexed table of their prices
//! and derives what a stock dashboard needs:
//!
//! - **Statistics**: count, mean, sample std, quartiles, start/end change and the
//!   largest fall and rise of every ticker, ranked by relative change
//! - **Forecasting inputs**: daily reindexing, forward fill and calendar features
//! - **Train/test splits**: time-ordered partitions with a held-out test window
//! - **Chart data**: relative evolution, daily and yearly candles, seasonality
//! - **Snapshots**: CSV and JSON exports, driven by a TOML pipeline configuration
//!
//! # Quick Start
//!
//! ```no_run
//! use stockpicker::{
//!     analytics::compute_table_statistics,
//!     data::{load_prices_csv, DataConfig},
//!     types::PriceField,
//! };
//!
//! let table = load_prices_csv("data/prices.csv", &DataConfig::default()).unwrap();
//! for row in compute_table_statistics(&table, PriceField::AdjClose) {
//!     println!("{}: {:+.2}%", row.ticker, row.stats.rel_change);
//! }
//! ```
//!
//! # Preparing a forecast
//!
//! ```
//! use chrono::NaiveDate;
//! use stockpicker::{preprocess::preprocess, split::SplitConfig};
//! use stockpicker::types::{PriceField, PriceSeries, PriceTable};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
//! let series = PriceSeries::daily(start, &prices).unwrap();
//! let table = PriceTable::from_series("AAPL", PriceField::AdjClose, &series).unwrap();
//!
//! let split = SplitConfig::default().split(&preprocess(&table)).unwrap();
//! assert_eq!(split.test.len(), 28);
//! assert!(split.train_end() < split.test_start());
//! ```
//!
//! # Modules
//!
//! - [`types`]: Core data types (PriceField, PriceSeries, PriceTable)
//! - [`analytics`]: Per-ticker statistics, falls and rises, terminal formatting
//! - [`preprocess`]: Daily reindexing, trimming, forward fill, calendar features
//! - [`split`]: Train/test partitioning
//! - [`aggregate`]: Relative evolution, candles and seasonality buckets
//! - [`data`]: Portfolio files, CSV price loading and price sources
//! - [`export`]: CSV and JSON snapshots
//! - [`config`]: TOML configuration file support
//! - [`pipeline`]: End-to-end statistics run

pub mod aggregate;
pub mod analytics;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod preprocess;
pub mod split;
pub mod types;

// Re-exports for convenience
pub use aggregate::{
    daily_candles, relative_evolution, seasonality, yearly_candles, Candle, SeasonalBucket,
    Seasonality, YearlyCandle,
};
pub use analytics::{
    compute_statistics, compute_table_statistics, max_fall, max_rise, StatisticsFormatter,
    StatisticsRow, TickerStatistics,
};
pub use config::PipelineConfig;
pub use data::{
    filter_date_range, load_dir, load_portfolio, load_prices_csv, parse_portfolio,
    CsvPriceSource, DataConfig, DirPriceSource, PriceSource,
};
pub use error::{AnalyticsError, Result};
pub use pipeline::{run_pipeline, PipelineReport};
pub use preprocess::preprocess;
pub use split::{split_train_test, Split, SplitConfig};
pub use types::{CalendarFeatures, DateRange, PriceField, PriceSeries, PriceTable};
