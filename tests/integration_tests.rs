//! Integration tests for loading, analysing and exporting price data.

use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stockpicker::aggregate::{
    daily_candles, relative_evolution, seasonality, yearly_candles, Seasonality,
};
use stockpicker::analytics::compute_table_statistics;
use stockpicker::config::PipelineConfig;
use stockpicker::data::{
    load_dir, load_prices_csv, CsvPriceSource, DataConfig, DirPriceSource, PriceSource,
};
use stockpicker::export::{export_split_csv, export_statistics_csv, export_statistics_json};
use stockpicker::pipeline::run_pipeline;
use stockpicker::preprocess::preprocess;
use stockpicker::split::split_train_test;
use stockpicker::types::{DateRange, PriceField};
use stockpicker::AnalyticsError;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Two tickers over four trading days: AAA ends 50% up, BBB 5% down.
fn write_long_csv(dir: &Path) -> PathBuf {
    let path = dir.join("prices.csv");
    fs::write(
        &path,
        "Date,Ticker,Open,High,Low,Close,Adj Close,Volume\n\
         2024-01-02,AAA,10,10.5,9.5,10,10,1000\n\
         2024-01-02,BBB,20,20.5,19.5,20,20,1000\n\
         2024-01-03,AAA,10,12.5,10,12,12,1000\n\
         2024-01-03,BBB,20,20,17.5,18,18,1000\n\
         2024-01-04,AAA,12,12,8.5,9,9,1000\n\
         2024-01-04,BBB,18,22.5,18,22,22,1000\n\
         2024-01-05,AAA,9,15.5,9,15,15,1000\n\
         2024-01-05,BBB,22,22,18.5,19,19,1000\n",
    )
    .unwrap();
    path
}

/// Per-ticker files with gaps: AAA spans 40 days and skips some, BBB starts
/// on the fifth day.
fn write_price_dir(dir: &Path) {
    let start = date(2024, 1, 1);
    let mut aaa = String::from("Date,Open,High,Low,Close,Adj Close\n");
    let mut bbb = String::from("Date,Open,High,Low,Close,Adj Close\n");
    for i in 0..40i64 {
        let day = start + Duration::days(i);
        let p = 100.0 + i as f64;
        if i % 7 != 3 {
            aaa.push_str(&format!("{},{},{},{},{},{}\n", day, p, p + 1.0, p - 1.0, p, p));
        }
        if i >= 4 {
            let q = 50.0 + i as f64 * 0.5;
            bbb.push_str(&format!("{},{},{},{},{},{}\n", day, q, q + 1.0, q - 1.0, q, q));
        }
    }
    fs::write(dir.join("AAA.csv"), aaa).unwrap();
    fs::write(dir.join("BBB.csv"), bbb).unwrap();
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_statistics_from_long_csv() {
    let dir = TempDir::new().unwrap();
    let path = write_long_csv(dir.path());

    let table = load_prices_csv(&path, &DataConfig::default()).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["AAA", "BBB"]);

    let rows = compute_table_statistics(&table, PriceField::AdjClose);
    assert_eq!(rows[0].ticker, "AAA");
    assert_eq!(rows[1].ticker, "BBB");

    let aaa = &rows[0].stats;
    assert_eq!(aaa.count, 4);
    assert_eq!(aaa.mean, 11.5);
    assert_eq!(aaa.abs_change, 5.0);
    assert_eq!(aaa.rel_change, 50.0);
    // 12 -> 9 is the deepest fall, 9 -> 15 the strongest rise
    assert_eq!(aaa.max_fall, -0.25);
    assert_eq!(aaa.max_rise, 0.67);

    let bbb = &rows[1].stats;
    assert_eq!(bbb.rel_change, -5.0);
    assert_eq!(bbb.max_fall, -0.14);
}

#[test]
fn test_statistics_export_formats() {
    let dir = TempDir::new().unwrap();
    let path = write_long_csv(dir.path());
    let table = load_prices_csv(&path, &DataConfig::default()).unwrap();
    let rows = compute_table_statistics(&table, PriceField::Close);

    let csv_path = dir.path().join("out/stats.csv");
    export_statistics_csv(&rows, &csv_path).unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ticker,count,mean,std,min,25%"));
    assert!(lines[1].starts_with("AAA,4,11.5,"));

    let json_path = dir.path().join("out/stats.json");
    export_statistics_json(&rows, &json_path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let array = value.as_array().unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["ticker"], "AAA");
    assert_eq!(array[0]["50%"], 11.0);
}

#[test]
fn test_date_window_changes_ranking() {
    let dir = TempDir::new().unwrap();
    let path = write_long_csv(dir.path());
    let source = CsvPriceSource::new(&path, DataConfig::default());

    let range = DateRange::new(Some(date(2024, 1, 3)), Some(date(2024, 1, 5))).unwrap();
    let table = source.fetch(&[], range).unwrap();
    assert_eq!(table.dates(), &[date(2024, 1, 3), date(2024, 1, 4)]);

    // AAA 12 -> 9 (-25%), BBB 18 -> 22 (+22.22%)
    let rows = compute_table_statistics(&table, PriceField::AdjClose);
    assert_eq!(rows[0].ticker, "BBB");
    assert_eq!(rows[0].stats.rel_change, 22.22);
    assert_eq!(rows[1].stats.rel_change, -25.0);
}

// ============================================================================
// Forecast preparation
// ============================================================================

#[test]
fn test_directory_source_preprocess_and_split() {
    let dir = TempDir::new().unwrap();
    write_price_dir(dir.path());

    let source = DirPriceSource::new(dir.path(), DataConfig::default());
    let raw = source
        .fetch(&["AAA".to_string(), "BBB".to_string()], DateRange::all())
        .unwrap();
    assert!(raw.len() < 40);

    let table = preprocess(&raw);
    assert_eq!(table.len(), 40);
    assert_eq!(table.first_date(), Some(date(2024, 1, 1)));
    assert_eq!(table.last_date(), Some(date(2024, 2, 9)));
    assert!(table.has_calendar());

    // Skipped days carry the previous close forward
    let aaa = table.column("AAA", PriceField::AdjClose).unwrap();
    assert_eq!(aaa[3], Some(102.0));
    assert_eq!(aaa[4], Some(104.0));

    // BBB stays missing before its first observation
    let bbb = table.column("BBB", PriceField::AdjClose).unwrap();
    assert!(bbb[..4].iter().all(|v| v.is_none()));
    assert!(bbb[4..].iter().all(|v| v.is_some()));

    let split = split_train_test(&table, 10, None).unwrap();
    assert_eq!(split.train.len(), 30);
    assert_eq!(split.test.len(), 10);
    assert_eq!(split.train_end(), Some(date(2024, 1, 30)));
    assert_eq!(split.test_start(), Some(date(2024, 1, 31)));

    let out = dir.path().join("split");
    let (train_path, test_path) = export_split_csv(&split, &out).unwrap();
    let test_csv = fs::read_to_string(test_path).unwrap();
    let lines: Vec<&str> = test_csv.lines().collect();
    assert_eq!(lines.len(), 1 + 10 * 2);
    assert!(lines[0].ends_with(",day,weekday,month,year"));
    // 2024-01-31 is a Wednesday
    assert!(lines[1].starts_with("2024-01-31,AAA,"));
    assert!(lines[1].ends_with(",31,2,1,2024"));

    let reloaded = load_prices_csv(train_path, &DataConfig::default()).unwrap();
    assert_eq!(reloaded.len(), 30);
}

#[test]
fn test_split_with_start_train_date() {
    let dir = TempDir::new().unwrap();
    write_price_dir(dir.path());
    let table = preprocess(&load_dir(dir.path(), &["AAA"], &DataConfig::default()).unwrap());

    let split = split_train_test(&table, 5, Some(date(2024, 1, 15))).unwrap();
    assert_eq!(split.train.first_date(), Some(date(2024, 1, 15)));
    assert_eq!(split.train_end(), Some(date(2024, 2, 4)));
    assert_eq!(split.test.len(), 5);

    assert!(matches!(
        split_train_test(&table, 5, Some(date(2024, 2, 6))),
        Err(AnalyticsError::InvalidRange(_))
    ));
}

#[test]
fn test_directory_source_missing_tickers() {
    let dir = TempDir::new().unwrap();
    write_price_dir(dir.path());
    let source = DirPriceSource::new(dir.path(), DataConfig::default());

    let table = source
        .fetch(&["ZZZ".to_string(), "AAA".to_string()], DateRange::all())
        .unwrap();
    assert_eq!(table.tickers().collect::<Vec<_>>(), vec!["AAA"]);

    assert!(matches!(
        source.fetch(&["ZZZ".to_string()], DateRange::all()),
        Err(AnalyticsError::NoData)
    ));
    assert!(matches!(
        load_dir(dir.path(), &["ZZZ"], &DataConfig::default()),
        Err(AnalyticsError::IoError(_))
    ));
}

// ============================================================================
// Chart data
// ============================================================================

#[test]
fn test_candles_and_relative_evolution() {
    let dir = TempDir::new().unwrap();
    let path = write_long_csv(dir.path());
    let table = load_prices_csv(&path, &DataConfig::default()).unwrap();

    let candles = daily_candles(&table, "AAA").unwrap();
    assert_eq!(candles.len(), 4);
    assert_eq!(candles[1].date, date(2024, 1, 3));
    assert_eq!(candles[1].high, 12.5);
    assert_eq!(candles[1].close, 12.0);

    let yearly = yearly_candles(&table, "BBB").unwrap();
    assert_eq!(yearly.len(), 1);
    assert_eq!(yearly[0].year, 2024);
    assert_eq!(yearly[0].open, 20.0);
    assert_eq!(yearly[0].close, 19.0);
    assert_eq!(yearly[0].high, 22.5);
    assert_eq!(yearly[0].low, 17.5);
    assert_eq!(yearly[0].open_close_change, -5.0);

    let evolution = relative_evolution(&table.series("AAA", PriceField::AdjClose).unwrap());
    let values: Vec<f64> = evolution.observed();
    assert_eq!(values, vec![0.0, 20.0, -10.0, 50.0]);

    assert!(matches!(
        daily_candles(&table, "ZZZ"),
        Err(AnalyticsError::UnknownTicker(_))
    ));
}

#[test]
fn test_weekday_seasonality() {
    let dir = TempDir::new().unwrap();
    let path = write_long_csv(dir.path());
    let table = load_prices_csv(&path, &DataConfig::default()).unwrap();
    let series = table.series("AAA", PriceField::AdjClose).unwrap();

    // 2024-01-02 is a Tuesday
    let buckets = seasonality(&series, Seasonality::Weekday);
    let keys: Vec<u32> = buckets.iter().map(|b| b.key).collect();
    assert_eq!(keys, vec![1, 2, 3, 4]);
    assert_eq!(buckets[3].values, vec![15.0]);

    let monthly = seasonality(&series, Seasonality::Month);
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].summary.count, 4);
    assert_eq!(monthly[0].summary.max, 15.0);
}

// ============================================================================
// Configured pipeline
// ============================================================================

#[test]
fn test_pipeline_from_config_file() {
    let dir = TempDir::new().unwrap();
    let prices = write_long_csv(dir.path());
    let portfolio = dir.path().join("mixed.txt");
    fs::write(&portfolio, "# watch list\nbbb\nAAA\n").unwrap();
    let out = dir.path().join("output");

    let config_path = dir.path().join("stockpicker.toml");
    fs::write(
        &config_path,
        format!(
            "[data]\nportfolio = {:?}\nprices = {:?}\n\n\
             [analysis]\nfield = \"Close\"\n\n\
             [output]\ndir = {:?}\n",
            portfolio.to_string_lossy(),
            prices.to_string_lossy(),
            out.to_string_lossy()
        ),
    )
    .unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    let report = run_pipeline(&config).unwrap();

    assert_eq!(report.tickers, vec!["BBB", "AAA"]);
    assert_eq!(report.rows, 4);
    assert_eq!(report.statistics[0].ticker, "AAA");
    assert!(report.statistics_path.starts_with(out.join("mixed")));

    let data = fs::read_to_string(&report.ticker_data_path).unwrap();
    let lines: Vec<&str> = data.lines().collect();
    assert_eq!(lines[0], "Date,Ticker,Open,High,Low,Close,Adj Close");
    assert_eq!(lines.len(), 1 + 4 * 2);
    assert!(lines[1].starts_with("2024-01-02,BBB,20,"));
}
