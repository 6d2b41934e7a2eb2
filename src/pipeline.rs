//! End-to-end statistics run: read the portfolio, load its prices, rank the
//! tickers and save the snapshots.

use crate::analytics::{compute_table_statistics, TickerStatistics};
use crate::config::PipelineConfig;
use crate::data::{load_portfolio, source_for_path};
use crate::error::{AnalyticsError, Result};
use crate::export::{export_statistics_csv, export_table_csv};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// File name of the statistics snapshot.
pub const STATISTICS_FILE: &str = "price_statistics.csv";
/// File name of the price table snapshot.
pub const TICKER_DATA_FILE: &str = "ticker_data.csv";

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Tickers present in the loaded table, in portfolio order.
    pub tickers: Vec<String>,
    pub rows: usize,
    pub statistics: Vec<TickerStatistics>,
    pub statistics_path: PathBuf,
    pub ticker_data_path: PathBuf,
}

/// Run the pipeline described by `config`.
///
/// # Errors
/// Fails when the portfolio lists no tickers, when none of them has data, or on
/// any I/O error.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;

    let tickers = match &config.data.portfolio {
        Some(path) => {
            let tickers = load_portfolio(path)?;
            if tickers.is_empty() {
                return Err(AnalyticsError::DataError(format!(
                    "Portfolio {} lists no tickers",
                    path
                )));
            }
            tickers
        }
        None => Vec::new(),
    };

    let source = source_for_path(&config.data.prices, config.data_config());
    let table = source.fetch(&tickers, config.date_range()?)?;
    if table.is_empty() || table.ticker_count() == 0 {
        return Err(AnalyticsError::NoData);
    }

    let statistics = compute_table_statistics(&table, config.analysis.field);

    let out_dir = config.output_dir();
    fs::create_dir_all(&out_dir)?;
    let statistics_path = out_dir.join(STATISTICS_FILE);
    let ticker_data_path = out_dir.join(TICKER_DATA_FILE);
    export_statistics_csv(&statistics, &statistics_path)?;
    export_table_csv(&table, &ticker_data_path)?;

    info!(
        "Pipeline finished: {} tickers, {} rows, snapshots in {}",
        table.ticker_count(),
        table.len(),
        out_dir.display()
    );

    Ok(PipelineReport {
        tickers: table.tickers().map(String::from).collect(),
        rows: table.len(),
        statistics,
        statistics_path,
        ticker_data_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_inputs(dir: &TempDir) -> (String, String) {
        let prices = dir.path().join("prices.csv");
        fs::write(
            &prices,
            "Date,Ticker,Open,High,Low,Close,Adj Close\n\
             2024-01-02,AAPL,10,11,9,10,10\n\
             2024-01-02,MSFT,20,21,19,20,20\n\
             2024-01-03,AAPL,10,12,10,12,12\n\
             2024-01-03,MSFT,20,20,17,18,18\n\
             2024-01-04,AAPL,12,12,11,11,11\n\
             2024-01-04,MSFT,18,23,18,22,22\n",
        )
        .unwrap();
        let portfolio = dir.path().join("big_tech.txt");
        fs::write(&portfolio, "MSFT\naapl\nTSLA\n").unwrap();
        (
            prices.to_string_lossy().into_owned(),
            portfolio.to_string_lossy().into_owned(),
        )
    }

    #[test]
    fn test_run_pipeline() {
        let dir = TempDir::new().unwrap();
        let (prices, portfolio) = write_inputs(&dir);

        let mut config = PipelineConfig::default();
        config.data.prices = prices;
        config.data.portfolio = Some(portfolio);
        config.output.dir = dir.path().join("out").to_string_lossy().into_owned();

        let report = run_pipeline(&config).unwrap();
        assert_eq!(report.tickers, vec!["MSFT", "AAPL"]);
        assert_eq!(report.rows, 3);
        // MSFT +10%, AAPL +10% as well: the tie keeps portfolio order
        assert_eq!(report.statistics[0].ticker, "MSFT");
        assert_eq!(report.statistics[1].ticker, "AAPL");

        assert!(report.statistics_path.ends_with("big_tech/price_statistics.csv"));
        let csv = fs::read_to_string(&report.statistics_path).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("MSFT,3,"));
        assert!(report.ticker_data_path.exists());
    }

    #[test]
    fn test_run_pipeline_date_range() {
        let dir = TempDir::new().unwrap();
        let (prices, _) = write_inputs(&dir);

        let mut config = PipelineConfig::default();
        config.data.prices = prices;
        config.data.end_date = Some("2024-01-04".to_string());
        config.output.dir = dir.path().join("out").to_string_lossy().into_owned();

        let report = run_pipeline(&config).unwrap();
        assert_eq!(report.rows, 2);
        // AAPL 10 -> 12 beats MSFT 20 -> 18
        assert_eq!(report.statistics[0].ticker, "AAPL");
        assert!(report.statistics_path.ends_with("all/price_statistics.csv"));
    }

    #[test]
    fn test_run_pipeline_empty_portfolio() {
        let dir = TempDir::new().unwrap();
        let (prices, _) = write_inputs(&dir);
        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "# nothing here\n").unwrap();

        let mut config = PipelineConfig::default();
        config.data.prices = prices;
        config.data.portfolio = Some(empty.to_string_lossy().into_owned());
        assert!(matches!(
            run_pipeline(&config),
            Err(AnalyticsError::DataError(_))
        ));
    }
}
