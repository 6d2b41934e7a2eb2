//! Command-line interface for the price analytics library.

use stockpicker::aggregate::{daily_candles, seasonality, yearly_candles, Seasonality};
use stockpicker::analytics::{compute_table_statistics, StatisticsFormatter};
use stockpicker::config::PipelineConfig;
use stockpicker::data::{load_portfolio, parse_date, source_for_path, DataConfig};
use stockpicker::error::{AnalyticsError, Result};
use stockpicker::export::{
    export_split_csv, export_statistics_csv, export_table_csv, statistics_to_csv,
};
use stockpicker::pipeline::run_pipeline;
use stockpicker::preprocess::preprocess;
use stockpicker::split::split_train_test;
use stockpicker::types::{DateRange, PriceField, PriceTable};

use clap::{Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// StockPicker - price statistics and forecasting inputs for stock portfolios.
#[derive(Parser)]
#[command(name = "stockpicker")]
#[command(version)]
#[command(about = "Price statistics, drawdowns and forecasting inputs for stock portfolios")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank tickers by price change and show their statistics
    Stats {
        /// Long-format price CSV file or directory of per-ticker CSV files
        #[arg(short, long)]
        prices: PathBuf,

        /// Portfolio file, one ticker per line (default: every ticker)
        #[arg(short = 'P', long)]
        portfolio: Option<PathBuf>,

        /// Price column to analyse
        #[arg(long, default_value = "Adj Close")]
        field: String,

        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// First date to exclude (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,

        /// Save the statistics table as CSV
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Reindex daily, forward fill and add calendar features for one ticker
    Preprocess {
        #[arg(short, long)]
        prices: PathBuf,

        #[arg(short, long)]
        ticker: String,

        /// Write the preprocessed table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split one ticker's preprocessed prices into train and test sets
    Split {
        #[arg(short, long)]
        prices: PathBuf,

        #[arg(short, long)]
        ticker: String,

        /// Number of newest days held out for testing
        #[arg(long, default_value = "28")]
        test_steps: usize,

        /// First training date (YYYY-MM-DD)
        #[arg(long)]
        start_train: Option<String>,

        /// Write train.csv and test.csv into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show daily or yearly candles of one ticker
    Candles {
        #[arg(short, long)]
        prices: PathBuf,

        #[arg(short, long)]
        ticker: String,

        /// One candle per calendar year
        #[arg(long)]
        yearly: bool,
    },

    /// Group one ticker's prices by month, day of month or weekday
    Seasonality {
        #[arg(short, long)]
        prices: PathBuf,

        #[arg(short, long)]
        ticker: String,

        /// Calendar key to group by
        #[arg(long, value_enum, default_value = "month")]
        by: SeasonalityArg,

        /// Price column to group
        #[arg(long, default_value = "Adj Close")]
        field: String,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "stockpicker.toml")]
        output: PathBuf,
    },

    /// Run the statistics pipeline from a configuration file
    RunConfig {
        /// Path to TOML configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum SeasonalityArg {
    Month,
    Day,
    Weekday,
}

impl From<SeasonalityArg> for Seasonality {
    fn from(arg: SeasonalityArg) -> Self {
        match arg {
            SeasonalityArg::Month => Seasonality::Month,
            SeasonalityArg::Day => Seasonality::DayOfMonth,
            SeasonalityArg::Weekday => Seasonality::Weekday,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("Logging was already initialised");
        }
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Stats {
            prices,
            portfolio,
            field,
            start,
            end,
            save,
        } => run_stats(
            prices,
            portfolio.as_ref(),
            field,
            start.as_deref(),
            end.as_deref(),
            save.as_ref(),
            cli.format,
        ),

        Commands::Preprocess {
            prices,
            ticker,
            output,
        } => run_preprocess(prices, ticker, output.as_ref()),

        Commands::Split {
            prices,
            ticker,
            test_steps,
            start_train,
            output_dir,
        } => run_split(
            prices,
            ticker,
            *test_steps,
            start_train.as_deref(),
            output_dir.as_ref(),
        ),

        Commands::Candles {
            prices,
            ticker,
            yearly,
        } => run_candles(prices, ticker, *yearly, cli.format),

        Commands::Seasonality {
            prices,
            ticker,
            by,
            field,
        } => run_seasonality(prices, ticker, (*by).into(), field, cli.format),

        Commands::Init { output } => init_config(output),

        Commands::RunConfig { config } => run_from_config(config, cli.format),
    }
}

fn parse_date_arg(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(|s| parse_date(s, None)).transpose()
}

/// Load the requested tickers from a price file or directory.
fn load_table(prices: &PathBuf, tickers: &[String], range: DateRange) -> Result<PriceTable> {
    let source = source_for_path(prices, DataConfig::default());
    let table = source.fetch(tickers, range)?;
    if table.is_empty() {
        return Err(AnalyticsError::NoData);
    }
    Ok(table)
}

/// Load a single ticker, failing if it has no data.
fn load_ticker(prices: &PathBuf, ticker: &str) -> Result<(String, PriceTable)> {
    let ticker = ticker.trim().to_uppercase();
    let table = load_table(prices, std::slice::from_ref(&ticker), DateRange::all())?;
    if !table.contains(&ticker) {
        return Err(AnalyticsError::UnknownTicker(ticker));
    }
    Ok((ticker, table))
}

fn print_table(header: &[&str], records: Vec<Vec<String>>) {
    let mut builder = Builder::new();
    builder.push_record(header.iter().map(|h| h.to_string()));
    for record in records {
        builder.push_record(record);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn format_option(value: Option<NaiveDate>) -> String {
    value.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn run_stats(
    prices: &PathBuf,
    portfolio: Option<&PathBuf>,
    field: &str,
    start: Option<&str>,
    end: Option<&str>,
    save: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let field: PriceField = field.parse()?;
    let range = DateRange::new(parse_date_arg(start)?, parse_date_arg(end)?)?;
    let tickers = match portfolio {
        Some(path) => load_portfolio(path)?,
        None => Vec::new(),
    };

    let table = load_table(prices, &tickers, range)?;
    info!(
        "Computing '{}' statistics for {} tickers over {} rows",
        field,
        table.ticker_count(),
        table.len()
    );
    let rows = compute_table_statistics(&table, field);

    match format {
        OutputFormat::Text => StatisticsFormatter::print_report(&rows),
        OutputFormat::Json => println!("{}", StatisticsFormatter::to_json(&rows)?),
        OutputFormat::Csv => print!("{}", statistics_to_csv(&rows)),
    }

    if let Some(path) = save {
        export_statistics_csv(&rows, path)?;
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn run_preprocess(prices: &PathBuf, ticker: &str, output: Option<&PathBuf>) -> Result<()> {
    let (ticker, table) = load_ticker(prices, ticker)?;
    let processed = preprocess(&table);

    println!("Preprocessed {}:", ticker);
    println!("  Input rows:  {}", table.len());
    println!("  Output rows: {}", processed.len());
    println!(
        "  Range:       {} to {}",
        format_option(processed.first_date()),
        format_option(processed.last_date())
    );
    println!("  Missing:     {}", processed.missing_count());

    if let Some(path) = output {
        export_table_csv(&processed, path)?;
        println!("  Saved: {}", path.display());
    }
    Ok(())
}

fn run_split(
    prices: &PathBuf,
    ticker: &str,
    test_steps: usize,
    start_train: Option<&str>,
    output_dir: Option<&PathBuf>,
) -> Result<()> {
    let (ticker, table) = load_ticker(prices, ticker)?;
    let processed = preprocess(&table);
    let split = split_train_test(&processed, test_steps, parse_date_arg(start_train)?)?;

    println!("\nData Split ({}):", ticker);
    print_table(
        &["Set", "Rows", "First", "Last"],
        vec![
            vec![
                "train".to_string(),
                split.train.len().to_string(),
                format_option(split.train.first_date()),
                format_option(split.train.last_date()),
            ],
            vec![
                "test".to_string(),
                split.test.len().to_string(),
                format_option(split.test.first_date()),
                format_option(split.test.last_date()),
            ],
        ],
    );

    if let Some(dir) = output_dir {
        let (train, test) = export_split_csv(&split, dir)?;
        println!("  Saved: {}", train.display());
        println!("  Saved: {}", test.display());
    }
    Ok(())
}

fn run_candles(prices: &PathBuf, ticker: &str, yearly: bool, format: OutputFormat) -> Result<()> {
    let (ticker, table) = load_ticker(prices, ticker)?;

    if yearly {
        let candles = yearly_candles(&table, &ticker)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&candles)?),
            OutputFormat::Csv => {
                println!("year,open,high,low,close,open_close_change");
                for c in &candles {
                    println!(
                        "{},{},{},{},{},{}",
                        c.year, c.open, c.high, c.low, c.close, c.open_close_change
                    );
                }
            }
            OutputFormat::Text => {
                let records = candles
                    .iter()
                    .map(|c| {
                        let change = format!("{:+.2}%", c.open_close_change);
                        let change = if c.open_close_change >= 0.0 {
                            change.green()
                        } else {
                            change.red()
                        };
                        vec![
                            c.year.to_string(),
                            format!("{:.2}", c.open),
                            format!("{:.2}", c.high),
                            format!("{:.2}", c.low),
                            format!("{:.2}", c.close),
                            change.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["Year", "Open", "High", "Low", "Close", "Change"], records);
            }
        }
    } else {
        let candles = daily_candles(&table, &ticker)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&candles)?),
            OutputFormat::Csv => {
                println!("date,open,high,low,close");
                for c in &candles {
                    println!("{},{},{},{},{}", c.date, c.open, c.high, c.low, c.close);
                }
            }
            OutputFormat::Text => {
                let records = candles
                    .iter()
                    .map(|c| {
                        vec![
                            c.date.to_string(),
                            format!("{:.2}", c.open),
                            format!("{:.2}", c.high),
                            format!("{:.2}", c.low),
                            format!("{:.2}", c.close),
                        ]
                    })
                    .collect();
                print_table(&["Date", "Open", "High", "Low", "Close"], records);
            }
        }
    }
    Ok(())
}

fn run_seasonality(
    prices: &PathBuf,
    ticker: &str,
    by: Seasonality,
    field: &str,
    format: OutputFormat,
) -> Result<()> {
    let field: PriceField = field.parse()?;
    let (ticker, table) = load_ticker(prices, ticker)?;
    let series = table.series(&ticker, field).ok_or_else(|| {
        AnalyticsError::DataError(format!("Ticker {} has no '{}' column", ticker, field))
    })?;
    let buckets = seasonality(&series, by);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&buckets)?),
        OutputFormat::Csv => {
            println!("{},count,mean,min,25%,50%,75%,max", by);
            for b in &buckets {
                let s = &b.summary;
                println!(
                    "{},{},{},{},{},{},{},{}",
                    b.key, s.count, s.mean, s.min, s.p25, s.p50, s.p75, s.max
                );
            }
        }
        OutputFormat::Text => {
            let by_name = by.to_string();
            let records = buckets
                .iter()
                .map(|b| {
                    let s = &b.summary;
                    vec![
                        b.key.to_string(),
                        s.count.to_string(),
                        format!("{:.2}", s.mean),
                        format!("{:.2}", s.min),
                        format!("{:.2}", s.p25),
                        format!("{:.2}", s.p50),
                        format!("{:.2}", s.p75),
                        format!("{:.2}", s.max),
                    ]
                })
                .collect();
            println!("\n{} '{}' by {}:", ticker, field, by_name);
            print_table(
                &[by_name.as_str(), "count", "mean", "min", "25%", "50%", "75%", "max"],
                records,
            );
        }
    }
    Ok(())
}

fn init_config(output: &PathBuf) -> Result<()> {
    fs::write(output, PipelineConfig::example())?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to point at your portfolio and prices, then run:");
    println!("  stockpicker run-config -c {}", output.display());
    Ok(())
}

fn run_from_config(config_path: &PathBuf, format: OutputFormat) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let report = run_pipeline(&config)?;

    match format {
        OutputFormat::Text => {
            StatisticsFormatter::print_report(&report.statistics);
            println!("  Saved: {}", report.statistics_path.display());
            println!("  Saved: {}", report.ticker_data_path.display());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Csv => print!("{}", statistics_to_csv(&report.statistics)),
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
