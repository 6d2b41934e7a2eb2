//! Configuration file support for pipeline runs.
//!
//! Allows loading pipeline configurations from TOML files for reproducibility.

use crate::data::DataConfig;
use crate::error::{AnalyticsError, Result};
use crate::split::{SplitConfig, DEFAULT_TEST_STEPS};
use crate::types::{DateRange, PriceField};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Complete pipeline configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input settings.
    #[serde(default)]
    pub data: DataSettings,
    /// Statistics settings.
    #[serde(default)]
    pub analysis: AnalysisSettings,
    /// Train/test split settings.
    #[serde(default)]
    pub split: SplitSettings,
    /// Output settings.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Portfolio file, one ticker per line. Without it every ticker is used.
    #[serde(default)]
    pub portfolio: Option<String>,
    /// Long-format price CSV file or directory of per-ticker CSV files.
    #[serde(default = "default_prices")]
    pub prices: String,
    /// First date to keep (YYYY-MM-DD).
    #[serde(default)]
    pub start_date: Option<String>,
    /// First date to drop (YYYY-MM-DD).
    #[serde(default)]
    pub end_date: Option<String>,
    /// Date format in the price files.
    #[serde(default)]
    pub date_format: Option<String>,
    /// Skip malformed rows instead of failing.
    #[serde(default = "default_true")]
    pub skip_invalid: bool,
}

fn default_prices() -> String { "data/prices.csv".to_string() }
fn default_true() -> bool { true }

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            portfolio: None,
            prices: default_prices(),
            start_date: None,
            end_date: None,
            date_format: None,
            skip_invalid: true,
        }
    }
}

/// Statistics settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Price column the statistics are computed on.
    #[serde(default)]
    pub field: PriceField,
}

/// Train/test split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSettings {
    #[serde(default = "default_test_steps")]
    pub test_steps: usize,
    #[serde(default)]
    pub start_train_date: Option<String>,
}

fn default_test_steps() -> usize { DEFAULT_TEST_STEPS }

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            test_steps: DEFAULT_TEST_STEPS,
            start_train_date: None,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Root directory for snapshots.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String { "data/output".to_string() }

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn parse_config_date(value: &Option<String>, key: &str) -> Result<Option<NaiveDate>> {
    value
        .as_deref()
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                AnalyticsError::ConfigError(format!(
                    "{} '{}' is not a YYYY-MM-DD date: {}",
                    key, s, e
                ))
            })
        })
        .transpose()
}

impl PipelineConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnalyticsError::ConfigError(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check dates and split parameters.
    pub fn validate(&self) -> Result<()> {
        self.date_range()?;
        self.split_config()?;
        Ok(())
    }

    /// Download window, end exclusive.
    pub fn date_range(&self) -> Result<DateRange> {
        let start = parse_config_date(&self.data.start_date, "data.start_date")?;
        let end = parse_config_date(&self.data.end_date, "data.end_date")?;
        DateRange::new(start, end).map_err(|e| AnalyticsError::ConfigError(e.to_string()))
    }

    pub fn split_config(&self) -> Result<SplitConfig> {
        if self.split.test_steps == 0 {
            return Err(AnalyticsError::ConfigError(
                "split.test_steps must be at least 1".to_string(),
            ));
        }
        Ok(SplitConfig {
            test_steps: self.split.test_steps,
            start_train_date: parse_config_date(
                &self.split.start_train_date,
                "split.start_train_date",
            )?,
        })
    }

    pub fn data_config(&self) -> DataConfig {
        DataConfig {
            date_format: self.data.date_format.clone(),
            skip_invalid: self.data.skip_invalid,
            ..Default::default()
        }
    }

    /// Directory the snapshots of this run are written to: the output root
    /// joined with the portfolio file stem.
    pub fn output_dir(&self) -> PathBuf {
        let stem = self
            .data
            .portfolio
            .as_deref()
            .and_then(|p| Path::new(p).file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("all");
        Path::new(&self.output.dir).join(stem)
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# StockPicker pipeline configuration

[data]
portfolio = "data/portfolios/big_tech.txt"
prices = "data/prices.csv"      # long-format CSV file or per-ticker directory
start_date = "2008-01-01"
end_date = "2023-01-01"         # exclusive
# date_format = "%Y-%m-%d"
skip_invalid = true

[analysis]
field = "Adj Close"

[split]
test_steps = 28
# start_train_date = "2015-01-01"

[output]
dir = "data/output"
"#
        .to_string()
    }
}
