use crate::error::{Result, SalesInsightError};
use crate::forecast::{MAX_HORIZON_MONTHS, MIN_HORIZON_MONTHS};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Horizon used when the caller does not pick one.
    pub default_horizon_months: u32,
    /// Number of rows included in a report preview.
    pub report_preview_rows: usize,
    /// Extra `chrono` format strings tried after the built-in date formats.
    pub extra_date_formats: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_horizon_months: 3,
            report_preview_rows: 30,
            extra_date_formats: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_HORIZON_MONTHS..=MAX_HORIZON_MONTHS).contains(&self.default_horizon_months) {
            return Err(SalesInsightError::InvalidConfig(format!(
                "default_horizon_months {} must be between {} and {}",
                self.default_horizon_months, MIN_HORIZON_MONTHS, MAX_HORIZON_MONTHS
            )));
        }

        if let Some(fmt) = self.extra_date_formats.iter().find(|f| f.trim().is_empty()) {
            return Err(SalesInsightError::InvalidConfig(format!(
                "extra_date_formats contains an empty format '{}'",
                fmt
            )));
        }

        Ok(())
    }
}
