//! # Sales Insight Engine
//!
//! A library for turning an uploaded sales table into dashboard data:
//! normalized rows, interlinked filter options, KPIs, rankings, chart series
//! and a short monthly sales forecast.
//!
//! ## Core Concepts
//!
//! - **Normalization**: Loosely typed cells become `AnalyticalRow`s. Bad amounts
//!   become 0, bad dates and ages become missing; only a missing cost column fails
//! - **Interlinked Filters**: AND across dimensions, OR within one. Every option
//!   list is recomputed from the filtered subset, so selectors narrow each other
//! - **Aggregation**: KPIs and rankings over the subset; profit is always
//!   `selling_price - cost`
//! - **Forecasting**: Monthly sales totals extended by a least-squares trend,
//!   or carried forward when history is short
//!
//! ## Example
//!
//! ```rust,ignore
//! use sales_insight_engine::*;
//!
//! let raw = RawTable::from_csv_path("sales.csv")?;
//! let dataset = SalesInsightProcessor::load(&raw, &EngineConfig::default())?;
//!
//! let state = FilterState::new()
//!     .with(Dimension::Category, ["Electronics"])
//!     .with(Dimension::Country, ["India", "UK"]);
//! let view = DashboardView::compute(&dataset.rows, &state);
//! println!("Turnover: {:.2}", view.kpis.turnover);
//!
//! let result = forecast(view.rows(&dataset.rows), 3);
//! println!("Next month: {}", result.next_month_value);
//! ```

pub mod aggregation;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod filter;
pub mod forecast;
pub mod ingestion;
pub mod report;
pub mod schema;
pub mod utils;

pub use aggregation::{
    count_by, distinct_values, kpis, month_series, share_by, sum_by, top_by_count, top_by_sum,
    ChartSeries, KpiSummary, SeriesPoint, TopByCount, TopBySum,
};
pub use config::EngineConfig;
pub use dashboard::{DashboardView, FilterSession, Highlights, Ticket};
pub use error::{Result, SalesInsightError};
pub use export::{search_rows, write_csv, write_template};
pub use filter::{apply, available_options, compute_options_and_subset, FilterOutcome, FilterState};
pub use forecast::{forecast, ForecastResult, PeriodValue};
pub use ingestion::{normalize, NormalizationStats, NormalizedDataset, Normalizer, RawTable};
pub use report::{ChartInsight, ReportSummary};
pub use schema::*;
pub use utils::*;

use chrono::NaiveDateTime;
use log::{debug, info};
use std::sync::Arc;

pub struct SalesInsightProcessor;

impl SalesInsightProcessor {
    /// Validates `config` and normalizes `raw` with it.
    pub fn load(raw: &RawTable, config: &EngineConfig) -> Result<NormalizedDataset> {
        config.validate()?;

        info!(
            "Loading sales table with {} columns and {} rows",
            raw.headers.len(),
            raw.rows.len()
        );

        let dataset = Normalizer::new(config).normalize(raw)?;

        if !dataset.stats.missing_columns.is_empty() {
            debug!(
                "Columns absent from upload, filled with defaults: {:?}",
                dataset.stats.missing_columns
            );
        }

        Ok(dataset)
    }

    /// Loads `raw` and opens a filter session with no active selection.
    pub fn open_session(raw: &RawTable, config: &EngineConfig) -> Result<FilterSession> {
        let dataset = Self::load(raw, config)?;
        Ok(FilterSession::new(Arc::new(dataset)))
    }

    /// Forecast over the rows matching `state`, at the configured default horizon.
    pub fn forecast_filtered(
        dataset: &NormalizedDataset,
        state: &FilterState,
        config: &EngineConfig,
    ) -> ForecastResult {
        let rows = dataset.rows.iter().filter(|row| state.matches(row));
        forecast(rows, i64::from(config.default_horizon_months))
    }

    /// Report data over the rows matching `state`.
    pub fn report_filtered(
        dataset: &NormalizedDataset,
        state: &FilterState,
        generated_at: NaiveDateTime,
        config: &EngineConfig,
    ) -> ReportSummary {
        let subset = apply(&dataset.rows, state);
        ReportSummary::build(&subset, generated_at, config.report_preview_rows)
    }
}

pub fn load_dataset(raw: &RawTable) -> Result<NormalizedDataset> {
    SalesInsightProcessor::load(raw, &EngineConfig::default())
}

pub fn load_dataset_with_config(raw: &RawTable, config: &EngineConfig) -> Result<NormalizedDataset> {
    SalesInsightProcessor::load(raw, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CSV: &str = "\
Customer Name,Age,Country,Product,Purchase Date,Purchase Amount,Payment Mode,Category,Selling Price
Asha,22,India,Phone,2025-01-05,60,UPI,Electronics,100
Ben,35,UK,Lamp,2025-02-11,80,Card,Home,150
Chen,52,India,Desk,2025-03-20,90,Cash,Home,200
";

    #[test]
    fn test_end_to_end_processing() {
        let raw = RawTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let dataset = load_dataset(&raw).unwrap();
        assert_eq!(dataset.rows.len(), 3);
        assert_eq!(dataset.cost_field, "Purchase Amount");

        let state = FilterState::new().with(Dimension::Category, ["Home"]);
        let view = DashboardView::compute(&dataset.rows, &state);
        assert_eq!(view.kpis.turnover, 350.0);
        assert_eq!(view.kpis.profit, 180.0);

        let result = SalesInsightProcessor::forecast_filtered(&dataset, &state, &EngineConfig::default());
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.forecast.len(), 3);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_loading() {
        let raw = RawTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let config = EngineConfig {
            default_horizon_months: 0,
            ..Default::default()
        };
        let err = load_dataset_with_config(&raw, &config).unwrap_err();
        assert!(matches!(err, SalesInsightError::InvalidConfig(_)));
    }

    #[test]
    fn test_report_uses_configured_preview_size() {
        let raw = RawTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let dataset = load_dataset(&raw).unwrap();
        let config = EngineConfig {
            report_preview_rows: 1,
            ..Default::default()
        };
        let at = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        let report = SalesInsightProcessor::report_filtered(&dataset, &FilterState::new(), at, &config);
        assert_eq!(report.preview.len(), 1);
        assert_eq!(report.generated_at, "01 Apr 2025, 09:30 AM");
        assert_eq!(report.top_country.as_ref().unwrap().value, "India");
    }

    #[test]
    fn test_session_from_processor() {
        let raw = RawTable::from_csv_reader(CSV.as_bytes()).unwrap();
        let session = SalesInsightProcessor::open_session(&raw, &EngineConfig::default()).unwrap();
        let view = session
            .update(FilterState::new().with(Dimension::Country, ["UK"]))
            .unwrap();
        assert_eq!(view.subset, vec![1]);
    }
}
