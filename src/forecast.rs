//! Monthly sales forecasting.
//!
//! Transactions are summed per calendar month. With at least three months of
//! finite history an ordinary least-squares line is fitted against the month's
//! position in the series (not its calendar distance, so gaps are skipped);
//! otherwise the last observed month is carried forward.

use crate::schema::AnalyticalRow;
use crate::utils::{add_months, format_period, month_start, months_between, round_to};
use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

pub const MIN_HORIZON_MONTHS: u32 = 1;
pub const MAX_HORIZON_MONTHS: u32 = 12;

/// Months of history needed before a trend line is fitted.
pub const MIN_TREND_MONTHS: usize = 3;

pub const NO_DATA_NOTE: &str = "No data to forecast.";
pub const NO_VALID_DATES_NOTE: &str = "No valid dates/sales.";
pub const SHORT_HISTORY_NOTE: &str = "Very little history. Forecast may be naive.";

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PeriodValue {
    /// `YYYY-MM`
    pub period: String,
    pub sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ForecastResult {
    pub history: Vec<PeriodValue>,
    pub forecast: Vec<PeriodValue>,
    /// First forecast value rounded to cents, or 0 when nothing was forecast.
    pub next_month_value: f64,
    /// Advisory text; empty when the history was long enough for a trend.
    pub note: String,
}

impl ForecastResult {
    fn empty(note: &str) -> Self {
        Self {
            history: Vec::new(),
            forecast: Vec::new(),
            next_month_value: 0.0,
            note: note.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForecastMethod {
    LinearTrend,
    CarryForward,
}

pub fn clamp_horizon(requested: i64) -> u32 {
    requested.clamp(MIN_HORIZON_MONTHS as i64, MAX_HORIZON_MONTHS as i64) as u32
}

/// Sums selling prices per calendar month, ascending. Undated rows are dropped.
pub fn monthly_sales<'a, I>(rows: I) -> BTreeMap<NaiveDate, f64>
where
    I: IntoIterator<Item = &'a AnalyticalRow>,
{
    let mut monthly: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        if let Some(date) = row.purchase_date() {
            let sales = if row.selling_price.is_finite() {
                row.selling_price
            } else {
                0.0
            };
            *monthly.entry(month_start(date)).or_insert(0.0) += sales;
        }
    }
    monthly
}

/// Least-squares `(intercept, slope)` of `values` against `t = 0..n-1`.
pub fn fit_linear_trend(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let t_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (t, y) in values.iter().enumerate() {
        let dt = t as f64 - t_mean;
        sxy += dt * (y - y_mean);
        sxx += dt * dt;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * t_mean;
    Some((intercept, slope))
}

fn choose_method(values: &[f64]) -> ForecastMethod {
    if values.len() >= MIN_TREND_MONTHS && values.iter().all(|v| v.is_finite()) {
        ForecastMethod::LinearTrend
    } else {
        ForecastMethod::CarryForward
    }
}

fn extrapolate(values: &[f64], horizon: u32) -> Vec<f64> {
    let last = values.last().copied().unwrap_or(0.0);

    let trend = match choose_method(values) {
        ForecastMethod::LinearTrend => fit_linear_trend(values),
        ForecastMethod::CarryForward => None,
    };

    match trend {
        Some((intercept, slope)) => {
            let last_t = (values.len() - 1) as f64;
            debug!(
                "Linear trend over {} months: intercept {:.4}, slope {:.4}",
                values.len(),
                intercept,
                slope
            );
            (1..=horizon)
                .map(|h| {
                    let predicted = intercept + slope * (last_t + h as f64);
                    let value = if predicted.is_finite() { predicted } else { last };
                    value.max(0.0)
                })
                .collect()
        }
        None => {
            debug!("Carrying forward last month value {:.2}", last);
            vec![last; horizon as usize]
        }
    }
}

/// Forecasts `horizon` months past the last month with sales.
///
/// Never fails: empty or undated input yields an empty result with a note.
pub fn forecast<'a, I>(rows: I, horizon: i64) -> ForecastResult
where
    I: IntoIterator<Item = &'a AnalyticalRow>,
{
    let horizon = clamp_horizon(horizon);

    let mut row_count = 0usize;
    let monthly = monthly_sales(rows.into_iter().inspect(|_| row_count += 1));

    if row_count == 0 {
        return ForecastResult::empty(NO_DATA_NOTE);
    }

    let Some((&last_month, _)) = monthly.iter().next_back() else {
        return ForecastResult::empty(NO_VALID_DATES_NOTE);
    };

    info!(
        "Forecasting {} month(s) from {} month(s) of history",
        horizon,
        monthly.len()
    );

    if let Some((&first_month, _)) = monthly.iter().next() {
        let span = months_between(first_month, last_month) + 1;
        if span as usize > monthly.len() {
            debug!(
                "History spans {} months but only {} have sales",
                span,
                monthly.len()
            );
        }
    }

    let history: Vec<PeriodValue> = monthly
        .iter()
        .map(|(month, sales)| PeriodValue {
            period: format_period(*month),
            sales: *sales,
        })
        .collect();

    let values: Vec<f64> = monthly.values().copied().collect();
    let predictions = extrapolate(&values, horizon);

    let forecast: Vec<PeriodValue> = predictions
        .iter()
        .enumerate()
        .map(|(i, sales)| PeriodValue {
            period: format_period(add_months(last_month, i as u32 + 1)),
            sales: *sales,
        })
        .collect();

    let next_month_value = predictions
        .first()
        .map(|v| round_to(*v, 2))
        .unwrap_or(0.0);

    let note = if values.len() < MIN_TREND_MONTHS {
        SHORT_HISTORY_NOTE.to_string()
    } else {
        String::new()
    };

    ForecastResult {
        history,
        forecast,
        next_month_value,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RowFields;

    fn sale(year: i32, month: u32, day: u32, price: f64) -> AnalyticalRow {
        AnalyticalRow::new(RowFields {
            purchase_date: NaiveDate::from_ymd_opt(year, month, day),
            selling_price: price,
            ..Default::default()
        })
    }

    fn undated(price: f64) -> AnalyticalRow {
        AnalyticalRow::new(RowFields {
            selling_price: price,
            ..Default::default()
        })
    }

    #[test]
    fn test_clamp_horizon() {
        assert_eq!(clamp_horizon(-4), 1);
        assert_eq!(clamp_horizon(0), 1);
        assert_eq!(clamp_horizon(6), 6);
        assert_eq!(clamp_horizon(99), 12);
    }

    #[test]
    fn test_linear_trend_three_months() {
        let rows = vec![
            sale(2025, 1, 5, 100.0),
            sale(2025, 2, 5, 150.0),
            sale(2025, 3, 5, 200.0),
        ];
        let result = forecast(&rows, 1);

        assert_eq!(result.history.len(), 3);
        assert_eq!(result.history[0].period, "2025-01");
        assert_eq!(result.forecast.len(), 1);
        assert_eq!(result.forecast[0].period, "2025-04");
        assert!((result.forecast[0].sales - 250.0).abs() < 1e-9);
        assert_eq!(result.next_month_value, 250.0);
        assert_eq!(result.note, "");
    }

    #[test]
    fn test_fit_linear_trend() {
        let (a, b) = fit_linear_trend(&[100.0, 150.0, 200.0]).unwrap();
        assert!((a - 100.0).abs() < 1e-9);
        assert!((b - 50.0).abs() < 1e-9);
        assert_eq!(fit_linear_trend(&[1.0]), None);
    }

    #[test]
    fn test_rows_in_same_month_are_summed() {
        let rows = vec![
            sale(2025, 1, 2, 40.0),
            sale(2025, 1, 28, 60.0),
            undated(1_000.0),
        ];
        let monthly = monthly_sales(&rows);
        assert_eq!(monthly.len(), 1);
        assert_eq!(
            monthly.get(&NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            Some(&100.0)
        );
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<AnalyticalRow> = Vec::new();
        let result = forecast(&rows, 3);
        assert!(result.history.is_empty());
        assert!(result.forecast.is_empty());
        assert_eq!(result.next_month_value, 0.0);
        assert_eq!(result.note, NO_DATA_NOTE);
    }

    #[test]
    fn test_no_valid_dates() {
        let rows = vec![undated(10.0), undated(20.0)];
        let result = forecast(&rows, 3);
        assert!(result.history.is_empty());
        assert_eq!(result.next_month_value, 0.0);
        assert_eq!(result.note, NO_VALID_DATES_NOTE);
    }

    #[test]
    fn test_single_month_carries_forward() {
        let rows = vec![sale(2024, 12, 1, 80.0)];
        let result = forecast(&rows, 2);
        assert_eq!(result.history.len(), 1);
        assert_eq!(
            result.forecast,
            vec![
                PeriodValue { period: "2025-01".to_string(), sales: 80.0 },
                PeriodValue { period: "2025-02".to_string(), sales: 80.0 },
            ]
        );
        assert_eq!(result.note, SHORT_HISTORY_NOTE);
    }

    #[test]
    fn test_two_months_is_flat_repeat() {
        let rows = vec![sale(2025, 1, 1, 100.0), sale(2025, 2, 1, 300.0)];
        for horizon in [1, 3, 6, 12] {
            let result = forecast(&rows, horizon);
            assert_eq!(result.forecast.len(), horizon as usize);
            assert!(result.forecast.iter().all(|p| p.sales == 300.0));
            assert_eq!(result.next_month_value, 300.0);
            assert!(!result.note.is_empty());
        }
    }

    #[test]
    fn test_negative_predictions_are_floored() {
        let rows = vec![
            sale(2025, 1, 1, 300.0),
            sale(2025, 2, 1, 200.0),
            sale(2025, 3, 1, 100.0),
        ];
        let result = forecast(&rows, 3);
        let sales: Vec<f64> = result.forecast.iter().map(|p| p.sales).collect();
        assert!((sales[0] - 0.0).abs() < 1e-9);
        assert_eq!(sales[1], 0.0);
        assert_eq!(sales[2], 0.0);
    }

    #[test]
    fn test_gaps_use_series_position_and_calendar_continues() {
        // Jan, Feb, then May: regression treats them as t = 0, 1, 2
        let rows = vec![
            sale(2025, 1, 1, 10.0),
            sale(2025, 2, 1, 20.0),
            sale(2025, 5, 1, 30.0),
        ];
        let result = forecast(&rows, 2);
        let periods: Vec<&str> = result.forecast.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2025-06", "2025-07"]);
        assert!((result.forecast[0].sales - 40.0).abs() < 1e-9);
        assert!((result.forecast[1].sales - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_horizon_is_clamped() {
        let rows = vec![sale(2025, 1, 1, 10.0)];
        assert_eq!(forecast(&rows, 0).forecast.len(), 1);
        assert_eq!(forecast(&rows, 40).forecast.len(), 12);
    }

    #[test]
    fn test_non_finite_history_carries_forward() {
        let values = [f64::MAX, f64::MAX, 1.0];
        // f64::MAX + f64::MAX overflows when the series is summed for the mean
        assert_eq!(choose_method(&values), ForecastMethod::LinearTrend);
        let (intercept, slope) = fit_linear_trend(&values).unwrap();
        assert!(!(intercept + slope * 3.0).is_finite());
        // Each non-finite step falls back to the last observed month.
        assert_eq!(extrapolate(&values, 2), vec![1.0, 1.0]);

        let values = [1.0, f64::INFINITY, 3.0];
        assert_eq!(choose_method(&values), ForecastMethod::CarryForward);
        assert_eq!(extrapolate(&values, 2), vec![3.0, 3.0]);
    }
}
