//! KPIs, rankings, and chart series over a filtered subset.
//!
//! Grouping preserves first-encounter order so that ranking ties resolve to
//! the group seen first. Rows with an empty value for the grouped dimension
//! are not grouped.

use crate::filter::month_order;
use crate::schema::{AnalyticalRow, Dimension, Measure};
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct KpiSummary {
    /// Sum of selling prices.
    pub turnover: f64,
    pub cost: f64,
    pub profit: f64,
    /// `profit / cost * 100`, or 0 when cost is not positive.
    pub profit_pct: f64,
    /// Distinct non-empty customer names.
    pub customer_count: usize,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TopByCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TopBySum {
    pub value: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

impl SeriesPoint {
    fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

pub fn kpis(subset: &[&AnalyticalRow]) -> KpiSummary {
    let turnover: f64 = subset.iter().map(|r| r.selling_price).sum();
    let cost: f64 = subset.iter().map(|r| r.cost).sum();
    let profit: f64 = subset.iter().map(|r| r.profit()).sum();
    let profit_pct = if cost > 0.0 { profit / cost * 100.0 } else { 0.0 };

    let customers: BTreeSet<&str> = subset
        .iter()
        .map(|r| r.customer.as_str())
        .filter(|c| !c.is_empty())
        .collect();

    KpiSummary {
        turnover,
        cost,
        profit,
        profit_pct,
        customer_count: customers.len(),
        transaction_count: subset.len(),
    }
}

/// Folds rows into groups keyed by `key`, in first-encounter order.
fn group_by<'a, V, K, F>(subset: &[&'a AnalyticalRow], key: K, mut fold: F) -> Vec<(&'a str, V)>
where
    V: Default,
    K: Fn(&'a AnalyticalRow) -> &'a str,
    F: FnMut(&mut V, &'a AnalyticalRow),
{
    let mut groups: Vec<(&'a str, V)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for row in subset.iter().copied() {
        let k = key(row);
        if k.is_empty() {
            continue;
        }
        let slot = *index.entry(k).or_insert_with(|| {
            groups.push((k, V::default()));
            groups.len() - 1
        });
        fold(&mut groups[slot].1, row);
    }

    groups
}

pub fn count_by(subset: &[&AnalyticalRow], dimension: Dimension) -> Vec<(String, usize)> {
    group_by(subset, |r| dimension.value_of(r), |n: &mut usize, _| *n += 1)
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn sum_by(subset: &[&AnalyticalRow], dimension: Dimension, measure: Measure) -> Vec<(String, f64)> {
    group_by(
        subset,
        |r| dimension.value_of(r),
        |total: &mut f64, r| *total += measure.value_of(r),
    )
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// The most frequent value; the earliest group wins ties.
pub fn top_by_count(subset: &[&AnalyticalRow], dimension: Dimension) -> Option<TopByCount> {
    let mut best: Option<(String, usize)> = None;
    for (value, count) in count_by(subset, dimension) {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, count)| TopByCount { value, count })
}

/// The value with the greatest summed measure; the earliest group wins ties.
pub fn top_by_sum(
    subset: &[&AnalyticalRow],
    dimension: Dimension,
    measure: Measure,
) -> Option<TopBySum> {
    let mut best: Option<(String, f64)> = None;
    for (value, total) in sum_by(subset, dimension, measure) {
        if best.as_ref().map_or(true, |(_, t)| total > *t) {
            best = Some((value, total));
        }
    }
    best.map(|(value, total)| TopBySum { value, total })
}

/// Per-month-label sums in calendar order, only months present.
pub fn month_series(subset: &[&AnalyticalRow], measure: Measure) -> Vec<SeriesPoint> {
    let mut sums = sum_by(subset, Dimension::Month, measure);
    sums.sort_by_key(|(label, _)| month_order(label));
    sums.into_iter()
        .map(|(label, value)| SeriesPoint::new(label, value))
        .collect()
}

/// Each group's percentage of the summed measure. A zero total divides by 1.
pub fn share_by(subset: &[&AnalyticalRow], dimension: Dimension, measure: Measure) -> Vec<SeriesPoint> {
    let sums = sum_by(subset, dimension, measure);
    let total: f64 = sums.iter().map(|(_, v)| v).sum();
    let divisor = if total == 0.0 { 1.0 } else { total };
    sums.into_iter()
        .map(|(label, value)| SeriesPoint::new(label, value / divisor * 100.0))
        .collect()
}

/// Distinct non-empty values, sorted; used for chip lists.
pub fn distinct_values(subset: &[&AnalyticalRow], dimension: Dimension) -> Vec<String> {
    crate::filter::available_options(subset.iter().copied(), dimension)
}

fn points(pairs: Vec<(String, f64)>) -> Vec<SeriesPoint> {
    pairs
        .into_iter()
        .map(|(label, value)| SeriesPoint::new(label, value))
        .collect()
}

/// The series behind the dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct ChartSeries {
    pub country_transactions: Vec<SeriesPoint>,
    pub category_profit: Vec<SeriesPoint>,
    pub payment_mode_profit: Vec<SeriesPoint>,
    pub month_profit: Vec<SeriesPoint>,
    pub category_profit_share: Vec<SeriesPoint>,
    pub country_sales: Vec<SeriesPoint>,
    pub category_sales: Vec<SeriesPoint>,
    pub month_sales: Vec<SeriesPoint>,
}

impl ChartSeries {
    pub fn build(subset: &[&AnalyticalRow]) -> Self {
        Self {
            country_transactions: count_by(subset, Dimension::Country)
                .into_iter()
                .map(|(label, n)| SeriesPoint::new(label, n as f64))
                .collect(),
            category_profit: points(sum_by(subset, Dimension::Category, Measure::Profit)),
            payment_mode_profit: points(sum_by(subset, Dimension::PaymentMode, Measure::Profit)),
            month_profit: month_series(subset, Measure::Profit),
            category_profit_share: share_by(subset, Dimension::Category, Measure::Profit),
            country_sales: points(sum_by(subset, Dimension::Country, Measure::SellingPrice)),
            category_sales: points(sum_by(subset, Dimension::Category, Measure::SellingPrice)),
            month_sales: month_series(subset, Measure::SellingPrice),
        }
    }
}
