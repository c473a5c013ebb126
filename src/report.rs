//! Data behind the downloadable report: KPIs, headline rankings and the
//! insight text that accompanies each chart. Layout is left to the caller.

use crate::aggregation::{count_by, kpis, month_series, top_by_sum, KpiSummary, TopByCount, TopBySum};
use crate::schema::{AnalyticalRow, Dimension, Measure};
use chrono::NaiveDateTime;
use log::debug;
use schemars::JsonSchema;
use serde::Serialize;

/// Shown wherever a ranking has no answer.
pub const PLACEHOLDER: &str = "—";

pub const REPORT_TIMESTAMP_FORMAT: &str = "%d %b %Y, %I:%M %p";

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ChartInsight {
    pub title: String,
    /// What the chart shows.
    pub note: String,
    /// What the data in it suggests.
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReportSummary {
    pub generated_at: String,
    pub kpis: KpiSummary,
    /// Most frequent product; ties go to the alphabetically first.
    pub top_product: Option<TopByCount>,
    /// Most frequent country.
    pub top_country: Option<TopByCount>,
    pub top_category_by_profit: Option<TopBySum>,
    pub top_product_by_profit: Option<TopBySum>,
    /// Calendar month with the highest sales, summed across years.
    pub peak_month: Option<String>,
    pub low_month: Option<String>,
    pub top_country_by_sales: Option<TopBySum>,
    pub key_insight: String,
    pub chart_insights: Vec<ChartInsight>,
    pub executive_summary: Vec<String>,
    pub preview: Vec<AnalyticalRow>,
}

impl ReportSummary {
    pub fn build(rows: &[&AnalyticalRow], generated_at: NaiveDateTime, preview_rows: usize) -> Self {
        let top_category_by_profit = top_by_sum(rows, Dimension::Category, Measure::Profit);
        let top_product_by_profit = top_by_sum(rows, Dimension::Product, Measure::Profit);
        let top_country_by_sales = top_by_sum(rows, Dimension::Country, Measure::SellingPrice);
        let (peak_month, low_month) = month_extremes(rows);

        let category = label_or_placeholder(top_category_by_profit.as_ref().map(|t| t.value.as_str()));
        let product = label_or_placeholder(top_product_by_profit.as_ref().map(|t| t.value.as_str()));
        let peak = label_or_placeholder(peak_month.as_deref());
        let low = label_or_placeholder(low_month.as_deref());
        let (country, country_sales) = match &top_country_by_sales {
            Some(t) => (t.value.as_str(), t.total),
            None => (PLACEHOLDER, 0.0),
        };

        let mut chart_insights = Vec::new();
        if top_category_by_profit.is_some() {
            chart_insights.push(ChartInsight {
                title: "Category vs Profit".to_string(),
                note: "Shows which product categories generate the highest overall profit.".to_string(),
                detail: format!(
                    "The '{}' category achieved the maximum profit. Consider increasing inventory, promotions, or similar SKUs.",
                    category
                ),
            });
        }
        if peak_month.is_some() {
            chart_insights.push(ChartInsight {
                title: "Monthly Sales Trend".to_string(),
                note: "Visualizes monthly fluctuations in total sales.".to_string(),
                detail: format!(
                    "Peak sales observed in {}. Lowest sales observed in {}. Consider seasonal promotions and inventory planning.",
                    peak, low
                ),
            });
        }
        if top_country_by_sales.is_some() {
            chart_insights.push(ChartInsight {
                title: "Country-wise Sales Share".to_string(),
                note: "Displays contribution of each country to total revenue.".to_string(),
                detail: format!(
                    "{} contributes the highest share ({}). Consider localised campaigns in other markets to diversify.",
                    country,
                    format_currency(country_sales)
                ),
            });
        }

        let executive_summary = vec![
            format!("Top profit category: {}", category),
            format!("Most profitable product: {}", product),
            format!("Top country: {} ({})", country, format_currency(country_sales)),
            format!("Peak sales month: {}  |  Lowest sales month: {}", peak, low),
            "Recommendation: Promote top categories, review costs for low-margin categories, and run seasonal campaigns."
                .to_string(),
        ];

        let key_insight = format!(
            "Key Insight: The {} category and {} product are driving most profits.",
            category, product
        );

        debug!(
            "Report built over {} rows with {} chart insight(s)",
            rows.len(),
            chart_insights.len()
        );

        Self {
            generated_at: generated_at.format(REPORT_TIMESTAMP_FORMAT).to_string(),
            kpis: kpis(rows),
            top_product: mode_of(rows, Dimension::Product),
            top_country: mode_of(rows, Dimension::Country),
            key_insight,
            top_category_by_profit,
            top_product_by_profit,
            peak_month,
            low_month,
            top_country_by_sales,
            chart_insights,
            executive_summary,
            preview: rows.iter().take(preview_rows).map(|r| (*r).clone()).collect(),
        }
    }
}

/// Most frequent value of `dimension`. Ties go to the smallest value, so the
/// result does not depend on row order.
fn mode_of(rows: &[&AnalyticalRow], dimension: Dimension) -> Option<TopByCount> {
    count_by(rows, dimension)
        .into_iter()
        .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then_with(|| b.cmp(a)))
        .map(|(value, count)| TopByCount { value, count })
}

/// Highest and lowest selling calendar months; the earlier month wins ties.
fn month_extremes(rows: &[&AnalyticalRow]) -> (Option<String>, Option<String>) {
    let series = month_series(rows, Measure::SellingPrice);
    let mut peak: Option<(&str, f64)> = None;
    let mut low: Option<(&str, f64)> = None;
    for point in &series {
        if peak.map_or(true, |(_, v)| point.value > v) {
            peak = Some((point.label.as_str(), point.value));
        }
        if low.map_or(true, |(_, v)| point.value < v) {
            low = Some((point.label.as_str(), point.value));
        }
    }
    (
        peak.map(|(label, _)| label.to_string()),
        low.map(|(label, _)| label.to_string()),
    )
}

fn label_or_placeholder(label: Option<&str>) -> &str {
    label.filter(|l| !l.is_empty()).unwrap_or(PLACEHOLDER)
}

/// Whole rupees with thousands separators, e.g. `₹1,234,567`.
pub fn format_currency(amount: f64) -> String {
    let whole = if amount.is_finite() { amount.trunc() as i64 } else { 0 };
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("₹-{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}
