use crate::aggregation::{ChartSeries, KpiSummary, TopByCount, TopBySum};
use crate::dashboard::DashboardView;
use crate::error::SalesInsightError;
use crate::forecast::{ForecastResult, PeriodValue};
use crate::report::ReportSummary;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const CUSTOMER_COLUMN: &str = "Customer Name";
pub const AGE_COLUMN: &str = "Age";
pub const COUNTRY_COLUMN: &str = "Country";
pub const PRODUCT_COLUMN: &str = "Product";
pub const PURCHASE_DATE_COLUMN: &str = "Purchase Date";
pub const PAYMENT_MODE_COLUMN: &str = "Payment Mode";
pub const CATEGORY_COLUMN: &str = "Category";
pub const SELLING_PRICE_COLUMN: &str = "Selling Price";

/// Accepted spellings of the cost column, in order of preference.
pub const COST_COLUMN_SPELLINGS: [&str; 2] = ["Purchase Amount", "Purschase Amount"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum AgeGroup {
    #[schemars(description = "Age up to and including 18")]
    Teen,
    #[schemars(description = "Age 19 to 25")]
    Youth,
    #[schemars(description = "Age 26 to 40")]
    Adult,
    #[schemars(description = "Age 41 to 60")]
    Middle,
    #[schemars(description = "Age above 60")]
    Senior,
    #[schemars(description = "Age missing or not a number")]
    Unknown,
}

impl AgeGroup {
    pub fn from_age(age: Option<f64>) -> Self {
        match age {
            Some(a) if a.is_finite() => {
                if a <= 18.0 {
                    AgeGroup::Teen
                } else if a <= 25.0 {
                    AgeGroup::Youth
                } else if a <= 40.0 {
                    AgeGroup::Adult
                } else if a <= 60.0 {
                    AgeGroup::Middle
                } else {
                    AgeGroup::Senior
                }
            }
            _ => AgeGroup::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Teen => "Teen",
            AgeGroup::Youth => "Youth",
            AgeGroup::Adult => "Adult",
            AgeGroup::Middle => "Middle",
            AgeGroup::Senior => "Senior",
            AgeGroup::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A dimension the dashboard can be sliced by.
///
/// Declaration order is the order selectors are presented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Product,
    AgeGroup,
    Country,
    PaymentMode,
    Month,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Category,
        Dimension::Product,
        Dimension::AgeGroup,
        Dimension::Country,
        Dimension::PaymentMode,
        Dimension::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Product => "product",
            Dimension::AgeGroup => "age_group",
            Dimension::Country => "country",
            Dimension::PaymentMode => "payment_mode",
            Dimension::Month => "month",
        }
    }

    /// The row's value for this dimension, as shown in selectors.
    pub fn value_of<'a>(&self, row: &'a AnalyticalRow) -> &'a str {
        match self {
            Dimension::Category => &row.category,
            Dimension::Product => &row.product,
            Dimension::AgeGroup => row.age_group.label(),
            Dimension::Country => &row.country,
            Dimension::PaymentMode => &row.payment_mode,
            Dimension::Month => &row.month_label,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = SalesInsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| SalesInsightError::InvalidDimension(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    SellingPrice,
    Cost,
    Profit,
}

impl Measure {
    pub fn value_of(&self, row: &AnalyticalRow) -> f64 {
        match self {
            Measure::SellingPrice => row.selling_price,
            Measure::Cost => row.cost,
            Measure::Profit => row.profit(),
        }
    }
}

/// One normalized transaction.
///
/// `selling_price` and `cost` are always finite. `age_group` and `month_label`
/// are fixed at construction from `age` and `purchase_date`, so those four are
/// read-only; profit is never stored and always equals `selling_price - cost`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticalRow {
    pub customer: String,
    age: Option<f64>,
    pub country: String,
    pub product: String,
    purchase_date: Option<NaiveDate>,
    pub cost: f64,
    pub payment_mode: String,
    pub category: String,
    pub selling_price: f64,
    age_group: AgeGroup,
    month_label: String,
}

/// Source fields of a transaction before derivation.
#[derive(Debug, Clone, Default)]
pub struct RowFields {
    pub customer: String,
    pub age: Option<f64>,
    pub country: String,
    pub product: String,
    pub purchase_date: Option<NaiveDate>,
    pub cost: f64,
    pub payment_mode: String,
    pub category: String,
    pub selling_price: f64,
}

impl AnalyticalRow {
    pub fn new(fields: RowFields) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            age_group: AgeGroup::from_age(fields.age),
            month_label: fields
                .purchase_date
                .map(|d| crate::utils::month_abbreviation(d).to_string())
                .unwrap_or_default(),
            customer: fields.customer,
            age: fields.age,
            country: fields.country,
            product: fields.product,
            purchase_date: fields.purchase_date,
            cost: finite_or_zero(fields.cost),
            payment_mode: fields.payment_mode,
            category: fields.category,
            selling_price: finite_or_zero(fields.selling_price),
        }
    }

    pub fn profit(&self) -> f64 {
        self.selling_price - self.cost
    }

    pub fn age(&self) -> Option<f64> {
        self.age
    }

    pub fn purchase_date(&self) -> Option<NaiveDate> {
        self.purchase_date
    }

    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    /// Three-letter month of the purchase, or empty when undated.
    pub fn month_label(&self) -> &str {
        &self.month_label
    }
}

/// Wire form of an `AnalyticalRow`, derived fields included.
#[derive(Debug, Clone, Serialize, JsonSchema)]
struct AnalyticalRowRecord {
    customer: String,
    age: Option<f64>,
    country: String,
    product: String,
    purchase_date: Option<NaiveDate>,
    cost: f64,
    payment_mode: String,
    category: String,
    selling_price: f64,
    profit: f64,
    age_group: AgeGroup,
    month_label: String,
}

impl From<&AnalyticalRow> for AnalyticalRowRecord {
    fn from(row: &AnalyticalRow) -> Self {
        Self {
            customer: row.customer.clone(),
            age: row.age,
            country: row.country.clone(),
            product: row.product.clone(),
            purchase_date: row.purchase_date,
            cost: row.cost,
            payment_mode: row.payment_mode.clone(),
            category: row.category.clone(),
            selling_price: row.selling_price,
            profit: row.profit(),
            age_group: row.age_group,
            month_label: row.month_label.clone(),
        }
    }
}

impl Serialize for AnalyticalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AnalyticalRowRecord::from(self).serialize(serializer)
    }
}

impl JsonSchema for AnalyticalRow {
    fn schema_name() -> String {
        "AnalyticalRow".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        AnalyticalRowRecord::json_schema(gen)
    }
}

/// JSON Schemas for every bundle handed to the presentation layer.
pub fn interface_schemas() -> BTreeMap<&'static str, schemars::schema::RootSchema> {
    let mut schemas = BTreeMap::new();
    schemas.insert("KpiSummary", schemars::schema_for!(KpiSummary));
    schemas.insert("AnalyticalRow", schemars::schema_for!(AnalyticalRow));
    schemas.insert("TopByCount", schemars::schema_for!(TopByCount));
    schemas.insert("TopBySum", schemars::schema_for!(TopBySum));
    schemas.insert("ChartSeries", schemars::schema_for!(ChartSeries));
    schemas.insert("DashboardView", schemars::schema_for!(DashboardView));
    schemas.insert("PeriodValue", schemars::schema_for!(PeriodValue));
    schemas.insert("ForecastResult", schemars::schema_for!(ForecastResult));
    schemas.insert("ReportSummary", schemars::schema_for!(ReportSummary));
    schemas
}

pub fn interface_schemas_as_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&interface_schemas())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(age: Option<f64>, date: Option<NaiveDate>) -> AnalyticalRow {
        AnalyticalRow::new(RowFields {
            customer: "Asha".to_string(),
            age,
            purchase_date: date,
            cost: 60.0,
            selling_price: 100.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_age_group_breakpoints() {
        assert_eq!(AgeGroup::from_age(Some(15.0)), AgeGroup::Teen);
        assert_eq!(AgeGroup::from_age(Some(18.0)), AgeGroup::Teen);
        assert_eq!(AgeGroup::from_age(Some(19.0)), AgeGroup::Youth);
        assert_eq!(AgeGroup::from_age(Some(25.0)), AgeGroup::Youth);
        assert_eq!(AgeGroup::from_age(Some(40.0)), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(Some(41.0)), AgeGroup::Middle);
        assert_eq!(AgeGroup::from_age(Some(60.0)), AgeGroup::Middle);
        assert_eq!(AgeGroup::from_age(Some(61.0)), AgeGroup::Senior);
        assert_eq!(AgeGroup::from_age(None), AgeGroup::Unknown);
        assert_eq!(AgeGroup::from_age(Some(f64::NAN)), AgeGroup::Unknown);
    }

    #[test]
    fn test_row_derivations() {
        let r = row(Some(30.0), NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(r.age_group(), AgeGroup::Adult);
        assert_eq!(r.month_label(), "Mar");
        assert_eq!(r.profit(), 40.0);

        let undated = row(None, None);
        assert_eq!(undated.month_label(), "");
        assert_eq!(undated.age_group(), AgeGroup::Unknown);
    }

    #[test]
    fn test_non_finite_amounts_become_zero() {
        let r = AnalyticalRow::new(RowFields {
            cost: f64::INFINITY,
            selling_price: f64::NAN,
            ..Default::default()
        });
        assert_eq!(r.cost, 0.0);
        assert_eq!(r.selling_price, 0.0);
        assert_eq!(r.profit(), 0.0);
    }

    #[test]
    fn test_dimension_parsing() {
        assert_eq!("category".parse::<Dimension>().unwrap(), Dimension::Category);
        assert_eq!("Age Group".parse::<Dimension>().unwrap(), Dimension::AgeGroup);
        assert_eq!("payment-mode".parse::<Dimension>().unwrap(), Dimension::PaymentMode);
        assert!(matches!(
            "colour".parse::<Dimension>(),
            Err(SalesInsightError::InvalidDimension(_))
        ));
    }

    #[test]
    fn test_row_serialization_includes_profit() {
        let r = row(Some(19.0), NaiveDate::from_ymd_opt(2025, 1, 2));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["profit"], 40.0);
        assert_eq!(json["age_group"], "Youth");
        assert_eq!(json["month_label"], "Jan");
        assert_eq!(json["purchase_date"], "2025-01-02");
    }

    #[test]
    fn test_interface_schema_generation() {
        let schema_json = interface_schemas_as_json().unwrap();
        assert!(schema_json.contains("ForecastResult"));
        assert!(schema_json.contains("next_month_value"));
        assert!(schema_json.contains("profit_pct"));
    }
}
