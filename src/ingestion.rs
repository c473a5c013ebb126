//! Turning an uploaded table into analytical rows.
//!
//! The only fatal condition is a missing cost column. Every other anomaly is
//! absorbed: unparsable amounts become `0`, unparsable dates become `None`
//! with an empty month label, unparsable ages land in `AgeGroup::Unknown`,
//! and absent columns read as empty cells.

use crate::config::EngineConfig;
use crate::error::{Result, SalesInsightError};
use crate::schema::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y", "%d-%b-%Y", "%B %d, %Y",
];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// An uploaded table: ordered headers and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.iter().map(|h| normalize_header_name(h)).collect(),
            rows,
        }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(normalize_header_name)
            .collect();

        let mut rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
            if cells.len() < headers.len() {
                cells.resize(headers.len(), String::new());
            }
            rows.push(cells);
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Builds a table from JSON row objects keyed by column name.
    ///
    /// Columns are ordered by first appearance across records; within one
    /// record they follow the object's key order. Non-object rows read as empty.
    pub fn from_json_records(records: &[serde_json::Value]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            if let Some(object) = record.as_object() {
                for key in object.keys() {
                    let name = normalize_header_name(key);
                    if !index.contains_key(&name) {
                        index.insert(name.clone(), headers.len());
                        headers.push(name);
                    }
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut cells = vec![String::new(); headers.len()];
                if let Some(object) = record.as_object() {
                    for (key, value) in object {
                        if let Some(&idx) = index.get(&normalize_header_name(key)) {
                            cells[idx] = json_cell(value);
                        }
                    }
                }
                cells
            })
            .collect();

        Self { headers, rows }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        Ok(Self::from_json_records(&records))
    }

    /// Position of the first column with this header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Counters describing what the normalizer had to coerce.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationStats {
    pub rows: usize,
    pub amounts_coerced_to_zero: usize,
    pub undated_rows: usize,
    pub unknown_ages: usize,
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedDataset {
    pub rows: Vec<AnalyticalRow>,
    /// The cost header spelling found in the upload.
    pub cost_field: String,
    pub stats: NormalizationStats,
}

pub struct Normalizer {
    extra_date_formats: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            extra_date_formats: config.extra_date_formats.clone(),
        }
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<NormalizedDataset> {
        let cost_field = resolve_cost_column(raw)?;
        warn_duplicate_headers(raw);

        let column = |name: &str| raw.column(name);
        let customer = column(CUSTOMER_COLUMN);
        let age = column(AGE_COLUMN);
        let country = column(COUNTRY_COLUMN);
        let product = column(PRODUCT_COLUMN);
        let purchase_date = column(PURCHASE_DATE_COLUMN);
        let cost = column(cost_field.as_str());
        let payment_mode = column(PAYMENT_MODE_COLUMN);
        let category = column(CATEGORY_COLUMN);
        let selling_price = column(SELLING_PRICE_COLUMN);

        let mut stats = NormalizationStats {
            rows: raw.rows.len(),
            missing_columns: [
                CUSTOMER_COLUMN,
                AGE_COLUMN,
                COUNTRY_COLUMN,
                PRODUCT_COLUMN,
                PURCHASE_DATE_COLUMN,
                PAYMENT_MODE_COLUMN,
                CATEGORY_COLUMN,
                SELLING_PRICE_COLUMN,
            ]
            .iter()
            .filter(|name| raw.column(name).is_none())
            .map(|name| name.to_string())
            .collect(),
            ..Default::default()
        };

        let mut rows = Vec::with_capacity(raw.rows.len());
        for record in &raw.rows {
            let cell = |idx: Option<usize>| cell_at(record, idx);

            let (cost_value, cost_ok) = coerce_amount(cell(cost));
            let (price_value, price_ok) = coerce_amount(cell(selling_price));
            stats.amounts_coerced_to_zero += usize::from(!cost_ok) + usize::from(!price_ok);

            let date = self.parse_date(cell(purchase_date));
            if date.is_none() {
                stats.undated_rows += 1;
            }

            let age_value = parse_number(cell(age));
            if age_value.is_none() {
                stats.unknown_ages += 1;
            }

            rows.push(AnalyticalRow::new(RowFields {
                customer: cell(customer).to_string(),
                age: age_value,
                country: cell(country).to_string(),
                product: cell(product).to_string(),
                purchase_date: date,
                cost: cost_value,
                payment_mode: cell(payment_mode).to_string(),
                category: cell(category).to_string(),
                selling_price: price_value,
            }));
        }

        info!(
            "Normalized {} rows using cost column '{}'",
            rows.len(),
            cost_field
        );
        debug!(
            "Coercions: {} amounts set to 0, {} undated rows, {} unknown ages, missing columns {:?}",
            stats.amounts_coerced_to_zero,
            stats.undated_rows,
            stats.unknown_ages,
            stats.missing_columns
        );

        Ok(NormalizedDataset {
            rows,
            cost_field,
            stats,
        })
    }

    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        parse_date_with(value, &self.extra_date_formats)
    }
}

/// Normalizes with the default configuration.
pub fn normalize(raw: &RawTable) -> Result<NormalizedDataset> {
    Normalizer::default().normalize(raw)
}

fn resolve_cost_column(raw: &RawTable) -> Result<String> {
    COST_COLUMN_SPELLINGS
        .iter()
        .find(|name| raw.column(name).is_some())
        .map(|name| name.to_string())
        .ok_or_else(|| SalesInsightError::Schema {
            missing: format!(
                "'{}' (or the common typo '{}')",
                COST_COLUMN_SPELLINGS[0], COST_COLUMN_SPELLINGS[1]
            ),
        })
}

fn warn_duplicate_headers(raw: &RawTable) {
    for (idx, header) in raw.headers.iter().enumerate() {
        if raw.headers[..idx].contains(header) {
            warn!("Header '{}' appears more than once; using the first occurrence", header);
        }
    }
}

fn cell_at(record: &[String], idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

fn json_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Parses a finite number, or `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses an amount, returning `(value, parsed)`; failures yield `0.0`.
pub fn coerce_amount(value: &str) -> (f64, bool) {
    match parse_number(value) {
        Some(v) => (v, true),
        None => (0.0, false),
    }
}

pub fn parse_date_with(value: &str, extra_formats: &[String]) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let builtin = DATE_FORMATS.iter().copied();
    let extra = extra_formats.iter().map(String::as_str);
    for fmt in builtin.chain(extra.clone()) {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS.iter().copied().chain(extra) {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(datetime.date());
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}
