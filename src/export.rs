//! Table export, search over the displayed columns, and the upload template.

use crate::error::Result;
use crate::schema::{
    AnalyticalRow, AGE_COLUMN, CATEGORY_COLUMN, COST_COLUMN_SPELLINGS, COUNTRY_COLUMN,
    CUSTOMER_COLUMN, PAYMENT_MODE_COLUMN, PRODUCT_COLUMN, PURCHASE_DATE_COLUMN,
    SELLING_PRICE_COLUMN,
};
use chrono::NaiveDate;
use log::debug;
use std::io::Write;

pub const PROFIT_COLUMN: &str = "Profit";
pub const AGE_GROUP_COLUMN: &str = "Age Group";
pub const MONTH_COLUMN: &str = "Month";

/// Column headers of the exported table, with the dataset's cost column name.
pub fn table_headers(cost_field: &str) -> [&str; 12] {
    [
        CUSTOMER_COLUMN,
        AGE_COLUMN,
        COUNTRY_COLUMN,
        PRODUCT_COLUMN,
        PURCHASE_DATE_COLUMN,
        cost_field,
        PAYMENT_MODE_COLUMN,
        CATEGORY_COLUMN,
        SELLING_PRICE_COLUMN,
        PROFIT_COLUMN,
        AGE_GROUP_COLUMN,
        MONTH_COLUMN,
    ]
}

/// The row as displayed, in `table_headers` order.
pub fn display_cells(row: &AnalyticalRow) -> [String; 12] {
    [
        row.customer.clone(),
        row.age().map(format_number).unwrap_or_default(),
        row.country.clone(),
        row.product.clone(),
        row.purchase_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        format_number(row.cost),
        row.payment_mode.clone(),
        row.category.clone(),
        format_number(row.selling_price),
        format_number(row.profit()),
        row.age_group().label().to_string(),
        row.month_label().to_string(),
    ]
}

fn format_number(value: f64) -> String {
    format!("{}", value)
}

pub fn write_csv<W: Write>(rows: &[&AnalyticalRow], cost_field: &str, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table_headers(cost_field))?;
    for row in rows {
        out.write_record(display_cells(row))?;
    }
    out.flush()?;
    debug!("Exported {} rows", rows.len());
    Ok(())
}

/// Rows where any displayed cell contains `query`, ignoring case.
pub fn search_rows<'a>(rows: &[&'a AnalyticalRow], query: &str) -> Vec<&'a AnalyticalRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .copied()
        .filter(|row| {
            display_cells(row)
                .iter()
                .any(|cell| cell.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Writes the upload template: the expected headers and one example row.
pub fn write_template<W: Write>(writer: W, today: NaiveDate) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        CUSTOMER_COLUMN,
        AGE_COLUMN,
        COUNTRY_COLUMN,
        PRODUCT_COLUMN,
        PURCHASE_DATE_COLUMN,
        COST_COLUMN_SPELLINGS[0],
        PAYMENT_MODE_COLUMN,
        CATEGORY_COLUMN,
        SELLING_PRICE_COLUMN,
    ])?;
    let date = today.format("%Y-%m-%d").to_string();
    out.write_record([
        "Rahul Sharma",
        "28",
        "India",
        "Smartphone",
        date.as_str(),
        "18000",
        "UPI",
        "Electronics",
        "22000",
    ])?;
    out.flush()?;
    Ok(())
}
