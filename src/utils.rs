use chrono::{Datelike, NaiveDate};

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_abbreviation(date: NaiveDate) -> &'static str {
    MONTH_ABBREVIATIONS[date.month0() as usize]
}

/// Calendar position (0 = Jan) of a three-letter month label.
pub fn month_label_index(label: &str) -> Option<usize> {
    MONTH_ABBREVIATIONS.iter().position(|m| *m == label)
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };

    let month = if date.month() == 12 {
        1
    } else {
        date.month() + 1
    };

    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// First day of the month `months` calendar months after `date`'s month.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    (0..months).fold(month_start(date), |current, _| next_month_start(current))
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Formats a month as `YYYY-MM`.
pub fn format_period(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
