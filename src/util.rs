// Utility helpers for parsing and basic statistics.
//
// This module centralizes the "dirty" spreadsheet cell handling so the rest
// of the pipeline can assume clean, typed values.
use chrono::{Days, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Text date layouts tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%d %b %Y", "%d %B %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a text date. Also accepts month-only labels like `Jan 2023`,
/// which land on the first of the month.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    let first_of_month = format!("1 {}", s);
    ["%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&first_of_month, fmt).ok())
}

/// Serial of 9999-12-31, the last date a workbook can hold.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Excel stores dates as days since 1899-12-30.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// First decimal number inside a label: `"2.5/3"` gives `2.5`, `"3 BHK"` gives `3`.
pub fn extract_first_number(s: &str) -> Option<f64> {
    NUMBER_TOKEN
        .find(s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Uppercase the first letter of every alphabetic run and lowercase the rest,
/// so `"north  BANGALORE"` becomes `"North  Bangalore"` and `"plot/land"`
/// becomes `"Plot/Land"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn median(mut v: Vec<f64>) -> f64 {
    // Median of a list of numbers. We accept `Vec<f64>` by value so the
    // function can sort in-place without cloning at the call site.
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("north"), "North");
        assert_eq!(title_case("  NORTH east "), "  North East ");
        assert_eq!(title_case("plot/land"), "Plot/Land");
        assert_eq!(title_case("o'neil homes"), "O'Neil Homes");
    }

    #[test]
    fn first_number_token() {
        assert_eq!(extract_first_number("2/3"), Some(2.0));
        assert_eq!(extract_first_number("2.5/3"), Some(2.5));
        assert_eq!(extract_first_number("3 BHK"), Some(3.0));
        assert_eq!(extract_first_number("Studio"), None);
    }

    #[test]
    fn dates_in_common_layouts() {
        assert_eq!(parse_date_safe(Some("2023-01-15")), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_safe(Some("2023-01-15 00:00:00")), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_safe(Some("01/15/2023")), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_safe(Some("15-Jan-2023")), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_safe(Some("Mar 2024")), Some(ymd(2024, 3, 1)));
        assert_eq!(parse_date_safe(Some("December 2025")), Some(ymd(2025, 12, 1)));
        assert_eq!(parse_date_safe(Some("TBD")), None);
        assert_eq!(parse_date_safe(Some("")), None);
    }

    #[test]
    fn excel_serials() {
        assert_eq!(excel_serial_to_date(44941.0), Some(ymd(2023, 1, 15)));
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(2_958_465.0), Some(ymd(9999, 12, 31)));
    }

    #[test]
    fn out_of_range_serials_are_not_dates() {
        assert_eq!(excel_serial_to_date(2_958_466.0), None);
        assert_eq!(excel_serial_to_date(1e20), None);
        assert_eq!(excel_serial_to_date(f64::INFINITY), None);
        assert_eq!(excel_serial_to_date(-5.0), None);
    }

    #[test]
    fn number_parsing() {
        assert_eq!(parse_f64_safe(Some(" 1,200 ")), Some(1200.0));
        assert_eq!(parse_f64_safe(Some("12 acres")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-5.0, 0), "-5");
        assert_eq!(format_int(9855), "9,855");
        assert_eq!(round2(33.33333), 33.33);
    }
}
