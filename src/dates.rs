//! Permissive date parsing for installation dates.
//!
//! Two flavours exist: the cleaner normalizes with day-before-month
//! precedence, and the transformer parses ISO-first with a fixed fallback list.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// chrono's `%Y` takes one to four digits; anything below this came from a short year token.
const MIN_FOUR_DIGIT_YEAR: i32 = 1000;

const DAY_FIRST_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DAY_FIRST_DATE_FORMATS: [&str; 16] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    // month-first only once a day-first reading is impossible
    "%m/%d/%Y",
    // two-digit years, same precedence
    "%d/%m/%y",
    "%d-%m-%y",
    "%d.%m.%y",
    "%m/%d/%y",
];

const ISO_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const FALLBACK_DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

fn first_match(value: &str, datetime_formats: &[&str], date_formats: &[&str]) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    datetime_formats
        .iter()
        .find_map(|fmt| {
            NaiveDateTime::parse_from_str(value, fmt)
                .ok()
                .and_then(|dt| full_year(dt.date()))
        })
        .or_else(|| {
            date_formats.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(value, fmt)
                    .ok()
                    .and_then(full_year)
            })
        })
}

fn full_year(date: NaiveDate) -> Option<NaiveDate> {
    (date.year() >= MIN_FOUR_DIGIT_YEAR).then_some(date)
}

/// Parse with day-before-month precedence (`15/03/2021` is the 15th of March).
pub fn parse_day_first(value: &str) -> Option<NaiveDate> {
    first_match(value, &DAY_FIRST_DATETIME_FORMATS, &DAY_FIRST_DATE_FORMATS)
}

/// ISO-flexible parse, then `YYYY-MM-DD`, `DD-MM-YYYY`, `MM/DD/YYYY`,
/// `DD/MM/YYYY`, `YYYY/MM/DD` in that order.
pub fn parse_installation_date(value: &str) -> Option<NaiveDate> {
    first_match(value, &ISO_DATETIME_FORMATS, &FALLBACK_DATE_FORMATS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_first_precedence() {
        assert_eq!(parse_day_first("15/03/2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("04/05/2021"), Some(ymd(2021, 5, 4)));
        assert_eq!(parse_day_first("15-03-2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("15.03.2021"), Some(ymd(2021, 3, 15)));
    }

    #[test]
    fn test_day_first_falls_back_to_month_first() {
        assert_eq!(parse_day_first("03/15/2021"), Some(ymd(2021, 3, 15)));
    }

    #[test]
    fn test_day_first_textual_and_iso_forms() {
        assert_eq!(parse_day_first("2021-03-15"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("15 mar 2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("march 15, 2021"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("2021-03-15 08:30:00"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("2021-03-15T08:30:00Z"), Some(ymd(2021, 3, 15)));
    }

    #[test]
    fn test_day_first_two_digit_years() {
        assert_eq!(parse_day_first("15/03/21"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("15-03-21"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("10/11/12"), Some(ymd(2012, 11, 10)));
        assert_eq!(parse_day_first("03/15/21"), Some(ymd(2021, 3, 15)));
    }

    #[test]
    fn test_day_first_minutes_only_datetime() {
        assert_eq!(parse_day_first("2021-03-15 08:30"), Some(ymd(2021, 3, 15)));
        assert_eq!(parse_day_first("2021-03-15T08:30"), Some(ymd(2021, 3, 15)));
    }

    #[test]
    fn test_installation_date_requires_four_digit_year() {
        assert_eq!(parse_installation_date("15-03-21"), None);
        assert_eq!(parse_installation_date("03/15/21"), None);
        assert_eq!(parse_installation_date("10/11/12"), None);
        assert_eq!(parse_installation_date("21-03-15"), None);
    }

    #[test]
    fn test_day_first_rejects_garbage() {
        assert_eq!(parse_day_first("unknown"), None);
        assert_eq!(parse_day_first(""), None);
        assert_eq!(parse_day_first("31/02/2021"), None);
    }

    #[test]
    fn test_installation_date_fallback_order() {
        assert_eq!(parse_installation_date("2020-01-31"), Some(ymd(2020, 1, 31)));
        assert_eq!(parse_installation_date("31-01-2020"), Some(ymd(2020, 1, 31)));
        // month-first wins over day-first for slashes
        assert_eq!(parse_installation_date("02/03/2020"), Some(ymd(2020, 2, 3)));
        assert_eq!(parse_installation_date("31/01/2020"), Some(ymd(2020, 1, 31)));
        assert_eq!(parse_installation_date("2020/01/31"), Some(ymd(2020, 1, 31)));
        assert_eq!(
            parse_installation_date("2020-01-31T10:00:00.250"),
            Some(ymd(2020, 1, 31))
        );
        assert_eq!(parse_installation_date("not a date"), None);
    }
}
