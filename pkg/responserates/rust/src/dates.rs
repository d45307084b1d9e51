// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Calendar dates travel as `YYYY-MM-DD` everywhere: query string, SQL, JSON and CSV.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const DATE_LEN: usize = "YYYY-MM-DD".len();

/// Parses a strict `YYYY-MM-DD` calendar date, rejecting impossible days such as `2023-02-30`.
pub fn parse_date(value: &str) -> Option<Date> {
    // `[year]` also takes a sign and more than four digits.
    if value.len() != DATE_LEN || !value.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Date::parse(value, DATE_FORMAT).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_parse_valid_dates() {
        assert_eq!(parse_date("2023-02-28"), Some(date!(2023 - 02 - 28)));
        assert_eq!(parse_date("2020-02-29"), Some(date!(2020 - 02 - 29)));
        assert_eq!(parse_date("2020-12-31"), Some(date!(2020 - 12 - 31)));
    }

    #[test]
    fn test_parse_rejects_impossible_dates() {
        assert_eq!(parse_date("2023-02-30"), None);
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("2020-13-01"), None);
        assert_eq!(parse_date("2020-00-10"), None);
        assert_eq!(parse_date("2020-04-31"), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("2020/01/01"), None);
        assert_eq!(parse_date("2020-01"), None);
        assert_eq!(parse_date("2020-01-01T00:00"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("+2020-01-01"), None);
        assert_eq!(parse_date("-2020-01-01"), None);
        assert_eq!(parse_date("+020-01-01"), None);
        assert_eq!(parse_date("02020-01-01"), None);
    }

    #[test]
    fn test_format_round_trip() {
        let parsed = parse_date("2020-03-05");
        assert_eq!(parsed.map(format_date).as_deref(), Some("2020-03-05"));
    }
}
