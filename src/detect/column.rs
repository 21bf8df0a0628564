//! Per-column semantic type inference.
//!
//! Each non-blank value is tallied against every bucket it fits, so `1`
//! counts as both a boolean and a number. The column type is the first
//! bucket, in priority order boolean → number → date, whose share of the
//! non-blank values reaches [`TYPE_THRESHOLD`]; otherwise the column is text.

use crate::dataset::ColumnType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Minimum share of values that must agree on a type
pub const TYPE_THRESHOLD: f64 = 0.8;

/// Shapes a value must have before a date parse is attempted
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^(?:
            \d{4}-\d{1,2}-\d{1,2}(?:[T\ ]\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?
          | \d{4}/\d{1,2}/\d{1,2}
          | \d{1,2}/\d{1,2}/\d{2,4}
          | \d{1,2}-\d{1,2}-\d{4}
          | [A-Za-z]{3,9}\.?\ \d{1,2},?\ \d{4}
          | \d{1,2}\ [A-Za-z]{3,9}\.?\ \d{4}
        )$",
    )
    .expect("date pattern is valid")
});

/// Date-only layouts tried after the pattern matched
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y",
    "%b %d %Y", "%b %d, %Y", "%B %d %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y",
];

/// Date-time layouts without an offset
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Running tally of how many values fit each bucket
#[derive(Debug, Default)]
struct TypeTally {
    non_blank: usize,
    booleans: usize,
    numbers: usize,
    dates: usize,
}

impl TypeTally {
    fn update(&mut self, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }

        self.non_blank += 1;
        if is_boolean(trimmed) {
            self.booleans += 1;
        }
        if is_number(trimmed) {
            self.numbers += 1;
        }
        if is_date(trimmed) {
            self.dates += 1;
        }
    }

    fn share(&self, count: usize) -> f64 {
        count as f64 / self.non_blank as f64
    }

    fn decide(&self) -> ColumnType {
        if self.non_blank == 0 {
            return ColumnType::Text;
        }

        if self.share(self.booleans) >= TYPE_THRESHOLD {
            ColumnType::Boolean
        } else if self.share(self.numbers) >= TYPE_THRESHOLD {
            ColumnType::Number
        } else if self.share(self.dates) >= TYPE_THRESHOLD {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }
}

/// Infer the semantic type of a column from its values
///
/// Blank values are ignored; a column with no other values is text.
pub fn infer_column_type<I, S>(values: I) -> ColumnType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tally = TypeTally::default();
    for value in values {
        tally.update(value.as_ref());
    }
    tally.decide()
}

/// `true`/`false` in any case, or `0`/`1`
pub fn is_boolean(value: &str) -> bool {
    matches!(value, "0" | "1")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("false")
}

/// A finite number that prints back to the same text
pub fn is_number(value: &str) -> bool {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => n.to_string() == value,
        _ => false,
    }
}

/// A date-like value that is also a real calendar date
pub fn is_date(value: &str) -> bool {
    if !DATE_PATTERN.is_match(value) {
        return false;
    }

    DateTime::parse_from_rfc3339(value).is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_column() {
        assert_eq!(
            infer_column_type(["true", "false", "true", "true", "false"]),
            ColumnType::Boolean
        );
        assert_eq!(infer_column_type(["TRUE", "False", "1", "0"]), ColumnType::Boolean);
    }

    #[test]
    fn test_number_threshold() {
        // 4 of 5 = 0.8 reaches the threshold
        assert_eq!(infer_column_type(["1", "2", "x", "3", "4"]), ColumnType::Number);
        // 3 of 5 = 0.6 falls through to text
        assert_eq!(infer_column_type(["1", "2", "x", "y", "4"]), ColumnType::Text);
    }

    #[test]
    fn test_zero_and_one_count_as_boolean_and_number() {
        // Only 0/1 values: boolean wins over number by priority
        assert_eq!(infer_column_type(["0", "1", "1", "0"]), ColumnType::Boolean);
        // Mixed with other numbers they still count as numbers
        assert_eq!(infer_column_type(["0", "1", "7", "9", "12"]), ColumnType::Number);
        // A leading 1 must not push a numeric column below the threshold
        assert_eq!(infer_column_type(["1", "2", "x", "3", "4"]), ColumnType::Number);
    }

    #[test]
    fn test_number_round_trip() {
        assert!(is_number("3.25"));
        assert!(is_number("-17"));
        assert!(!is_number("1.50"));
        assert!(!is_number("007"));
        assert!(!is_number("NaN"));
        assert!(!is_number("inf"));
        assert!(!is_number("12px"));
    }

    #[test]
    fn test_date_column() {
        assert_eq!(
            infer_column_type(["2024-01-01", "2024-02-15", "2024-03-31"]),
            ColumnType::Date
        );
        assert_eq!(
            infer_column_type(["01/15/2024", "02/28/2024", "2024-03-01T10:30:00Z"]),
            ColumnType::Date
        );
        assert_eq!(infer_column_type(["Jan 5, 2024", "Feb 10, 2024"]), ColumnType::Date);
    }

    #[test]
    fn test_invalid_calendar_dates_rejected() {
        assert!(!is_date("2024-02-30"));
        assert!(!is_date("2024-13-01"));
        assert!(is_date("2024-02-29"));
    }

    #[test]
    fn test_blank_values_ignored() {
        assert_eq!(infer_column_type(["", "  ", "5", "6"]), ColumnType::Number);
        assert_eq!(infer_column_type(Vec::<String>::new()), ColumnType::Text);
        assert_eq!(infer_column_type(["", " "]), ColumnType::Text);
    }

    #[test]
    fn test_free_text() {
        assert_eq!(infer_column_type(["Oslo", "Bergen", "Tromsø"]), ColumnType::Text);
    }
}
