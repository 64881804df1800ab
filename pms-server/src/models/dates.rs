//! Calendar date helpers

use chrono::NaiveDate;

use super::ValidationError;

/// Reject ranges whose end lies before their start. Open ranges pass.
pub fn check_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    start_field: &'static str,
    end_field: &'static str,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::InvalidDateRange {
            start: start_field,
            end: end_field,
        }),
        _ => Ok(()),
    }
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field,
        reason: "expected a date formatted as YYYY-MM-DD",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn open_ranges_pass() {
        assert!(check_range(None, None, "start_date", "end_date").is_ok());
        assert!(check_range(Some(d("2024-05-01")), None, "start_date", "end_date").is_ok());
        assert!(check_range(None, Some(d("2024-05-01")), "start_date", "end_date").is_ok());
    }

    #[test]
    fn same_day_is_allowed() {
        let day = Some(d("2024-05-01"));
        assert!(check_range(day, day, "start_date", "due_date").is_ok());
    }

    #[test]
    fn inverted_range_fails() {
        let err = check_range(Some(d("2024-05-02")), Some(d("2024-05-01")), "start_date", "due_date")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDateRange {
                start: "start_date",
                end: "due_date"
            }
        );
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("due_date", " 2024-02-29 ").unwrap(), d("2024-02-29"));
        assert!(parse_date("due_date", "29/02/2024").is_err());
    }
}
