use crate::error::Error;
use chrono::{Days, NaiveDate};
use std::fmt;

/// Format the spreadsheet displays dates in, used for the marker cell.
pub const MARKER_FORMAT: &str = "%m/%d/%Y";

/// Inclusive date range to fetch. Empty when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.start <= *date && *date <= self.end
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Computes the next window after `watermark`: the day after it through yesterday.
pub fn resolve_window(watermark: NaiveDate, today: NaiveDate) -> SyncWindow {
    SyncWindow {
        start: watermark + Days::new(1),
        end: today - Days::new(1),
    }
}

/// Parses the marker cell content. An empty or unreadable cell is a schema error;
/// guessing a start date would risk gaps or duplicated history.
pub fn parse_watermark(cell: &str, raw: Option<&str>) -> Result<NaiveDate, Error> {
    let value = raw.map(str::trim).unwrap_or("");
    if value.is_empty() {
        return Err(Error::schema(format!("Cell {} is empty.", cell)));
    }

    parse_sheet_date(value).map_err(|_| {
        Error::schema(format!(
            "Failed to parse date from {}: {} (expected format MM/DD/YYYY)",
            cell, value
        ))
    })
}

/// Reads a date as the spreadsheet renders it, `MM/DD/YYYY` or `YYYY-MM-DD`.
pub fn parse_sheet_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, MARKER_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| Error::InvalidDate {
            date: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_resolve_window_behind() {
        let window = resolve_window(day("2024-04-28"), day("2024-05-02"));
        assert_eq!(window.start, day("2024-04-29"));
        assert_eq!(window.end, day("2024-05-01"));
        assert!(!window.is_empty());
    }

    #[test]
    fn test_resolve_window_property() {
        let today = day("2024-03-01");
        for lag in 2..400u64 {
            let watermark = today - Days::new(lag);
            let window = resolve_window(watermark, today);
            assert_eq!(window.start, watermark + Days::new(1));
            assert_eq!(window.end, today - Days::new(1));
            assert!(window.start <= window.end);
        }
    }

    #[test]
    fn test_resolve_window_up_to_date_is_empty() {
        let today = day("2024-05-02");
        assert!(resolve_window(day("2024-05-01"), today).is_empty());
        assert!(resolve_window(day("2024-05-02"), today).is_empty());
        assert!(resolve_window(day("2024-06-30"), today).is_empty());
    }

    #[test]
    fn test_single_day_window() {
        let window = resolve_window(day("2024-04-30"), day("2024-05-02"));
        assert_eq!(window.start, window.end);
        assert!(window.contains(&day("2024-05-01")));
        assert!(!window.contains(&day("2024-04-30")));
    }

    #[test]
    fn test_parse_watermark_formats() {
        assert_eq!(
            parse_watermark("M1", Some("5/1/2024")).unwrap(),
            day("2024-05-01")
        );
        assert_eq!(
            parse_watermark("M1", Some(" 2024-05-01 ")).unwrap(),
            day("2024-05-01")
        );
    }

    #[test]
    fn test_parse_watermark_missing_or_garbage_is_schema_error() {
        for raw in [None, Some(""), Some("   "), Some("yesterday"), Some("13/45/2024")] {
            assert!(matches!(
                parse_watermark("M1", raw).unwrap_err(),
                Error::Schema { .. }
            ));
        }
    }
}
