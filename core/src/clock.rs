//! Calendar helpers: store dates are plain `YYYY-MM-DD` cells.
//!
//! Unparsable dates count as zero elapsed days. The caller gets a
//! `DateQuality` marker alongside so the gap can be reported.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const STORE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateQuality {
    Valid,
    Missing,
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedDays {
    pub days:    i64,
    pub quality: DateQuality,
}

pub fn parse_store_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), STORE_DATE_FORMAT).ok()
}

/// Whole days from `raw` to `today`. Future dates give a negative count.
pub fn elapsed_days(raw: &str, today: NaiveDate) -> ElapsedDays {
    if raw.trim().is_empty() {
        return ElapsedDays { days: 0, quality: DateQuality::Missing };
    }
    match parse_store_date(raw) {
        Some(date) => ElapsedDays {
            days:    (today - date).num_days(),
            quality: DateQuality::Valid,
        },
        None => ElapsedDays { days: 0, quality: DateQuality::Malformed },
    }
}

pub fn format_store_date(date: NaiveDate) -> String {
    date.format(STORE_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        parse_store_date(s).unwrap()
    }

    #[test]
    fn counts_whole_days() {
        let e = elapsed_days("2026-01-01", day("2026-01-31"));
        assert_eq!(e, ElapsedDays { days: 30, quality: DateQuality::Valid });
    }

    #[test]
    fn malformed_and_missing_degrade_to_zero() {
        let today = day("2026-01-31");
        assert_eq!(elapsed_days("31/01/2026", today).quality, DateQuality::Malformed);
        assert_eq!(elapsed_days("31/01/2026", today).days, 0);
        assert_eq!(elapsed_days("  ", today).quality, DateQuality::Missing);
    }

    #[test]
    fn formats_iso_dates() {
        assert_eq!(format_store_date(day("2026-03-04")), "2026-03-04");
    }
}
