//! Date/time utilities for loosely delimited timestamps.
//!
//! Show start times are stored in the database in one canonical form:
//!   - **Timestamps**: `YYYY-MM-DDTHH:MM:SS.mmmZ` (UTC, millisecond precision)
//!
//! That form has exactly seven numeric groups, which is what
//! [`parse_iso_string`] expects. Use [`format_iso_string`] to produce it.
//! Years below 100 do not survive the trip: the parser reads them as 19xx,
//! so callers storing timestamps must reject them first.
//!
//! [`parse_iso_string`] does not validate anything. It splits on runs of
//! non-digits and assembles the groups the way a browser's `Date.UTC` does,
//! so out-of-range components carry into the next unit instead of failing.
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Earliest year whose formatted form parses back to the same instant.
pub const MIN_STORABLE_YEAR: i32 = 100;

/// Largest distance from the epoch a browser date can represent.
const MAX_EPOCH_MS: i64 = 8_640_000_000_000_000;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]+").expect("invalid separator regex"));

/// Parse `year, month, day, hour, minute, second, millisecond` out of `s`.
///
/// Returns `None` (an invalid date) when fewer than seven groups are present,
/// when a group does not fit in an `i64`, or when the assembled instant is out
/// of range. Empty groups, as produced by a leading separator, count as `0`.
pub fn parse_iso_string(s: &str) -> Option<DateTime<Utc>> {
    let mut pieces = SEPARATORS.split(s);
    let mut components = [0i64; 7];

    for slot in components.iter_mut() {
        let piece = pieces.next()?;
        *slot = if piece.is_empty() { 0 } else { piece.parse().ok()? };
    }

    utc_from_components(components)
}

/// Format a timestamp in the canonical form read back by [`parse_iso_string`].
///
/// The round trip holds for years 100 and later; see [`MIN_STORABLE_YEAR`].
pub fn format_iso_string(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn utc_from_components(
    [year, month, day, hour, minute, second, millis]: [i64; 7],
) -> Option<DateTime<Utc>> {
    // Two-digit years belong to the 1900s.
    let year = if (0..=99).contains(&year) { 1900 + year } else { year };

    let month = month.checked_sub(1)?;
    let year = year.checked_add(month.div_euclid(12))?;
    let month = month.rem_euclid(12) as u32 + 1;

    let first_of_month = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
    let base = first_of_month.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();

    let offset = [
        (day.checked_sub(1)?, MS_PER_DAY),
        (hour, MS_PER_HOUR),
        (minute, MS_PER_MINUTE),
        (second, MS_PER_SECOND),
        (millis, 1),
    ]
    .into_iter()
    .try_fold(0i64, |acc, (value, unit)| acc.checked_add(value.checked_mul(unit)?))?;

    let epoch_ms = base.checked_add(offset)?;
    if epoch_ms.abs() > MAX_EPOCH_MS {
        return None;
    }

    DateTime::from_timestamp_millis(epoch_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn parse_full_timestamp() {
        let dt = parse_iso_string("2023-05-17T08:09:10.123Z").unwrap();

        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month0(), 4);
        assert_eq!(dt.day(), 17);
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.minute(), 9);
        assert_eq!(dt.second(), 10);
        assert_eq!(dt.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn parse_y2k_matches_reference() {
        let dt = parse_iso_string("2000-01-01T00:00:00.000Z").unwrap();

        assert_eq!(dt.timestamp_millis(), 946_684_800_000);
        assert_eq!(dt, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_date_only_is_invalid_not_panic() {
        assert_eq!(parse_iso_string("2023-05-17"), None);
    }

    #[test]
    fn parse_empty_string_is_invalid() {
        assert_eq!(parse_iso_string(""), None);
    }

    #[test]
    fn parse_accepts_any_separator() {
        let a = parse_iso_string("2023/05/17 08:09:10,123");
        let b = parse_iso_string("2023-05-17T08:09:10.123Z");

        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn parse_ignores_groups_past_the_seventh() {
        let dt = parse_iso_string("2023-05-17T08:09:10.123+05:30").unwrap();

        // The offset is not applied; only the first seven groups are read.
        assert_eq!(dt, parse_iso_string("2023-05-17T08:09:10.123Z").unwrap());
    }

    #[test]
    fn parse_fraction_is_milliseconds_as_written() {
        let dt = parse_iso_string("2023-05-17T08:09:10.5Z").unwrap();

        assert_eq!(dt.timestamp_subsec_millis(), 5);
    }

    #[test]
    fn parse_carries_overflowing_components() {
        let dt = parse_iso_string("2023-13-01T00:00:61.1500Z").unwrap();

        assert_eq!(
            dt,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 2).unwrap() + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn parse_month_zero_rolls_back_a_year() {
        let dt = parse_iso_string("2023-00-15T00:00:00.000Z").unwrap();

        assert_eq!(dt, Utc.with_ymd_and_hms(2022, 12, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_two_digit_year_is_twentieth_century() {
        let dt = parse_iso_string("99-12-31T23:59:59.999Z").unwrap();

        assert_eq!(dt.year(), 1999);
    }

    #[test]
    fn parse_leading_separator_shifts_components() {
        // The empty leading group becomes a zero year (1900); everything else moves one slot.
        let dt = parse_iso_string("T2023-05-17-08-09-10").unwrap();

        assert_eq!(dt.year(), 1900 + (2023 - 1) / 12);
    }

    #[test]
    fn parse_huge_group_is_invalid() {
        assert_eq!(parse_iso_string("99999999999999999999-01-01T00:00:00.000Z"), None);
    }

    #[test]
    fn parse_out_of_range_year_is_invalid() {
        assert_eq!(parse_iso_string("300000-01-01T00:00:00.000Z"), None);
    }

    #[test]
    fn two_digit_years_do_not_round_trip() {
        let dt = Utc.with_ymd_and_hms(50, 6, 1, 20, 0, 0).unwrap();

        let read_back = parse_iso_string(&format_iso_string(&dt)).unwrap();

        assert_eq!(format_iso_string(&dt), "0050-06-01T20:00:00.000Z");
        assert_eq!(read_back.year(), 1950);
    }

    #[test]
    fn earliest_storable_year_round_trips() {
        let dt = Utc.with_ymd_and_hms(MIN_STORABLE_YEAR, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_iso_string(&format_iso_string(&dt)), Some(dt));
    }

    #[test]
    fn format_is_read_back_by_parser() {
        let dt = Utc.with_ymd_and_hms(2026, 2, 25, 11, 26, 0).unwrap()
            + chrono::Duration::milliseconds(42);

        let formatted = format_iso_string(&dt);

        assert_eq!(formatted, "2026-02-25T11:26:00.042Z");
        assert_eq!(parse_iso_string(&formatted), Some(dt));
    }
}
