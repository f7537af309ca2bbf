use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use qu::ick_use::*;
use std::{fs, io, path::Path};

/// Number of milliseconds in a (civil) day.
pub const MILLIS_PER_DAY: f64 = 24. * 60. * 60. * 1000.;

/// Formats accepted for the date column, tried in order.
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers to parse fields with quirks.

/// Parse an activity date, mapping the empty string to `None`.
///
/// Plain dates are taken to be at midnight.
pub fn parse_date_time(s: &str) -> Result<Option<NaiveDateTime>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Some(start_of_day(date)));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Some(datetime));
        }
    }
    bail!("\"{}\" is not a date (expected YYYY-MM-DD, optionally followed by HH:MM:SS)", s)
}

/// Parse a date in the `YYYY-MM-DD` format.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date \"{}\", expected format YYYY-MM-DD", s))
}

/// parse a '1' to `true` and a '0' (or nothing) to `false`
pub fn parse_flag(s: &str) -> Result<bool> {
    match s.trim() {
        "" | "0" | "0.0" => Ok(false),
        "1" | "1.0" => Ok(true),
        other if other.eq_ignore_ascii_case("false") => Ok(false),
        other if other.eq_ignore_ascii_case("true") => Ok(true),
        other => bail!("expected '0' or '1', found \"{}\"", other),
    }
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Convert a (possibly fractional) number of days to a `Duration`, saturating at the limits.
pub fn days_to_duration(days: f64) -> Duration {
    let millis = (days * MILLIS_PER_DAY).round();
    if millis.is_nan() {
        return Duration::zero();
    }
    // `as` saturates for out of range floats.
    Duration::try_milliseconds(millis as i64).unwrap_or_else(|| {
        if millis < 0. {
            Duration::min_value()
        } else {
            Duration::max_value()
        }
    })
}

/// The length of a `Duration` in days, including the fractional part.
pub fn duration_to_days(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Shift a point in time backwards, saturating at the earliest representable time.
pub fn saturating_sub(time: NaiveDateTime, duration: Duration) -> NaiveDateTime {
    time.checked_sub_signed(duration)
        .unwrap_or(NaiveDateTime::MIN)
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dates() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 3).unwrap();
        assert_eq!(
            parse_date_time("2021-01-03").unwrap(),
            Some(start_of_day(date))
        );
        assert_eq!(
            parse_date_time(" 2021-01-03 12:00:00 ").unwrap(),
            Some(date.and_hms_opt(12, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date_time("2021-01-03T06:30:00").unwrap(),
            Some(date.and_hms_opt(6, 30, 0).unwrap())
        );
        assert_eq!(parse_date_time("").unwrap(), None);
        assert!(parse_date_time("03/01/2021").is_err());
        assert!(parse_date("2021-13-01").is_err());
    }

    #[test]
    fn flags() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("2").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(days_to_duration(1.5), Duration::hours(36));
        assert_eq!(days_to_duration(0.), Duration::zero());
        assert_eq!(duration_to_days(Duration::hours(36)), 1.5);
        assert_eq!(days_to_duration(f64::INFINITY), Duration::max_value());
        let start = start_of_day(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(
            saturating_sub(start, days_to_duration(1e300)),
            NaiveDateTime::MIN
        );
    }
}
