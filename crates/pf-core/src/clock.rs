//! Simulation clock helpers.
//!
//! Times appear in input files as decimal hours ("2.5"), as HH:MM:SS, or as
//! a number followed by an AM/PM tag or a DAY/HOUR/MIN/SEC unit tag. All
//! times are carried internally as whole seconds.

/// Seconds in one day.
pub const SECS_PER_DAY: i64 = 86_400;

/// Parse a time token (with an optional following units token) into seconds.
/// Returns `None` when the token cannot be interpreted as a time.
pub fn parse_seconds(time: &str, units: &str) -> Option<i64> {
    // military hr:min:sec format
    if time.contains(':') {
        let mut parts = time.split(':');
        let h: i64 = parts.next()?.trim().parse().ok()?;
        let m: i64 = match parts.next() {
            Some(p) if !p.is_empty() => p.trim().parse().ok()?,
            _ => 0,
        };
        let s: i64 = match parts.next() {
            Some(p) if !p.is_empty() => p.trim().parse().ok()?,
            _ => 0,
        };
        return Some(3600 * h + 60 * m + s);
    }

    let t: f64 = time.parse().ok()?;

    // no units: time was in decimal hours
    if units.is_empty() {
        return Some((3600.0 * t) as i64);
    }

    let u = units.to_ascii_uppercase();
    if u.starts_with("DAY") {
        return Some((3600.0 * 24.0 * t) as i64);
    }
    if u.starts_with("HOUR") {
        return Some((3600.0 * t) as i64);
    }
    if u.starts_with("MIN") {
        return Some((60.0 * t) as i64);
    }
    if u.starts_with("SEC") {
        return Some(t as i64);
    }

    // AM/PM clock times are decimal hours on a 12-hour dial
    if u == "AM" {
        if t >= 13.0 {
            return None;
        }
        let t = if t >= 12.0 { t - 12.0 } else { t };
        return Some((3600.0 * t) as i64);
    }
    if u == "PM" {
        if t >= 13.0 {
            return None;
        }
        let t = if t < 12.0 { t + 12.0 } else { t };
        return Some((3600.0 * t) as i64);
    }
    None
}

/// Format seconds as `h:mm:ss`.
pub fn format_time(seconds: i64) -> String {
    let hours = seconds / 3600;
    let t = seconds - 3600 * hours;
    let minutes = t / 60;
    let secs = t - 60 * minutes;
    format!("{hours}:{minutes:02}:{secs:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hours() {
        assert_eq!(parse_seconds("2.5", ""), Some(9000));
    }

    #[test]
    fn parses_military_time() {
        assert_eq!(parse_seconds("1:30:15", ""), Some(5415));
        assert_eq!(parse_seconds("24:00", ""), Some(86_400));
    }

    #[test]
    fn parses_unit_tags() {
        assert_eq!(parse_seconds("2", "DAYS"), Some(172_800));
        assert_eq!(parse_seconds("90", "MINUTES"), Some(5400));
        assert_eq!(parse_seconds("45", "SECONDS"), Some(45));
    }

    #[test]
    fn parses_am_pm() {
        assert_eq!(parse_seconds("12", "AM"), Some(0));
        assert_eq!(parse_seconds("1.5", "PM"), Some(48_600));
        assert_eq!(parse_seconds("13", "PM"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_seconds("noon", ""), None);
        assert_eq!(parse_seconds("3", "FORTNIGHTS"), None);
    }

    #[test]
    fn formats_round_trip() {
        assert_eq!(format_time(5415), "1:30:15");
        assert_eq!(format_time(0), "0:00:00");
        assert_eq!(parse_seconds(&format_time(86_399), ""), Some(86_399));
    }
}
