use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};

/// Seconds since the Unix epoch, as stored on turns
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Build a fixed offset from whole hours, falling back to UTC when out of range
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| {
        tracing::warn!("Invalid UTC offset {}h, using UTC", hours);
        Utc.fix()
    })
}

/// Current wall-clock time, e.g. "2026-10-18 14:02:11, Sunday"
pub fn current_time_str(offset: FixedOffset) -> String {
    format_wall_clock(Utc::now().with_timezone(&offset))
}

fn format_wall_clock(at: DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d %H:%M:%S, %A").to_string()
}

/// Render a stored timestamp relative to now ("just now", "yesterday 09:15", ...)
pub fn relative_time(timestamp: f64, offset: FixedOffset) -> String {
    relative_time_at(timestamp, Utc::now().with_timezone(&offset))
}

fn relative_time_at(timestamp: f64, now: DateTime<FixedOffset>) -> String {
    let secs = timestamp.trunc() as i64;
    let Some(then) = offset_timestamp(now.offset(), secs) else {
        return "some time ago".to_string();
    };

    let diff = now.signed_duration_since(then);

    if diff < Duration::minutes(1) {
        "just now".to_string()
    } else if diff < Duration::hours(1) {
        format!("{} minutes ago", diff.num_minutes())
    } else if diff < Duration::days(1) {
        format!("today {}", then.format("%H:%M"))
    } else if diff < Duration::days(2) {
        format!("yesterday {}", then.format("%H:%M"))
    } else if diff < Duration::days(7) {
        format!("{} days ago", diff.num_days())
    } else {
        then.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn offset_timestamp(offset: &FixedOffset, secs: i64) -> Option<DateTime<FixedOffset>> {
    offset.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<FixedOffset> {
        offset_from_hours(8).timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_relative_time_buckets() {
        // 2024-01-10 12:00:00 +08:00
        let now = at(1_704_859_200);
        let base = 1_704_859_200.0;

        assert_eq!(relative_time_at(base - 10.0, now), "just now");
        assert_eq!(relative_time_at(base - 300.0, now), "5 minutes ago");
        assert_eq!(relative_time_at(base - 3.0 * 3600.0, now), "today 09:00");
        assert_eq!(relative_time_at(base - 26.0 * 3600.0, now), "yesterday 10:00");
        assert_eq!(relative_time_at(base - 3.0 * 86400.0, now), "3 days ago");
        assert_eq!(
            relative_time_at(base - 30.0 * 86400.0, now),
            "2023-12-11 12:00"
        );
    }

    #[test]
    fn test_format_wall_clock() {
        assert_eq!(
            format_wall_clock(at(1_704_859_200)),
            "2024-01-10 12:00:00, Wednesday"
        );
    }

    #[test]
    fn test_offset_fallback() {
        assert_eq!(offset_from_hours(100).local_minus_utc(), 0);
        assert_eq!(offset_from_hours(-5).local_minus_utc(), -5 * 3600);
    }
}
