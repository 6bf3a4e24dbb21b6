use chrono::{DateTime, Utc};

/// Formats a millisecond timestamp as HH:MM:SS.mmm (UTC)
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => format!("Invalid timestamp: {}", timestamp_ms),
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00.000");
        // 2023-11-14T22:13:20.123Z
        assert_eq!(format_timestamp(1_700_000_000_123), "22:13:20.123");
    }

    #[test]
    fn test_format_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), format!("Invalid timestamp: {}", i64::MAX));
    }
}
