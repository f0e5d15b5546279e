//! Stream-clock helpers. Stream time is kept as `u64` nanoseconds.

use std::time::Duration;

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Saturating conversion of a `Duration` to stream nanoseconds.
#[inline]
pub fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Render an elapsed time as `m:ss` for operator displays.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "0:00");
        assert_eq!(format_elapsed(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00");
    }

    #[test]
    fn test_nanos_saturates() {
        assert_eq!(nanos(Duration::from_millis(40)), 40_000_000);
        assert_eq!(nanos(Duration::MAX), u64::MAX);
    }
}
