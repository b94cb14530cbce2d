//! Clock helpers.

use chrono::Utc;

/// Current unix time in whole seconds, as stored in item and collection
/// metadata.
pub fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Current unix time in milliseconds, for deadline arithmetic that needs
/// sub-second resolution.
pub fn unix_now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_consistent_with_seconds() {
        let secs = unix_now();
        let millis = unix_now_millis();
        let diff = millis / 1000 - secs as i64;
        assert!(diff.abs() <= 1, "clock sources disagree: {diff}s");
    }
}
