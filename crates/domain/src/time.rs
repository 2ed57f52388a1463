//! Time and timestamp helpers.

use chrono::{DateTime, Local, Utc};

/// UTC timestamp used for capture records and log fields.
pub type Timestamp = DateTime<Utc>;

/// Layout of capture labels, e.g. `20240131_235959`.
pub const CAPTURE_LABEL_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Format a timestamp as a capture label in local time.
#[must_use]
pub fn capture_label(ts: Timestamp) -> String {
    ts.with_timezone(&Local)
        .format(CAPTURE_LABEL_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_format_capture_label_as_date_underscore_time() {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let local = naive.and_local_timezone(Local).single().unwrap();
        let label = capture_label(local.with_timezone(&Utc));
        assert_eq!(label, "20240131_235958");
    }

    #[test]
    fn should_produce_fifteen_character_label() {
        let label = capture_label(now());
        assert_eq!(label.len(), 15);
        assert_eq!(label.as_bytes()[8], b'_');
    }
}
