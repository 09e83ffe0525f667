//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Timelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current local wall-clock time, used for event timeline matching
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Truncate a wall-clock time to its minute (seconds and fraction dropped)
pub fn minute_of(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Minutes since midnight for a wall-clock time
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Serde adapter for `"HH:MM"` wall-clock times in event plans
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }

    #[test]
    fn test_minute_of_drops_seconds() {
        let t = NaiveTime::from_hms_opt(21, 30, 42).unwrap();
        assert_eq!(minute_of(t), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
    }

    #[test]
    fn test_minutes_since_midnight() {
        assert_eq!(minutes_since_midnight(NaiveTime::from_hms_opt(0, 0, 0).unwrap()), 0);
        assert_eq!(minutes_since_midnight(NaiveTime::from_hms_opt(19, 45, 10).unwrap()), 1185);
    }

    #[test]
    fn test_hhmm_accepts_seconds_and_rejects_garbage() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "hhmm")]
            at: NaiveTime,
        }

        let w: Wrapper = serde_json::from_str(r#"{"at":"18:05"}"#).unwrap();
        assert_eq!(w.at, NaiveTime::from_hms_opt(18, 5, 0).unwrap());

        let w: Wrapper = serde_json::from_str(r#"{"at":"18:05:30"}"#).unwrap();
        assert_eq!(w.at, NaiveTime::from_hms_opt(18, 5, 30).unwrap());

        assert!(serde_json::from_str::<Wrapper>(r#"{"at":"late"}"#).is_err());
    }
}
