//! Lenient timestamp reading.
//!
//! Documents written by other clients of the store may carry timestamps as
//! RFC 3339 strings, bare ISO dates, epoch milliseconds or `{seconds,
//! nanoseconds}` objects. All of them read as a UTC instant; writes are
//! always RFC 3339.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
    Parts {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
}

pub fn parse_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_raw(raw: RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Text(s) => parse_text(&s),
        RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
        RawTimestamp::Parts {
            seconds,
            nanoseconds,
        } => Utc.timestamp_opt(seconds, nanoseconds).single(),
    }
}

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = RawTimestamp::deserialize(deserializer)?;
    from_raw(raw).ok_or_else(|| serde::de::Error::custom("unreadable timestamp"))
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(r) => from_raw(r)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("unreadable timestamp")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(with = "super")]
        at: chrono::DateTime<chrono::Utc>,
    }

    fn read(v: serde_json::Value) -> String {
        let p: Probe = serde_json::from_value(json!({ "at": v })).expect("timestamp");
        p.at.to_rfc3339()
    }

    #[test]
    fn every_stored_shape_reads_as_the_same_instant() {
        let expected = "2024-01-15T00:00:00+00:00";
        assert_eq!(read(json!("2024-01-15T00:00:00Z")), expected);
        assert_eq!(read(json!("2024-01-15")), expected);
        assert_eq!(read(json!(1705276800000i64)), expected);
        assert_eq!(read(json!({ "seconds": 1705276800, "nanoseconds": 0 })), expected);
    }

    #[test]
    fn garbage_is_rejected() {
        let r: Result<Probe, _> = serde_json::from_value(json!({ "at": "yesterday" }));
        assert!(r.is_err());
    }
}
