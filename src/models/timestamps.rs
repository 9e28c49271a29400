//! Timestamp policy.
//!
//! Every timestamp is stored as `TIMESTAMP WITHOUT TIME ZONE` holding UTC
//! wall-clock time. Input may carry an offset (RFC 3339), in which case it is
//! converted to UTC; naive input is taken to already be UTC. Output never
//! carries an offset.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Current UTC time at the precision Postgres stores.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

pub fn parse(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            "Datetime has wrong format. Use one of these formats instead: \
             YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z]."
                .to_string()
        })
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| "Date has wrong format. Use YYYY-MM-DD.".to_string())
}

pub fn format(value: &NaiveDateTime) -> String {
    value.format(OUTPUT_FORMAT).to_string()
}

pub mod utc_naive {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(D::Error::custom)
    }
}

pub mod utc_naive_option {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => super::parse(&raw).map(Some).map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(parse("2025-08-01T19:00:00Z").unwrap(), at(2025, 8, 1, 19, 0));
        assert_eq!(parse("2025-08-01T21:00:00+02:00").unwrap(), at(2025, 8, 1, 19, 0));
    }

    #[test]
    fn naive_input_is_taken_as_utc() {
        assert_eq!(parse("2025-08-01T19:00:00").unwrap(), at(2025, 8, 1, 19, 0));
        assert_eq!(parse("2025-08-01 19:00").unwrap(), at(2025, 8, 1, 19, 0));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse("tomorrow evening").is_err());
        assert!(parse_date("01/08/2025").is_err());
        assert_eq!(parse_date("2025-08-01").unwrap(), NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
    }

    #[test]
    fn output_has_no_offset() {
        assert_eq!(format(&at(2025, 8, 1, 19, 0)), "2025-08-01T19:00:00");
    }

    #[test]
    fn now_is_truncated_to_microseconds() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }
}
