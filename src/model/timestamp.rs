//! Timestamp inference for the last log column.

use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};

/// A parsed sample time.
///
/// Offset-aware inputs are normalised to UTC. Naive inputs are kept as
/// written; the two kinds never meet in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timestamp {
    Aware(DateTime<Utc>),
    Naive(NaiveDateTime),
}

impl Timestamp {
    pub fn is_aware(&self) -> bool {
        matches!(self, Timestamp::Aware(_))
    }

    /// Wall-clock value used for arithmetic (UTC for aware inputs).
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            Timestamp::Aware(dt) => dt.naive_utc(),
            Timestamp::Naive(dt) => *dt,
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timestamp::Aware(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Timestamp::Naive(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const AWARE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses the timestamp forms a progress log may carry.
///
/// Accepted:
/// - RFC 3339 with `Z` or a numeric offset, e.g. `2024-01-01T08:00:00.123456789+08:00`
/// - ISO 8601 without offset, e.g. `2024-01-01T00:00:05` or `2024-01-01T00:00`
/// - a bare date, e.g. `2024-01-01` (midnight)
#[derive(Debug, Clone)]
pub struct TimestampParser {
    offset_suffix: Regex,
}

impl TimestampParser {
    pub fn new() -> anyhow::Result<Self> {
        let offset_suffix = Regex::new(r"(?:[Zz]|[+-]\d{2}:?\d{2})$")?;
        Ok(Self { offset_suffix })
    }

    pub fn parse(&self, s: &str) -> anyhow::Result<Timestamp> {
        if self.offset_suffix.is_match(s) && s.contains('T') {
            return self.parse_aware(s).map(Timestamp::Aware);
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Timestamp::Naive(dt));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
            return Ok(Timestamp::Naive(date.and_time(NaiveTime::MIN)));
        }

        bail!("unrecognized timestamp {:?}", s)
    }

    fn parse_aware(&self, s: &str) -> anyhow::Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        // `%z` does not take `Z`; spell it out as +00:00.
        let spelled = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
            Some(head) => format!("{}+00:00", head),
            None => s.to_string(),
        };
        for fmt in AWARE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(&spelled, fmt) {
                return Ok(dt.with_timezone(&Utc));
            }
        }
        bail!("unrecognized timestamp {:?}", s)
    }
}
