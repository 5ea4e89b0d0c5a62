//! Log record representation: the unit of ingestion and of transport.
//!
//! A [`LogRecord`] is built by application code or a framework adapter,
//! validated synchronously on enqueue, and serialized verbatim into the
//! `{"logs": [...]}` batch payload. Timestamps travel as ISO-8601 with
//! millisecond precision and a trailing `Z`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::ValidationError;
use crate::level::{Importance, LogLevel, LogType};

/// A single structured log entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRecord {
    /// Creation instant; serialized as e.g. `2026-08-01T12:00:00.123Z`.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub log_type: LogType,
    pub importance: Importance,
    pub message: String,
    /// Exception class name; only meaningful when `log_type` is `exception`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Free-form structured context. The serialized map is size-capped at
    /// validation time but otherwise opaque to the pipeline.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Construct a record with the current timestamp and default
    /// `logger`/`standard` classification.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            log_type: LogType::default(),
            importance: Importance::default(),
            message: message.into(),
            error_type: None,
            error_message: None,
            stack_trace: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Construct an exception record.
    pub fn exception(
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        let error_message = error_message.into();
        let mut record = Self::new(LogLevel::Error, error_message.clone());
        record.log_type = LogType::Exception;
        record.importance = Importance::High;
        record.error_type = Some(error_type.into());
        record.error_message = Some(error_message);
        record.stack_trace = Some(stack_trace.into());
        record
    }

    /// Override the record's timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Override the record's origin classification.
    #[must_use]
    pub fn with_log_type(mut self, log_type: LogType) -> Self {
        self.log_type = log_type;
        self
    }

    /// Override the record's delivery importance.
    #[must_use]
    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Attach one structured attribute.
    #[must_use]
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}

fn serialize_timestamp<S: Serializer>(
    timestamp: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
}

/// Parse a timestamp string from a producer.
///
/// Accepts RFC 3339 with any offset (normalized to UTC) and naive
/// `YYYY-MM-DDTHH:MM:SS[.frac]` strings, which are assumed to already be UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidTimestamp(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[rstest]
    fn serializes_minimal_record_without_optional_fields() {
        let record = LogRecord::new(LogLevel::Info, "hello").with_timestamp(fixed_timestamp());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2026-08-01T12:00:00.000Z");
        assert_eq!(json["level"], "info");
        assert_eq!(json["log_type"], "logger");
        assert_eq!(json["importance"], "standard");
        assert_eq!(json["message"], "hello");
        assert!(json.get("error_type").is_none());
        assert!(json.get("attributes").is_none());
    }

    #[rstest]
    fn exception_record_carries_all_error_fields() {
        let record = LogRecord::exception("ValueError", "bad input", "at main.rs:1");
        assert_eq!(record.log_type, LogType::Exception);
        assert_eq!(record.importance, Importance::High);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["error_type"], "ValueError");
        assert_eq!(json["error_message"], "bad input");
        assert_eq!(json["stack_trace"], "at main.rs:1");
    }

    #[rstest]
    fn attributes_serialize_as_nested_object() {
        let record = LogRecord::new(LogLevel::Info, "req")
            .with_attribute("status", 200)
            .with_attribute("path", "/api/users");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attributes"]["status"], 200);
        assert_eq!(json["attributes"]["path"], "/api/users");
    }

    #[rstest]
    fn timestamp_keeps_millisecond_precision() {
        let ts = Utc.timestamp_opt(1_754_049_600, 123_000_000).unwrap();
        let record = LogRecord::new(LogLevel::Info, "x").with_timestamp(ts);
        let json = serde_json::to_value(&record).unwrap();
        let rendered = json["timestamp"].as_str().unwrap();
        assert!(rendered.ends_with(".123Z"), "got {rendered}");
    }

    #[rstest]
    #[case("2026-08-01T12:00:00Z")]
    #[case("2026-08-01T14:00:00+02:00")]
    fn parses_rfc3339_to_utc(#[case] input: &str) {
        let ts = parse_timestamp(input).unwrap();
        assert_eq!(ts, fixed_timestamp());
    }

    #[rstest]
    fn naive_timestamp_is_treated_as_utc() {
        let ts = parse_timestamp("2026-08-01T12:00:00.250").unwrap();
        assert_eq!(ts.timezone(), Utc);
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[rstest]
    fn unparseable_timestamp_is_rejected() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }
}
