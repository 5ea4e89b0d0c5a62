//! Synchronous record validation and truncation.
//!
//! Runs on the producer's thread inside `enqueue`, so everything here is pure
//! computation over one record: no allocation beyond the truncated strings,
//! no I/O, no locks. Oversized bounded fields are truncated with a visible
//! marker; only structurally broken records are rejected.

use chrono::Timelike;

use crate::error::ValidationError;
use crate::level::LogType;
use crate::record::LogRecord;

/// Byte limit for `message`.
pub const MAX_MESSAGE_BYTES: usize = 10_000;
/// Byte limit for `error_type`.
pub const MAX_ERROR_TYPE_BYTES: usize = 255;
/// Byte limit for `error_message`.
pub const MAX_ERROR_MESSAGE_BYTES: usize = 5_000;
/// Byte limit for `stack_trace`.
pub const MAX_STACK_TRACE_BYTES: usize = 50_000;
/// Byte limit for the serialized `attributes` map. Exceeding it is a
/// validation failure, not a truncation.
pub const MAX_ATTRIBUTES_BYTES: usize = 100 * 1024;
/// Suffix appended to every truncated string field.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Validate one record, truncating oversized string fields in place.
///
/// On success the returned record satisfies every size invariant and its
/// timestamp has been clamped to millisecond precision (excess precision is
/// truncated, not rounded). Exception detail fields on a non-exception record
/// are cleared rather than rejected.
pub fn validate(mut record: LogRecord) -> Result<LogRecord, ValidationError> {
    if record.message.is_empty() {
        return Err(ValidationError::MissingField("message"));
    }

    truncate_in_place(&mut record.message, MAX_MESSAGE_BYTES);

    if record.log_type == LogType::Exception {
        if let Some(error_type) = record.error_type.as_mut() {
            truncate_in_place(error_type, MAX_ERROR_TYPE_BYTES);
        }
        if let Some(error_message) = record.error_message.as_mut() {
            truncate_in_place(error_message, MAX_ERROR_MESSAGE_BYTES);
        }
        if let Some(stack_trace) = record.stack_trace.as_mut() {
            truncate_in_place(stack_trace, MAX_STACK_TRACE_BYTES);
        }
    } else {
        record.error_type = None;
        record.error_message = None;
        record.stack_trace = None;
    }

    if !record.attributes.is_empty() {
        let size = serde_json::to_vec(&record.attributes)
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX);
        if size > MAX_ATTRIBUTES_BYTES {
            return Err(ValidationError::AttributesTooLarge {
                size,
                limit: MAX_ATTRIBUTES_BYTES,
            });
        }
    }

    let millis = record.timestamp.nanosecond() / 1_000_000 * 1_000_000;
    if let Some(clamped) = record.timestamp.with_nanosecond(millis) {
        record.timestamp = clamped;
    }

    Ok(record)
}

/// Truncate `value` to at most `limit` bytes, appending [`TRUNCATION_MARKER`].
///
/// The cut lands on a UTF-8 character boundary so the result remains valid.
fn truncate_in_place(value: &mut String, limit: usize) {
    if value.len() <= limit {
        return;
    }
    let mut keep = limit - TRUNCATION_MARKER.len();
    while keep > 0 && !value.is_char_boundary(keep) {
        keep -= 1;
    }
    value.truncate(keep);
    value.push_str(TRUNCATION_MARKER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    fn empty_message_is_a_missing_field() {
        let record = LogRecord::new(LogLevel::Info, "");
        assert_eq!(
            validate(record),
            Err(ValidationError::MissingField("message"))
        );
    }

    #[rstest]
    fn oversized_message_is_truncated_with_marker() {
        let record = LogRecord::new(LogLevel::Info, "x".repeat(MAX_MESSAGE_BYTES + 500));
        let validated = validate(record).unwrap();
        assert_eq!(validated.message.len(), MAX_MESSAGE_BYTES);
        assert!(validated.message.ends_with(TRUNCATION_MARKER));
    }

    #[rstest]
    fn message_at_limit_is_untouched() {
        let record = LogRecord::new(LogLevel::Info, "x".repeat(MAX_MESSAGE_BYTES));
        let validated = validate(record).unwrap();
        assert_eq!(validated.message.len(), MAX_MESSAGE_BYTES);
        assert!(!validated.message.ends_with(TRUNCATION_MARKER));
    }

    #[rstest]
    fn truncation_respects_utf8_boundaries() {
        // Each snowman is three bytes, so the cut point falls mid-character.
        let record = LogRecord::new(LogLevel::Info, "\u{2603}".repeat(MAX_MESSAGE_BYTES));
        let validated = validate(record).unwrap();
        assert!(validated.message.len() <= MAX_MESSAGE_BYTES);
        assert!(validated.message.ends_with(TRUNCATION_MARKER));
        assert!(std::str::from_utf8(validated.message.as_bytes()).is_ok());
    }

    #[rstest]
    #[case(MAX_ERROR_TYPE_BYTES + 10, MAX_ERROR_MESSAGE_BYTES + 10, MAX_STACK_TRACE_BYTES + 10)]
    fn exception_fields_are_truncated_to_their_limits(
        #[case] type_len: usize,
        #[case] message_len: usize,
        #[case] trace_len: usize,
    ) {
        let record = LogRecord::exception(
            "E".repeat(type_len),
            "m".repeat(message_len),
            "t".repeat(trace_len),
        );
        let validated = validate(record).unwrap();
        assert_eq!(validated.error_type.as_ref().unwrap().len(), MAX_ERROR_TYPE_BYTES);
        assert_eq!(
            validated.error_message.as_ref().unwrap().len(),
            MAX_ERROR_MESSAGE_BYTES
        );
        assert_eq!(
            validated.stack_trace.as_ref().unwrap().len(),
            MAX_STACK_TRACE_BYTES
        );
        for field in [
            validated.error_type.as_ref().unwrap(),
            validated.error_message.as_ref().unwrap(),
            validated.stack_trace.as_ref().unwrap(),
        ] {
            assert!(field.ends_with(TRUNCATION_MARKER));
        }
    }

    #[rstest]
    fn error_fields_on_non_exception_record_are_cleared() {
        let mut record = LogRecord::new(LogLevel::Error, "boom");
        record.error_type = Some("ValueError".into());
        record.stack_trace = Some("trace".into());
        let validated = validate(record).unwrap();
        assert!(validated.error_type.is_none());
        assert!(validated.stack_trace.is_none());
    }

    #[rstest]
    fn oversized_attributes_fail_instead_of_truncating() {
        let record = LogRecord::new(LogLevel::Info, "big")
            .with_attribute("blob", "v".repeat(MAX_ATTRIBUTES_BYTES));
        assert!(matches!(
            validate(record),
            Err(ValidationError::AttributesTooLarge { .. })
        ));
    }

    #[rstest]
    fn sub_millisecond_precision_is_truncated_not_rounded() {
        let ts = Utc.timestamp_opt(1_754_049_600, 123_999_999).unwrap();
        let record = LogRecord::new(LogLevel::Info, "ts").with_timestamp(ts);
        let validated = validate(record).unwrap();
        assert_eq!(validated.timestamp.timestamp_subsec_millis(), 123);
        assert_eq!(validated.timestamp.timestamp_subsec_micros(), 123_000);
    }
}
