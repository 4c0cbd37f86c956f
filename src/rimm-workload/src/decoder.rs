//! Incremental JSON object decoding: decode as much of the buffer as
//! forms a complete object, and treat a ran-out-of-input parse failure as
//! "need more bytes" rather than a hard error. A genuinely malformed
//! document still surfaces as a real error.

use crate::error::WorkloadError;

#[derive(Debug)]
pub enum DecodeOutcome {
    /// The buffer holds no complete object yet (possibly after skipping
    /// leading whitespace); the caller must read more input.
    NeedMore,
    /// One object was decoded; `consumed` is the number of leading bytes
    /// (including any skipped whitespace) the caller should drop from its
    /// buffer.
    Done { value: serde_json::Value, consumed: usize },
}

/// Attempts to decode one JSON value from the front of `buf`.
pub fn decode_one(buf: &str) -> Result<DecodeOutcome, WorkloadError> {
    let trimmed = buf.trim_start();
    let skipped = buf.len() - trimmed.len();
    if trimmed.is_empty() {
        return Ok(DecodeOutcome::NeedMore);
    }

    let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<serde_json::Value>();
    match stream.next() {
        Some(Ok(value)) => {
            let consumed = skipped + stream.byte_offset();
            Ok(DecodeOutcome::Done { value, consumed })
        }
        Some(Err(e)) if e.is_eof() => Ok(DecodeOutcome::NeedMore),
        Some(Err(e)) => Err(WorkloadError::Json(e)),
        None => Ok(DecodeOutcome::NeedMore),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_object_and_reports_consumed_bytes() {
        let buf = "  {\"a\":1}{\"b\":2}";
        let outcome = decode_one(buf).unwrap();
        match outcome {
            DecodeOutcome::Done { value, consumed } => {
                assert_eq!(value, serde_json::json!({"a": 1}));
                assert_eq!(&buf[consumed..], "{\"b\":2}");
            }
            DecodeOutcome::NeedMore => panic!("expected a decoded object"),
        }
    }

    #[test]
    fn truncated_object_requests_more_input() {
        let buf = "{\"a\":1, \"b\":";
        assert!(matches!(decode_one(buf).unwrap(), DecodeOutcome::NeedMore));
    }

    #[test]
    fn malformed_json_is_a_real_error() {
        let buf = "{\"a\": }";
        assert!(decode_one(buf).is_err());
    }

    #[test]
    fn empty_buffer_requests_more_input() {
        assert!(matches!(decode_one("   ").unwrap(), DecodeOutcome::NeedMore));
    }
}
