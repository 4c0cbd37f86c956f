//! The byte-stream layer: chunked/line reads, incremental decode, and
//! optional schema validation.

use std::io::{BufRead, Read};

use crate::action::{parse_event, WorkloadEvent};
use crate::decoder::{decode_one, DecodeOutcome};
use crate::error::WorkloadError;
use crate::schema;

const CHUNK_SIZE: usize = 1024;

/// Reads workload events out of a byte stream. Non-interactive streams are
/// read in fixed 1024-byte chunks and accumulated; interactive streams are
/// read one line at a time, replacing rather than appending to the
/// buffer, so a malformed line doesn't block behind a read that will
/// never arrive.
pub struct WorkloadStream<R> {
    reader: R,
    buffer: String,
    interactive: bool,
    validate: bool,
    exhausted: bool,
}

impl<R: BufRead> WorkloadStream<R> {
    pub fn new(reader: R, interactive: bool, validate: bool) -> Self {
        Self { reader, buffer: String::new(), interactive, validate, exhausted: false }
    }

    /// Returns the next valid event, or `Ok(None)` at a clean end of
    /// stream. In interactive mode a schema-invalid event is logged and
    /// skipped rather than returned as an error.
    pub fn next_event(&mut self) -> Result<Option<WorkloadEvent>, WorkloadError> {
        loop {
            match decode_one(&self.buffer)? {
                DecodeOutcome::Done { value, consumed } => {
                    self.buffer.drain(..consumed);
                    match self.check_and_parse(&value) {
                        Ok(event) => return Ok(Some(event)),
                        Err(e) if self.interactive => {
                            log::warn!("skipping invalid workload event: {e}");
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                DecodeOutcome::NeedMore => {
                    if self.exhausted {
                        if self.buffer.trim().is_empty() {
                            return Ok(None);
                        }
                        return Err(WorkloadError::TruncatedInput);
                    }
                    if !self.refill()? {
                        self.exhausted = true;
                    }
                }
            }
        }
    }

    fn check_and_parse(&self, value: &serde_json::Value) -> Result<WorkloadEvent, WorkloadError> {
        if self.validate {
            schema::validate(value)?;
        }
        parse_event(value)
    }

    fn refill(&mut self) -> Result<bool, WorkloadError> {
        if self.interactive {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(false);
            }
            self.buffer = line;
            Ok(true)
        } else {
            let mut chunk = [0u8; CHUNK_SIZE];
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                return Ok(false);
            }
            self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
            Ok(true)
        }
    }
}
