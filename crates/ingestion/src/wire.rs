//! Live wire codec
//!
//! One reading per line, encoded as a flat JSON object mapping attribute name
//! to value. Objects carrying a `QUIT` or `END` key are sentinels regardless
//! of their value.

use contracts::{Reading, END_SENTINEL, QUIT_SENTINEL};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{IngestionError, Result};

/// Default frame limit (64 KiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Client disconnects
    Quit,
    /// End of one logical run
    End,
    /// Ordinary reading
    Reading(Reading),
}

impl Frame {
    /// Encode as a single newline-terminated line
    pub fn to_line(&self) -> String {
        let object: Map<String, Value> = match self {
            Self::Quit => Map::from_iter([(QUIT_SENTINEL.to_string(), Value::Bool(true))]),
            Self::End => Map::from_iter([(END_SENTINEL.to_string(), Value::Bool(true))]),
            Self::Reading(reading) => reading
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        };
        let mut line = Value::Object(object).to_string();
        line.push('\n');
        line
    }
}

/// Decode one line (without limit checks)
///
/// Returns `Ok(None)` for blank lines.
pub fn decode_line(line: &[u8]) -> Result<Option<Frame>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| IngestionError::malformed_frame(format!("invalid utf-8: {e}")))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let object: Map<String, Value> = serde_json::from_str(text)
        .map_err(|e| IngestionError::malformed_frame(format!("expected JSON object: {e}")))?;

    if object.contains_key(QUIT_SENTINEL) {
        return Ok(Some(Frame::Quit));
    }
    if object.contains_key(END_SENTINEL) {
        return Ok(Some(Frame::End));
    }

    let mut reading = Reading::new();
    for (name, value) in object {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(IngestionError::malformed_frame(format!(
                    "attribute '{name}' is not a scalar"
                )))
            }
        };
        reading.insert(&name, value);
    }
    Ok(Some(Frame::Reading(reading)))
}

/// Line-oriented frame reader with a bounded line buffer
pub struct FrameReader<R> {
    reader: R,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    /// Create with the default frame limit
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_bytes(reader, DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create with an explicit frame limit
    pub fn with_max_frame_bytes(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            max_frame_bytes,
            buf: Vec::new(),
        }
    }

    /// Read the next non-blank frame; `Ok(None)` at end of stream
    ///
    /// # Errors
    /// `MalformedFrame` / `FrameTooLong` are recoverable: the offending line has
    /// been consumed and the next call continues with the following one.
    /// `Io` means the transport is gone.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.buf.clear();
            // one extra byte for the terminating newline
            let limit = self.max_frame_bytes as u64 + 1;
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Ok(None);
            }
            if n as u64 == limit && self.buf.last() != Some(&b'\n') {
                let skipped = self.discard_line().await?;
                return Err(IngestionError::FrameTooLong {
                    len: n + skipped,
                    limit: self.max_frame_bytes,
                });
            }
            if let Some(frame) = decode_line(&self.buf)? {
                return Ok(Some(frame));
            }
        }
    }

    /// Consume the rest of an overlong line without buffering it
    async fn discard_line(&mut self) -> Result<usize> {
        let mut skipped = 0;
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(skipped);
            }
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.reader.consume(pos + 1);
                    return Ok(skipped + pos + 1);
                }
                None => {
                    let len = chunk.len();
                    self.reader.consume(len);
                    skipped += len;
                }
            }
        }
    }
}
