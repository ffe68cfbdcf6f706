//! Capture files
//!
//! Captures are JSON lines, one packet per line, each wrapped with a format
//! marker and version:
//!
//! ```text
//! {"format":"meshcap-json","version":"1.0","packet":{"fromId":"!a2ebdc20",...}}
//! ```
//!
//! Values JSON cannot express natively are written as tagged objects
//! `{"__type__": "bytes", "__value__": "<base64>"}`. On reading, byte strings
//! become arrays of byte values, datetimes stay ISO-8601 strings, tuples
//! become arrays and protobuf wrappers are replaced by their dict form.
//! Lines without a `format` key are taken as bare packet objects.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const CAPTURE_FORMAT: &str = "meshcap-json";
pub const CAPTURE_VERSION: &str = "1.0";

/// Packet fields that carry raw bytes and are tagged when written.
const BYTE_FIELDS: [&str; 2] = ["encrypted", "payload"];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to open capture file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on capture stream: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid capture record on line {line}: {message}")]
    InvalidFormat { line: usize, message: String },

    #[error("Failed to encode packet: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Iterator over the packets of a capture stream
pub struct CaptureReader<R> {
    reader: R,
    line: usize,
    buf: Vec<u8>,
}

impl CaptureReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path).map_err(|source| CaptureError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> CaptureReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::new(),
        }
    }

    /// 1-based number of the last line read
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for CaptureReader<R> {
    type Item = Result<Value, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(CaptureError::Io(err))),
            }
            self.line += 1;

            let Ok(text) = std::str::from_utf8(&self.buf) else {
                return Some(Err(CaptureError::InvalidFormat {
                    line: self.line,
                    message: "line is not valid UTF-8".to_string(),
                }));
            };

            if text.trim().is_empty() {
                debug!(line = self.line, "skipping blank capture line");
                continue;
            }

            return Some(decode_line(text, self.line));
        }
    }
}

/// Decode one capture line into a packet
pub fn decode_line(line: &str, line_no: usize) -> Result<Value, CaptureError> {
    let invalid = |message: String| CaptureError::InvalidFormat {
        line: line_no,
        message,
    };

    let record: Value =
        serde_json::from_str(line.trim()).map_err(|e| invalid(format!("invalid JSON: {e}")))?;

    let Value::Object(mut wrapper) = record else {
        return Err(invalid("expected a JSON object".to_string()));
    };

    let Some(format) = wrapper.get("format") else {
        return Ok(decode_special_types(Value::Object(wrapper)));
    };

    if format.as_str() != Some(CAPTURE_FORMAT) {
        return Err(invalid(format!("unsupported format {format}")));
    }

    match wrapper.get("version").and_then(Value::as_str) {
        Some(CAPTURE_VERSION) => {}
        other => warn!(
            line = line_no,
            expected = CAPTURE_VERSION,
            found = other.unwrap_or("none"),
            "capture version mismatch"
        ),
    }

    match wrapper.remove("packet") {
        Some(Value::Null) | None => Err(invalid("missing packet data".to_string())),
        Some(packet) => Ok(decode_special_types(packet)),
    }
}

/// Replace tagged `{"__type__", "__value__"}` objects with plain JSON values
pub fn decode_special_types(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let tag = match (map.get("__type__"), map.contains_key("__value__")) {
                (Some(Value::String(kind)), true) => Some(kind.clone()),
                _ => None,
            };
            if let Some(kind) = tag {
                return decode_tagged(&kind, map);
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, decode_special_types(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(decode_special_types).collect()),
        other => other,
    }
}

fn decode_tagged(kind: &str, mut map: Map<String, Value>) -> Value {
    let inner = map.remove("__value__").unwrap_or(Value::Null);

    match (kind, inner) {
        ("bytes", Value::String(encoded)) => match BASE64.decode(encoded.as_bytes()) {
            Ok(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
            Err(err) => {
                warn!(error = %err, "undecodable base64 payload kept as text");
                Value::String(encoded)
            }
        },
        ("datetime", value) => value,
        ("tuple", Value::Array(items)) => {
            Value::Array(items.into_iter().map(decode_special_types).collect())
        }
        ("protobuf", value) => decode_special_types(value),
        (kind, value) => {
            warn!(kind, "unknown special type in capture");
            map.insert("__value__".to_string(), value);
            Value::Object(map)
        }
    }
}

/// Tag raw byte fields so they round-trip through the capture format
pub fn encode_special_types(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let encoded = match as_byte_array(v) {
                        Some(bytes) if BYTE_FIELDS.contains(&k.as_str()) => {
                            json!({"__type__": "bytes", "__value__": BASE64.encode(bytes)})
                        }
                        _ => encode_special_types(v),
                    };
                    (k.clone(), encoded)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(encode_special_types).collect()),
        other => other.clone(),
    }
}

fn as_byte_array(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

/// Writes packets in capture format, flushing after each one
pub struct CaptureWriter<W: Write> {
    writer: W,
    written: usize,
}

impl CaptureWriter<File> {
    pub fn create(path: &Path) -> Result<Self, CaptureError> {
        let file = File::create(path).map_err(|source| CaptureError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write_packet(&mut self, packet: &Value) -> Result<(), CaptureError> {
        let wrapper = json!({
            "format": CAPTURE_FORMAT,
            "version": CAPTURE_VERSION,
            "packet": encode_special_types(packet),
        });
        serde_json::to_writer(&mut self.writer, &wrapper)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Number of packets written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
