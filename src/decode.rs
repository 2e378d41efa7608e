use serde::Deserialize;
use serde_json::de::StrRead;
use serde_json::value::RawValue;
use serde_json::{Map, StreamDeserializer, Value};

use crate::errors::DecodeError;

/// One decoded event: tag, optional epoch-seconds timestamp, field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub tag: String,
    pub timestamp: Option<i64>,
    pub fields: Map<String, Value>,
}

/// Wire frame: a three-element array `[tag, timestamp-or-null, fields]`.
/// The fields sub-payload stays raw until the second decode stage so a
/// malformed payload is reported against its tag.
#[derive(Deserialize)]
struct WireRecord<'a>(String, Option<i64>, #[serde(borrow)] &'a RawValue);

/// Lazy, single-pass reader over one buffered chunk. A chunk is a
/// concatenation of independently-decodable wire frames; iteration yields
/// events in chunk order and any decode failure fails the whole flush.
pub struct ChunkReader<'a> {
    frames: StreamDeserializer<'a, StrRead<'a>, WireRecord<'a>>,
}

impl std::fmt::Debug for ChunkReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader").finish_non_exhaustive()
    }
}

impl<'a> ChunkReader<'a> {
    pub fn new(chunk: &'a [u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(chunk).map_err(|err| DecodeError::Encoding {
            reason: err.to_string(),
        })?;
        Ok(Self {
            frames: serde_json::Deserializer::from_str(text).into_iter(),
        })
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.frames.byte_offset();
        let WireRecord(tag, timestamp, payload) = match self.frames.next()? {
            Ok(frame) => frame,
            Err(err) => {
                return Some(Err(DecodeError::Frame {
                    offset,
                    reason: err.to_string(),
                }));
            }
        };

        let fields: Map<String, Value> = match serde_json::from_str(payload.get()) {
            Ok(fields) => fields,
            Err(err) => {
                return Some(Err(DecodeError::Payload {
                    tag,
                    reason: err.to_string(),
                }));
            }
        };

        Some(Ok(Event {
            tag,
            timestamp,
            fields,
        }))
    }
}

/// Encode side of the wire format, used by the upstream formatter stage.
#[derive(Debug, Default)]
pub struct ChunkBuilder {
    buf: Vec<u8>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        tag: &str,
        timestamp: Option<i64>,
        fields: &Map<String, Value>,
    ) -> Result<(), serde_json::Error> {
        serde_json::to_writer(&mut self.buf, &(tag, timestamp, fields))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
