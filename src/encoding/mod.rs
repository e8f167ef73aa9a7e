//! Wire framing for the `/logs` stream.
//!
//! An [`Encoder`] turns records and reset markers into bytes on a writer.
//! Encoders only accept [`LogRecord`]s, so there is no way to hand one
//! something it cannot frame.

mod json_lines;
mod sse;
mod template;

pub use json_lines::JsonLinesEncoder;
pub use sse::SseEncoder;
pub use template::LineTemplate;

use serde::Serialize;
use std::io::Write;

use crate::error::Result;
use crate::types::LogRecord;

/// Frames records for one viewer connection.
pub trait Encoder {
    /// Write one record.
    fn encode_record(&mut self, record: &LogRecord) -> Result<()>;

    /// Write the marker telling the viewer to discard what it shows.
    fn encode_reset(&mut self) -> Result<()>;

    /// Push buffered bytes to the connection.
    fn flush(&mut self) -> Result<()>;
}

/// Stream formats offered by `/logs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line.
    JsonLines,
    /// Server-Sent Events.
    EventStream,
}

impl Format {
    /// Value for the response `Content-Type` header.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::JsonLines => "application/jsonl",
            Format::EventStream => "text/event-stream",
        }
    }

    /// Pick a format from an `Accept` header. Anything that does not ask for
    /// an event stream gets JSON lines.
    pub fn from_accept(accept: &str) -> Self {
        if accept.contains("text/event-stream") {
            Format::EventStream
        } else {
            Format::JsonLines
        }
    }

    /// Box an encoder of this format over `writer`.
    pub fn encoder<'w, W: Write + 'w>(self, writer: W) -> Box<dyn Encoder + 'w> {
        match self {
            Format::JsonLines => Box::new(JsonLinesEncoder::new(writer)),
            Format::EventStream => Box::new(SseEncoder::new(writer)),
        }
    }
}

/// JSON shape of a record on the wire.
#[derive(Serialize)]
pub(crate) struct WireRecord<'a> {
    pub line: &'a str,
    pub timestamp: String,
}

impl<'a> From<&'a LogRecord> for WireRecord<'a> {
    fn from(record: &'a LogRecord) -> Self {
        Self {
            line: &record.content,
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode_record(&mut self, record: &LogRecord) -> Result<()> {
        (**self).encode_record(record)
    }

    fn encode_reset(&mut self) -> Result<()> {
        (**self).encode_reset()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(Format::JsonLines.content_type(), "application/jsonl");
        assert_eq!(Format::EventStream.content_type(), "text/event-stream");
    }

    #[test]
    fn test_format_from_accept() {
        assert_eq!(Format::from_accept("text/event-stream"), Format::EventStream);
        assert_eq!(Format::from_accept("*/*"), Format::JsonLines);
        assert_eq!(Format::from_accept(""), Format::JsonLines);
    }
}
