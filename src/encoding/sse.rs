use std::io::Write;

use super::{Encoder, LineTemplate, WireRecord};
use crate::error::Result;
use crate::types::LogRecord;

/// Reset event.
const RESET_EVENT: &[u8] = b"event: reset\ndata: reset\n\n";

/// `text/event-stream`: one `data:` event per record.
///
/// Payloads are the record as JSON, or the record rendered through a
/// [`LineTemplate`] when one is set.
pub struct SseEncoder<W: Write> {
    writer: W,
    template: Option<LineTemplate>,
}

impl<W: Write> SseEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            template: None,
        }
    }

    pub fn with_template(writer: W, template: LineTemplate) -> Self {
        Self {
            writer,
            template: Some(template),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, payload: &str) -> Result<()> {
        let mut frame = String::with_capacity(payload.len() + 8);
        // A payload with line breaks becomes several data fields.
        for line in payload.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line.strip_suffix('\r').unwrap_or(line));
            frame.push('\n');
        }
        frame.push('\n');
        self.writer.write_all(frame.as_bytes())?;
        Ok(())
    }
}

impl<W: Write> Encoder for SseEncoder<W> {
    fn encode_record(&mut self, record: &LogRecord) -> Result<()> {
        let payload = match &self.template {
            Some(template) => template.render(record),
            None => serde_json::to_string(&WireRecord::from(record))?,
        };
        self.write_event(&payload)
    }

    fn encode_reset(&mut self) -> Result<()> {
        self.writer.write_all(RESET_EVENT)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
