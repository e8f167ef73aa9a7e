use std::io::Write;

use super::{Encoder, WireRecord};
use crate::error::Result;
use crate::types::LogRecord;

/// Reset marker line.
const RESET_LINE: &[u8] = b"{\"event\":\"reset\"}\n";

/// `application/jsonl`: `{"line": ..., "timestamp": ...}` per line.
pub struct JsonLinesEncoder<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Encoder for JsonLinesEncoder<W> {
    fn encode_record(&mut self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&WireRecord::from(record))?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        Ok(())
    }

    fn encode_reset(&mut self) -> Result<()> {
        self.writer.write_all(RESET_LINE)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
