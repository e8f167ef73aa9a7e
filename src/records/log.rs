//! Append-only record log.
//!
//! Frame layout (little endian):
//!
//! ```text
//! magic(4) version(1) flags(1) sequence(8) timestamp(8) len(4) content(len) crc32(4)
//! ```
//!
//! The checksum covers the content bytes.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::types::{LogRecord, Sequence, Timestamp};

/// Magic bytes for each record frame.
const LOG_MAGIC: &[u8; 4] = b"SLG\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Frame header size (fixed part).
const FRAME_HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 8 + 4; // magic + version + flags + seq + timestamp + len

/// Trailing checksum size.
const FRAME_TRAILER_SIZE: usize = 4;

/// Outcome of reading one frame.
enum Frame {
    /// A full record and the number of bytes it occupied.
    Complete(LogRecord, u64),
    /// The input ends partway through a frame.
    Truncated,
    /// The input ends exactly on a frame boundary.
    End,
}

/// Append-only record log. Not synchronized; the owner serializes access.
pub struct RecordLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle (the single writer).
    file: File,

    /// Length of the log up to the end of the last complete frame.
    committed: u64,

    /// Sequence the next append will receive.
    next_sequence: Sequence,

    /// Number of writes since last sync.
    writes_since_sync: u64,

    /// Sync every N writes (1 = every write).
    sync_interval: u64,
}

impl RecordLog {
    /// Default sync interval - every write is flushed to disk.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 1;

    /// Open or create a record log with default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a record log with custom sync interval.
    /// - sync_interval = 0 or 1: sync every write (safest, slowest)
    /// - sync_interval = 100: sync every 100 writes
    ///
    /// A partially written frame at the end of the file (a crash mid-append)
    /// is cut off. Any other damage is reported as an error.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let (committed, last_sequence) = Self::recover(&file)?;

        if committed < file_size {
            warn!(
                path = %path.display(),
                committed,
                file_size,
                "truncating incomplete record at end of log"
            );
            file.set_len(committed)?;
            file.sync_all()?;
        }

        Ok(Self {
            path,
            file,
            committed,
            next_sequence: last_sequence.next(),
            writes_since_sync: 0,
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append a record holding `content`.
    ///
    /// On failure the file is cut back to its previous length, so a failed
    /// append leaves no partial frame and consumes no sequence number.
    pub fn append(&mut self, content: &str) -> Result<LogRecord> {
        let record = LogRecord::new(self.next_sequence, content, Timestamp::now());
        let frame = Self::encode(&record)?;

        if let Err(e) = self.write_frame(&frame) {
            self.discard_uncommitted();
            return Err(e);
        }

        self.committed += frame.len() as u64;
        self.next_sequence = self.next_sequence.next();
        Ok(record)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.committed))?;
        self.file.write_all(frame)?;

        // Sync periodically based on sync_interval
        self.writes_since_sync += 1;
        if self.writes_since_sync >= self.sync_interval {
            self.file.sync_data()?;
            self.writes_since_sync = 0;
        }
        Ok(())
    }

    /// Cut the file back to the last complete frame.
    fn discard_uncommitted(&mut self) {
        if let Err(e) = self.file.set_len(self.committed) {
            warn!(
                path = %self.path.display(),
                committed = self.committed,
                error = %e,
                "failed to roll back partial write"
            );
        }
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Every committed record accepted by `predicate`, in log order.
    pub fn scan<F>(&self, predicate: F) -> Result<Vec<LogRecord>>
    where
        F: Fn(&LogRecord) -> bool,
    {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file.take(self.committed));

        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            match Self::read_frame(&mut reader)? {
                Frame::Complete(record, used) => {
                    if predicate(&record) {
                        records.push(record);
                    }
                    offset += used;
                }
                Frame::End => return Ok(records),
                Frame::Truncated => {
                    return Err(StoreError::Corruption(format!(
                        "committed frame at offset {} is incomplete",
                        offset
                    )));
                }
            }
        }
    }

    /// Sequence the next append will receive.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Committed size in bytes.
    pub fn size(&self) -> u64 {
        self.committed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the file and find where the last complete frame ends, along with
    /// the highest sequence seen.
    fn recover(mut file: &File) -> Result<(u64, Sequence)> {
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(file);

        let mut offset = 0;
        let mut last = Sequence(0);
        loop {
            match Self::read_frame(&mut reader)? {
                Frame::Complete(record, used) => {
                    last = last.max(record.sequence);
                    offset += used;
                }
                Frame::End | Frame::Truncated => return Ok((offset, last)),
            }
        }
    }

    /// Serialize a record into one frame.
    fn encode(record: &LogRecord) -> Result<Vec<u8>> {
        let content = record.content.as_bytes();
        let len = u32::try_from(content.len()).map_err(|_| {
            StoreError::InvalidFormat(format!("line too long: {} bytes", content.len()))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + content.len() + FRAME_TRAILER_SIZE);
        frame.extend_from_slice(LOG_MAGIC);
        frame.push(LOG_VERSION);
        frame.push(0u8); // flags (reserved)
        frame.extend_from_slice(&record.sequence.0.to_le_bytes());
        frame.extend_from_slice(&record.timestamp.0.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(content);
        frame.extend_from_slice(&crc32fast::hash(content).to_le_bytes());
        Ok(frame)
    }

    /// Read the next frame from `reader`.
    fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        match read_full(reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < FRAME_HEADER_SIZE => return Ok(Frame::Truncated),
            _ => {}
        }

        if &header[0..4] != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid record magic".into()));
        }
        if header[4] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                header[4]
            )));
        }

        let mut seq_bytes = [0u8; 8];
        seq_bytes.copy_from_slice(&header[6..14]);
        let sequence = Sequence(u64::from_le_bytes(seq_bytes));

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&header[14..22]);
        let timestamp = Timestamp(i64::from_le_bytes(ts_bytes));

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[22..26]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        // Content plus trailing checksum.
        let want = (len + FRAME_TRAILER_SIZE) as u64;
        let mut body = Vec::new();
        reader.by_ref().take(want).read_to_end(&mut body)?;
        if (body.len() as u64) < want {
            return Ok(Frame::Truncated);
        }

        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&body[len..]);
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        body.truncate(len);

        let computed_checksum = crc32fast::hash(&body);
        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let content = String::from_utf8(body)
            .map_err(|e| StoreError::Corruption(format!("record {} is not UTF-8: {}", sequence, e)))?;

        Ok(Frame::Complete(
            LogRecord {
                sequence,
                content,
                timestamp,
            },
            (FRAME_HEADER_SIZE + len + FRAME_TRAILER_SIZE) as u64,
        ))
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input. Returns
/// the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
