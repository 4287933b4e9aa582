//! Append-only buffer for one child output stream.

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 8 * 1024;

/// Collects the chunks of one output stream in arrival order.
///
/// Bytes are kept raw until the flush point so that a multi-byte character
/// split across two reads decodes the same as if it arrived whole.
///
/// With a limit, bytes past it are counted as overflow and dropped; the
/// stream is still read to the end so the child never blocks on a full pipe.
#[derive(Debug, Default)]
pub struct Accumulator {
    buf: Vec<u8>,
    chunks: usize,
    limit: Option<usize>,
    overflowed: bool,
}

impl Accumulator {
    /// Create an empty, unbounded accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty accumulator that keeps at most `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Append one chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.chunks += 1;

        let room = self
            .limit
            .map_or(chunk.len(), |limit| limit.saturating_sub(self.buf.len()));
        if chunk.len() > room {
            self.overflowed = true;
        }
        self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// Whether bytes were dropped because the limit was reached.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// The configured byte limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of non-empty chunks appended so far.
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Total bytes collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Flush the collected bytes into text, replacing invalid UTF-8.
    #[must_use]
    pub fn into_string(self) -> String {
        match String::from_utf8(self.buf) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    /// Read `reader` to end-of-stream, appending each read as a chunk.
    ///
    /// # Errors
    ///
    /// Returns the first read error.
    pub async fn drain<R>(mut self, mut reader: R) -> std::io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(self);
            }
            self.push(&chunk[..n]);
        }
    }
}
