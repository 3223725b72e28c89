//! Response accumulation buffer with terminator search.
//!
//! Bytes read from the shell are appended as they arrive; after every
//! append the buffer is scanned for any of the expected terminator
//! substrings. Only the region that could contain a new match is searched:
//! the bytes just appended plus enough of the old tail to catch a
//! terminator that straddles two reads.

use bytes::BytesMut;
use memchr::memmem;

/// Buffer for accumulating shell output and spotting terminators.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    /// The accumulated output.
    buffer: BytesMut,

    /// Offset up to which no terminator can start.
    scanned: usize,
}

impl ResponseBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
        }
    }

    /// Append newly received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Find the first terminator that occurs in the unscanned tail.
    ///
    /// Returns the index of the matching terminator in `terminators`.
    pub fn find_terminator<S: AsRef<str>>(&mut self, terminators: &[S]) -> Option<usize> {
        let longest = terminators
            .iter()
            .map(|t| t.as_ref().len())
            .max()
            .unwrap_or(0);
        let start = self.scanned.saturating_sub(longest.saturating_sub(1));
        let region = &self.buffer[start..];

        let found = terminators.iter().position(|t| {
            let needle = t.as_ref().as_bytes();
            !needle.is_empty() && memmem::find(region, needle).is_some()
        });

        self.scanned = self.buffer.len();
        found
    }

    /// Whether the whole buffer contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        contains(&self.buffer, needle)
    }

    /// Take the buffered bytes and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.scanned = 0;
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

/// Whether `haystack` contains `needle` as a byte substring.
pub fn contains(haystack: &[u8], needle: &str) -> bool {
    memmem::find(haystack, needle.as_bytes()).is_some()
}

/// Split raw shell output into lines.
///
/// Each byte is decoded as ISO-8859-1, so any byte sequence survives
/// unchanged. Lines break on `\r\n`, `\n` or a lone `\r`; a trailing
/// partial line (typically the prompt) is kept.
pub fn split_lines(data: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut iter = data.iter().peekable();

    while let Some(&byte) = iter.next() {
        match byte {
            b'\r' => {
                if iter.peek() == Some(&&b'\n') {
                    iter.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            b'\n' => lines.push(std::mem::take(&mut current)),
            other => current.push(char::from(other)),
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
