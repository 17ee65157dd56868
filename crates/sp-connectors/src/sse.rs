//! Server-sent-event line scanning for the status endpoint.
//!
//! The status endpoint speaks a minimal SSE dialect: the payload we care
//! about arrives on lines prefixed `data:`, and the stream closes once
//! the task leaves its running states. This module isolates the line
//! handling from the HTTP client so buffering edge cases (partial
//! chunks, multiple `data:` lines, heartbeat comments) are unit-tested
//! in one place.

/// Returns the payload of an SSE `data:` line, or `None` for any other
/// line (comments, event names, heartbeats, blanks).
///
/// Per the SSE format, a single space after the colon is separator, not
/// payload.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.trim_end_matches('\r').strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Scans a complete event-stream body and returns the first `data:`
/// payload, if any.
pub fn first_data_payload(body: &str) -> Option<&str> {
    body.lines().find_map(data_payload)
}

/// Incremental line assembler for a chunked byte stream.
///
/// Chunks arrive with no alignment guarantee; a `data:` line may be
/// split across several of them. `push` buffers bytes and yields every
/// newline-terminated line completed so far.
#[derive(Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            lines.push(text);
        }
        lines
    }

    /// Returns whatever is buffered after the final chunk, unterminated.
    pub fn remainder(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}
