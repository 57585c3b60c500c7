// src/decode/line.rs

//! Byte-chunk to line reassembly.
//!
//! Chunk boundaries carry no meaning: whatever follows the last `\n` of a
//! chunk is kept and prefixed to the next one. Lines are split on `\n`, a
//! single trailing `\r` is removed, and lines that are blank after trimming
//! are dropped.

/// Incremental line splitter for one byte stream.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the lines it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.pending.is_empty() {
                push_line(&mut lines, head);
            } else {
                self.pending.extend_from_slice(head);
                let line = std::mem::take(&mut self.pending);
                push_line(&mut lines, &line);
            }
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// End of stream: flush a final line that had no terminating newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        let mut out = Vec::with_capacity(1);
        push_line(&mut out, &line);
        out.pop()
    }

    /// Bytes currently buffered as an incomplete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn push_line(out: &mut Vec<String>, raw: &[u8]) {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return;
    }
    out.push(text.into_owned());
}
