// src/decode/stream.rs

//! Async side of the decoder: pull lines lazily from an `AsyncRead` and
//! forward them as events.

use std::collections::VecDeque;
use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::bridge::EventSink;
use crate::types::LogEvent;

use super::line::LineDecoder;
use super::record::{parse_stdout_line, stderr_line};

/// Read size per syscall. Lines longer than this simply span reads.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Which worker pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn to_event(self, line: &str) -> LogEvent {
        match self {
            StreamKind::Stdout => parse_stdout_line(line),
            StreamKind::Stderr => stderr_line(line),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Lazy line sequence over a byte stream.
pub struct LineStream<R> {
    reader: R,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    buf: Box<[u8]>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            buf: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            eof: false,
        }
    }

    /// Next complete line, or `None` once the stream is exhausted.
    ///
    /// A read error ends the stream. Any buffered tail is yielded first, in
    /// which case the error itself is only logged.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            match self.reader.read(&mut self.buf).await {
                Ok(0) => {
                    self.eof = true;
                    self.ready.extend(self.decoder.finish());
                }
                Ok(n) => {
                    self.ready.extend(self.decoder.push(&self.buf[..n]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.eof = true;
                    if let Some(tail) = self.decoder.finish() {
                        debug!(error = %e, "read error after partial line; flushing tail");
                        self.ready.push_back(tail);
                    }
                    if self.ready.is_empty() {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Drain `reader` to the end, forwarding one event per line into `sink`.
///
/// Returns the number of lines forwarded. Read errors end the stream; they
/// are logged, not propagated.
pub async fn drain<R>(reader: R, stream: StreamKind, sink: EventSink) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineStream::new(reader);
    let mut forwarded = 0usize;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                sink.emit(stream.to_event(&line)).await;
                forwarded += 1;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%stream, error = %e, "error reading worker output; stream closed");
                break;
            }
        }
    }

    debug!(%stream, lines = forwarded, "worker stream drained");
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventSink;
    use crate::types::LogKind;

    #[tokio::test]
    async fn lines_are_yielded_lazily_across_tiny_reads() {
        let data: &[u8] = b"first\nsec\r\nthird";
        let mut lines = LineStream::with_chunk_size(data, 3);

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("sec"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("third"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn drain_tags_events_per_stream() {
        let (sink, mut rx) = EventSink::channel(16);

        let out: &[u8] = b"{\"type\":\"start\",\"message\":\"go\"}\nnot json\n";
        let n = drain(out, StreamKind::Stdout, sink.clone()).await;
        assert_eq!(n, 2);

        let err: &[u8] = b"{\"type\":\"start\",\"message\":\"go\"}\n";
        assert_eq!(drain(err, StreamKind::Stderr, sink).await, 1);

        let kinds: Vec<LogKind> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|e| e.kind)
        .collect();
        assert_eq!(kinds, vec![LogKind::AgentEvent, LogKind::StdoutRaw, LogKind::Error]);
    }
}
