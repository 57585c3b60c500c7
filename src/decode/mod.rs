// src/decode/mod.rs

//! Event stream decoder.
//!
//! - [`line`] reassembles newline-delimited lines from arbitrary byte chunks.
//! - [`record`] turns one line into a [`LogEvent`](crate::types::LogEvent).
//! - [`stream`] drives both over an async pipe and pushes events to a sink.
//!
//! One decoder per stream; stdout and stderr never share state.

pub mod line;
pub mod record;
pub mod stream;

pub use line::LineDecoder;
pub use record::{parse_stdout_line, stderr_line, WireRecord};
pub use stream::{drain, LineStream, StreamKind};
