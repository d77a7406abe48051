//! Live packet capture, protocol decoding and durable protocol counters.
//!
//! Three pieces compose the runtime: a bounded [`queue::CaptureQueue`]
//! between capture and analysis, a layered [`decode`] stack that turns raw
//! frames into emitted record lines, and a [`stats`] subsystem that
//! persists counters to JSON and (optionally) a database. [`pipeline`]
//! wires the three long-lived threads together.

pub mod capture;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod emit;
pub mod env_file;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod stats;
