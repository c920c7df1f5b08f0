#![doc = include_str!("../README.md")]

pub mod file;
pub mod loki;
pub mod registry;
pub mod stdout;

// --- 주요 타입 re-export ---

pub use file::{FileSink, FileSinkConfig, FileSource, FileSourceConfig};
pub use loki::{LokiEntry, LokiSink, LokiSinkConfig};
pub use registry::{build_sink, build_source};
pub use stdout::StdoutSink;
