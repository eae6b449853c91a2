pub mod async_writer;
pub mod writer_jsonl;

pub use async_writer::{drain_events, spawn_output_writer, WriterStats};
pub use writer_jsonl::{render_error, render_result, OutputFormat, ScanEvent, TargetError};
