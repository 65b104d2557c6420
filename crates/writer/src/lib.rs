#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Atomic multi-file writes for batchwrite
//!
//! A batch is written in three phases. Every target is first resolved
//! through symlinks and, unless overridden, inherits the mode and ownership
//! of the file it replaces. Every payload is then written to a uniquely
//! named temp file. Finally each temp file is renamed over its target.
//!
//! Temp files are tracked in a process-wide [`TempRegistry`] from the moment
//! their path is allocated until their rename succeeds. A failing batch, and
//! process exit or termination while a batch is in flight, unlink whatever
//! is still registered.
//!
//! ```no_run
//! use batchwrite::{write_batch, WriteRequest};
//!
//! # async fn run() -> batchwrite::Result<()> {
//! write_batch([
//!     WriteRequest::new("foo.txt", "foo"),
//!     WriteRequest::new("bar.bin", vec![0xBA, 0x55]).with_mode(0o600),
//! ])
//! .await
//! # }
//! ```

pub mod exit;
mod pipeline;
pub mod registry;
mod staging;
mod writer;

pub use exit::ExitGuard;
pub use registry::TempRegistry;
pub use writer::{write_batch, AtomicWriter};

pub use batchwrite_config::{TempLocation, WriterConfig};
pub use batchwrite_errors::{Error, Phase, Result, WriteError};
pub use batchwrite_events::{channel, EventReceiver, EventSender, WriteEvent};
pub use batchwrite_types::{Encoding, FileContents, Ownership, WriteRequest};
