#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for batchwrite
//!
//! This crate provides the request types callers hand to the batch writer:
//! target path, contents, text encoding and optional permission/ownership
//! overrides.

pub mod encoding;
pub mod request;

// Re-export commonly used types
pub use encoding::Encoding;
pub use request::{FileContents, Ownership, WriteRequest};

/// Permission bits kept from a mode; file type bits are dropped.
pub const PERMISSION_MASK: u32 = 0o7777;
