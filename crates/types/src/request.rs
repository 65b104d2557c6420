//! Write requests handed to the batch writer

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use batchwrite_errors::WriteError;
use serde::{Deserialize, Serialize};

use crate::{Encoding, PERMISSION_MASK};

/// Payload of a single file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    /// Text, turned into bytes with the request's encoding
    Text(String),
    /// Raw bytes, written as-is
    Bytes(Vec<u8>),
}

impl FileContents {
    /// Bytes that land on disk for the file at `path`. `encoding` only
    /// applies to text.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::InvalidContent` when text cannot be decoded with
    /// `encoding` (malformed base64 or hex).
    pub fn encode(&self, encoding: Encoding, path: &Path) -> Result<Cow<'_, [u8]>, WriteError> {
        match (self, encoding) {
            (Self::Bytes(bytes), _) => Ok(Cow::Borrowed(bytes)),
            (Self::Text(text), Encoding::Utf8) => Ok(Cow::Borrowed(text.as_bytes())),
            (Self::Text(text), encoding) => encoding
                .encode(text)
                .map(Cow::Owned)
                .map_err(|message| WriteError::InvalidContent {
                    path: path.to_path_buf(),
                    encoding: encoding.to_string(),
                    message,
                }),
        }
    }
}

impl From<&str> for FileContents {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FileContents {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FileContents {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for FileContents {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Numeric owner and group applied to a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    #[must_use]
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// One file of a batch.
///
/// `mode` and `ownership` left as `None` are inherited from the existing
/// target when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub path: PathBuf,
    pub contents: FileContents,
    pub encoding: Option<Encoding>,
    pub mode: Option<u32>,
    pub ownership: Option<Ownership>,
}

impl WriteRequest {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<FileContents>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            encoding: None,
            mode: None,
            ownership: None,
        }
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Permission bits for the target; anything above `0o7777` is dropped.
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode & PERMISSION_MASK);
        self
    }

    #[must_use]
    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = Some(ownership);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding in effect for this request.
    #[must_use]
    pub fn effective_encoding(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }
}
