//! The error type for replay.

use crate::glws::WindowingError;
use crate::var::DeserializeError;

use std::path::PathBuf;
use std::{fmt, io};

/// Errors that stop a replay.
///
/// Handles that don't refer to anything, and binds that fail, are not errors:
/// a recording may legitimately mention objects the replay never created. But
/// if we can't create a surface or context at all, nothing that follows can be
/// replayed meaningfully.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create a replay surface for recorded drawable 0x{id:x}")]
    CreateSurface {
        id: u64,
        #[source]
        source: WindowingError,
    },

    #[error("failed to create a replay context for recorded context 0x{id:x}")]
    CreateContext {
        id: u64,
        #[source]
        source: WindowingError,
    },

    #[error("call {serial}: bad argument data")]
    Argument {
        serial: usize,
        #[source]
        source: DeserializeError,
    },

    #[error("error writing snapshot {}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("glx-replay calls file {} is zero-length.\n\
             Are you recording to the same file you're trying to replay from?",
            .path.display())]
    EmptyRecording { path: PathBuf },

    #[error("glx-replay header does not match:\nexpected: {expected}\nactual:   {actual}")]
    HeaderMismatch {
        expected: HeaderSummary,
        actual: HeaderSummary,
    },

    #[error("glx-replay calls file has {extra} bytes left over after the last whole call")]
    PartialCall { extra: usize },

    #[error("glx-replay call {serial} has invalid discriminant {tag}")]
    BadDiscriminant { serial: usize, tag: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A printable copy of a recording header's fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderSummary {
    pub magic: u32,
    pub size_of_usize: u8,
    pub size_of_call: u8,
    pub max_alignment: u8,
}

impl fmt::Display for HeaderSummary {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "magic 0x{:08x}, usize {} bytes, call {} bytes, alignment {}",
            self.magic, self.size_of_usize, self.size_of_call, self.max_alignment
        )
    }
}
