use std::io;

use crate::ids::{ResourceId, TypeConversionError};

/// Everything that can go wrong while locating or decoding a resource.
///
/// Load-path failures are recorded on the affected record and logged; they
/// do not escalate out of `ResourceManager::find`. Construction-time
/// failures (`MapNotFound`, `NoSourceFiles`, `UnsupportedVersion`) abort
/// setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error during operation: {0}")]
    Io(#[from] io::Error),
    #[error("resource is empty (size 0)")]
    EmptyResource,
    #[error("resource map entry is invalid: {0}")]
    InvalidMapEntry(String),
    #[error("resource map file not found")]
    MapNotFound,
    #[error("resource map contains no entries")]
    EmptyMap,
    #[error("no resource files found")]
    NoSourceFiles,
    #[error("unknown compression method {0}")]
    UnknownCompression(u16),
    #[error("decompression failed: buffer overflow")]
    DecompressionOverflow,
    #[error("decompression failed: sanity check failed")]
    DecompressionInsane,
    #[error("resource too big ({0} bytes)")]
    ResourceTooBig(u32),
    #[error("resource version is unsupported")]
    UnsupportedVersion,
    #[error("script resource has an unrecognized structure")]
    InvalidScriptVersion,
    #[error("resource ID mismatch: expected {expected:?}, got {got:?}")]
    ResourceIdMismatch {
        expected: ResourceId,
        got: ResourceId,
    },
}

impl From<TypeConversionError> for Error {
    fn from(err: TypeConversionError) -> Self {
        Error::InvalidMapEntry(err.to_string())
    }
}
