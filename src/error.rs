//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while loading
//! book files and resolving their covers. All errors are uniformly wrapped in
//! the [BookError] enumeration, and every variant carries the path (and entry
//! name where relevant) of the file being processed.
//!
//! ## Main Error Types
//!
//! - [BookError] - Enumeration of errors during loading and cover resolution
//! - [ErrorKind] - Coarse category of a [BookError], for callers that branch on it

use std::path::Path;

use thiserror::Error;

/// Types of errors that can occur while loading a book file
///
/// Every error is terminal for the call that produced it. Nothing is retried
/// internally; the caller decides whether to retry or skip the file.
#[derive(Debug, Error)]
pub enum BookError {
    /// Filesystem error
    ///
    /// Occurs when the book file cannot be opened, stat'ed or read.
    #[error("IO error: could not access \"{path}\": {source}")]
    IOError {
        path: String,
        source: std::io::Error,
    },

    /// Content hashing error
    ///
    /// Occurs when the number of bytes hashed does not match the size recorded
    /// when the file was stat'ed, or when the stream fails while hashing.
    #[error("Hash error: could not hash \"{path}\": {reason}")]
    HashError { path: String, reason: String },

    /// Container format error
    ///
    /// Occurs when the file is not a valid container of the expected kind,
    /// when the container is empty, or when an entry cannot be (re)opened.
    #[error("Format error: \"{path}\": {reason}")]
    FormatError {
        path: String,
        reason: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },

    /// Image decoding error
    ///
    /// Occurs when the cover entry cannot be decoded as an image. Panics raised
    /// inside the decoder are reported through this variant as well.
    #[error("Decode error: could not decode cover \"{entry}\" in \"{path}\": {reason}")]
    DecodeError {
        path: String,
        entry: String,
        reason: String,
    },

    /// No cover error
    ///
    /// Occurs when a cover is requested from a book for which no cover
    /// entry was identified at load time.
    #[error("No cover: \"{path}\" has no cover entry.")]
    NoCoverError { path: String },

    /// Unknown format error
    ///
    /// Occurs when no registered loader accepts the file, neither by
    /// extension nor by content.
    #[error("Unknown format: no loader is registered for \"{path}\".")]
    UnknownFormat { path: String },
}

/// Coarse category of a [BookError]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Hash,
    Format,
    Decode,
    NoCover,
    UnknownFormat,
}

impl BookError {
    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookError::IOError { .. } => ErrorKind::Io,
            BookError::HashError { .. } => ErrorKind::Hash,
            BookError::FormatError { .. } => ErrorKind::Format,
            BookError::DecodeError { .. } => ErrorKind::Decode,
            BookError::NoCoverError { .. } => ErrorKind::NoCover,
            BookError::UnknownFormat { .. } => ErrorKind::UnknownFormat,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        BookError::IOError {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn hash(path: &Path, reason: impl Into<String>) -> Self {
        BookError::HashError {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        BookError::FormatError {
            path: path.display().to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn archive(
        path: &Path,
        reason: impl Into<String>,
        source: zip::result::ZipError,
    ) -> Self {
        BookError::FormatError {
            path: path.display().to_string(),
            reason: reason.into(),
            source: Some(source),
        }
    }
}
