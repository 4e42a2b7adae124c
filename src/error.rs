// src/error.rs

//! Crate-wide error types.
//!
//! Per-identifier failures are caught at the work-unit boundary and recorded
//! in the run result with their [`ErrorKind`]; they never abort sibling units.
//! Only a manifest persist failure at the end of a run is fatal, because it
//! risks silent loss of the idempotence tracking.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A replacement file name matched none of the known identifier families,
    /// or an identifier could not be resolved against the roster or the
    /// container's own entry table.
    #[error("unrecognized identifier: {0}")]
    UnrecognizedIdentifier(String),

    /// The remote source could not deliver a bundle within the retry budget.
    #[error("source unavailable for '{identifier}': {reason}")]
    SourceUnavailable { identifier: String, reason: String },

    /// A cached source failed to decode even after eviction and re-fetch.
    #[error("corrupt source for '{identifier}': {reason}")]
    CorruptSource { identifier: String, reason: String },

    /// Structural violation while decoding a container.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// Replacement image dimensions disagree with the target entry.
    #[error(
        "dimension mismatch for '{entry}': entry is {expected_width}x{expected_height}, \
         replacement is {got_width}x{got_height}"
    )]
    DimensionMismatch {
        entry: String,
        expected_width: u32,
        expected_height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// The replacement image could not be decoded.
    #[error("unsupported image format in '{path}': {reason}")]
    UnsupportedImageFormat { path: PathBuf, reason: String },

    /// Re-serialization of a container failed.
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// Manifest could not be read or persisted.
    #[error("manifest I/O error: {0}")]
    ManifestIo(String),

    /// Configuration file missing required values or unparseable.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of an [`Error`], recorded in run results and the
/// machine-readable summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnrecognizedIdentifier,
    SourceUnavailable,
    CorruptSource,
    MalformedContainer,
    DimensionMismatch,
    UnsupportedImageFormat,
    EncodeFailure,
    ManifestIo,
    Config,
    Io,
}

impl Error {
    /// Classify this error for run-result reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnrecognizedIdentifier(_) => ErrorKind::UnrecognizedIdentifier,
            Error::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Error::CorruptSource { .. } => ErrorKind::CorruptSource,
            Error::MalformedContainer(_) => ErrorKind::MalformedContainer,
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::UnsupportedImageFormat { .. } => ErrorKind::UnsupportedImageFormat,
            Error::EncodeFailure(_) => ErrorKind::EncodeFailure,
            Error::ManifestIo(_) => ErrorKind::ManifestIo,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnrecognizedIdentifier => "unrecognized_identifier",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::CorruptSource => "corrupt_source",
            ErrorKind::MalformedContainer => "malformed_container",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::UnsupportedImageFormat => "unsupported_image_format",
            ErrorKind::EncodeFailure => "encode_failure",
            ErrorKind::ManifestIo => "manifest_io",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        };
        write!(f, "{name}")
    }
}
