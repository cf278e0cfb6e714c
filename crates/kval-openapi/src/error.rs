//! Error types for schema resolution and patching.

use std::path::PathBuf;

use thiserror::Error;

/// A hard failure from a schema source.
///
/// "Not found" is not an error: sources return `Ok(None)` for that.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A combinator was built with no members.
    #[error("{combinator}: composition has no sources")]
    EmptyComposition { combinator: String },

    /// A configured path is unusable.
    #[error("{origin}: {path} is not a directory")]
    MissingDirectory { origin: String, path: PathBuf },

    #[error("{origin}: failed to read {path}: {error}")]
    Io {
        origin: String,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// A document or patch file was read but could not be understood.
    #[error("{origin}: failed to parse {location}: {reason}")]
    Parse {
        origin: String,
        location: String,
        reason: String,
    },

    #[error("{origin}: request to {url} failed: {error}")]
    Http {
        origin: String,
        url: String,
        #[source]
        error: reqwest::Error,
    },

    /// The server answered with a non-success, non-404 status.
    #[error("{origin}: {url} returned HTTP {status}")]
    Status {
        origin: String,
        url: String,
        status: u16,
    },

    /// Kubeconfig or client setup problem.
    #[error("{origin}: {reason}")]
    Config { origin: String, reason: String },

    /// A previous attempt already failed and the source stopped trying.
    #[error("{origin}: unavailable: {reason}")]
    Unavailable { origin: String, reason: String },

    #[error("failed to apply schema patch for {group_version}: {error}")]
    Patch {
        group_version: String,
        #[source]
        error: PatchError,
    },
}

/// Failure of a single RFC 6902 operation or of patch decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid patch document: {reason}")]
    Malformed { reason: String },

    #[error("invalid JSON pointer {pointer:?}")]
    InvalidPointer { pointer: String },

    #[error("path {pointer:?} does not exist")]
    PathNotFound { pointer: String },

    #[error("invalid array index in {pointer:?}")]
    InvalidIndex { pointer: String },

    #[error("test failed: value at {pointer:?} does not match")]
    TestFailed { pointer: String },

    #[error("cannot move {from:?} into its own child {pointer:?}")]
    MoveIntoChild { from: String, pointer: String },

    /// Wraps the failing operation's error with its position.
    #[error("operation {index}: {error}")]
    Operation {
        index: usize,
        #[source]
        error: Box<PatchError>,
    },
}
