//! Core error types for mptree-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of path encoding and tree configuration.

use thiserror::Error;

/// Core errors produced by the mptree-core crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A sibling position does not fit in one segment, or a full path would
    /// exceed the configured maximum length.
    #[error("path overflow from '{path}': {reason}")]
    PathOverflow { path: String, reason: String },

    /// A segment contains characters outside the alphabet or has the wrong width.
    #[error("invalid path segment '{segment}': {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// A position name did not match any known insertion position.
    #[error("unknown position: '{0}'")]
    UnknownPosition(String),

    /// The tree configuration is unusable.
    #[error("invalid tree configuration: {reason}")]
    InvalidConfig { reason: String },
}
