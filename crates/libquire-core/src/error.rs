use thiserror::Error;

use crate::types::ids::{Id, IdParseError, ObjectId};
use crate::types::lamport::LamportTime;

/// Reasons an entity or one of its versions fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("entity has no version")]
    NoVersion,

    #[error("non-chronological version ({previous} --> {next})")]
    NonChronological {
        previous: LamportTime,
        next: LamportTime,
    },

    #[error("entity id {id} should be the hash of its first version ({expected})")]
    IdMismatch { id: Id, expected: Id },

    #[error("invalid id: {0}")]
    InvalidId(#[from] IdParseError),

    #[error("version {index}: {reason}")]
    InvalidVersion { index: usize, reason: String },

    #[error("version {index} is signed by unknown key {key} (not valid at time {time})")]
    UnknownSigningKey {
        index: usize,
        key: String,
        time: LamportTime,
    },

    #[error("version {index} has an invalid signature")]
    BadSignature { index: usize },
}

/// Failure to decode a stored version
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed version data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported version format {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },
}

/// Outcome of comparing two histories that cannot be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeConflict {
    #[error("merging unrelated entities is not supported (local {local}, remote {remote})")]
    Foreign { local: Id, remote: Id },

    #[error(
        "non fast-forward merge: histories diverge at version {index} (local {local}, remote {remote})"
    )]
    Divergence {
        index: usize,
        local: ObjectId,
        remote: ObjectId,
    },

    #[error("cannot merge a history with uncommitted versions")]
    Uncommitted,
}

/// Configuration loading and saving errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("key error: {0}")]
    Key(#[from] crate::signing::SigningError),
}
