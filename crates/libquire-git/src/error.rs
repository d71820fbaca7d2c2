use std::path::PathBuf;

use libquire_core::{DecodeError, IdParseError, ObjectId, ValidationError};
use thiserror::Error;

/// Errors from the ref/object store and the transport
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    #[error("ref already exists: {refname}")]
    RefExists { refname: String },

    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        refname: String,
        expected: String,
        actual: String,
    },

    #[error("object not found: {oid}")]
    ObjectNotFound { oid: String },

    #[error("invalid object id: {0}")]
    InvalidObjectId(#[from] IdParseError),

    #[error("remote not found: {remote}")]
    RemoteNotFound { remote: String },

    #[error("push rejected for {refname}: {reason}")]
    PushRejected { refname: String, reason: String },

    #[error("clock error: {0}")]
    Clock(String),
}

/// Errors reading an entity back from its ref
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ref not found: {refname}")]
    RefNotFound { refname: String },

    #[error("commit {commit} holds no version")]
    MissingVersion { commit: ObjectId },

    #[error("commit {commit}: {source}")]
    Decode {
        commit: ObjectId,
        #[source]
        source: DecodeError,
    },

    #[error("invalid entity: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] GitError),
}

/// Errors from committing, merging and syncing entities
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid entity: {0}")]
    Invalid(#[from] ValidationError),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("nothing to commit for {id}")]
    NothingToCommit { id: String },

    #[error("merge failure for {id}: {reason}")]
    MergeFailure { id: String, reason: String },
}

impl SyncError {
    /// Whether a push was refused because the remote moved on
    pub fn is_push_rejected(&self) -> bool {
        matches!(self, SyncError::Git(GitError::PushRejected { .. }))
    }
}
