//! Storage capabilities needed by the loader, commit writer and merge engine
//!
//! Refs are full names (`refs/identities/<id>`). Every write that moves an
//! existing ref is compare-and-swap; nothing here overwrites a ref blindly.

use libquire_core::{LamportTime, ObjectId};

use crate::error::GitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
}

/// One entry of a stored tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub oid: ObjectId,
    pub kind: ObjectKind,
}

impl TreeEntry {
    pub fn blob(name: impl Into<String>, oid: ObjectId) -> Self {
        Self {
            name: name.into(),
            oid,
            kind: ObjectKind::Blob,
        }
    }

    pub fn tree(name: impl Into<String>, oid: ObjectId) -> Self {
        Self {
            name: name.into(),
            oid,
            kind: ObjectKind::Tree,
        }
    }
}

pub trait Repo {
    /// Full names of all refs starting with `prefix`, sorted
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>, GitError>;

    fn ref_exists(&self, refname: &str) -> Result<bool, GitError>;

    fn resolve_ref(&self, refname: &str) -> Result<ObjectId, GitError>;

    /// Commits reachable from `main` but not from `exclude`.
    ///
    /// A missing `exclude` ref is an error, not an empty exclusion set.
    fn commits_between(&self, exclude: &str, main: &str) -> Result<Vec<ObjectId>, GitError>;

    /// First-parent history of a ref, oldest commit first
    fn list_commits(&self, refname: &str) -> Result<Vec<ObjectId>, GitError>;

    /// Create `dest` pointing where `source` points. Fails if `dest` exists.
    fn copy_ref(&self, source: &str, dest: &str) -> Result<(), GitError>;

    /// Move `refname` to `target` if it currently points at `expected`.
    ///
    /// `expected: None` means the ref must not exist yet.
    fn update_ref(
        &self,
        refname: &str,
        target: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<(), GitError>;

    fn store_data(&self, data: &[u8]) -> Result<ObjectId, GitError>;

    fn read_data(&self, oid: &ObjectId) -> Result<Vec<u8>, GitError>;

    fn store_tree(&self, entries: &[TreeEntry]) -> Result<ObjectId, GitError>;

    /// Entries of a tree, or of a commit's root tree
    fn read_tree(&self, oid: &ObjectId) -> Result<Vec<TreeEntry>, GitError>;

    fn store_commit(&self, tree: &ObjectId, parent: Option<&ObjectId>)
        -> Result<ObjectId, GitError>;

    /// Fetch from `remote` with a single refspec; returns a short summary
    fn fetch_refs(&self, remote: &str, refspec: &str) -> Result<String, GitError>;

    /// Push one ref to the same name on `remote`, refusing non-fast-forwards
    fn push_ref(&self, remote: &str, refname: &str) -> Result<String, GitError>;

    /// Advance a named clock and return the new time
    fn increment_clock(&self, name: &str) -> Result<LamportTime, GitError>;

    /// Make sure a named clock is at least `time`
    fn witness_clock(&self, name: &str, time: LamportTime) -> Result<(), GitError>;
}
