//! Causal merge of two version histories
//!
//! Histories are compared from their common prefix. Only fast-forwards are
//! accepted: concurrent edits of the same entity are reported as a
//! divergence and never merged automatically.

use std::fmt;

use serde::Serialize;

use crate::entity::VersionRecord;
use crate::error::MergeConflict;

/// Successful comparison of a local and a remote history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The local history already contains the remote one
    UpToDate,
    /// The remote history extends the local one by `adopted` versions
    FastForward { adopted: usize },
}

/// Compare two committed version sequences of the same entity
pub fn reconcile<V: VersionRecord>(
    local: &[V],
    remote: &[V],
) -> Result<Reconciliation, MergeConflict> {
    if local.iter().chain(remote).any(|v| v.commit().is_none()) {
        return Err(MergeConflict::Uncommitted);
    }

    let (ours, theirs) = match (local.first(), remote.first()) {
        (Some(ours), Some(theirs)) => (ours.content_id(), theirs.content_id()),
        (None, _) => {
            return Ok(if remote.is_empty() {
                Reconciliation::UpToDate
            } else {
                Reconciliation::FastForward {
                    adopted: remote.len(),
                }
            })
        }
        (Some(_), None) => return Ok(Reconciliation::UpToDate),
    };
    if ours != theirs {
        return Err(MergeConflict::Foreign {
            local: ours,
            remote: theirs,
        });
    }

    let common = local
        .iter()
        .zip(remote)
        .take_while(|(l, r)| l.commit() == r.commit())
        .count();

    if common == remote.len() {
        return Ok(Reconciliation::UpToDate);
    }
    if common == local.len() {
        return Ok(Reconciliation::FastForward {
            adopted: remote.len() - common,
        });
    }

    // both sides are committed, checked above
    match (local[common].commit(), remote[common].commit()) {
        (Some(l), Some(r)) => Err(MergeConflict::Divergence {
            index: common,
            local: l.clone(),
            remote: r.clone(),
        }),
        _ => Err(MergeConflict::Uncommitted),
    }
}

/// Per-entity outcome reported by the merge engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
    /// The entity did not exist locally and was created
    New,
    /// The local history was fast-forwarded
    Updated,
    /// Nothing to do
    Nothing,
    /// Remote data was rejected; the run continues
    Invalid,
    /// Local store failure; the run was aborted
    Error,
}

impl MergeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStatus::New => "new",
            MergeStatus::Updated => "updated",
            MergeStatus::Nothing => "nothing",
            MergeStatus::Invalid => "invalid",
            MergeStatus::Error => "error",
        }
    }

    /// Whether a pull seeing this status must fail
    pub fn is_failure(&self) -> bool {
        matches!(self, MergeStatus::Invalid | MergeStatus::Error)
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
