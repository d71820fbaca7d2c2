//! Exchanging entity refs with a remote
//!
//! - `fetch` mirrors the remote's namespace into remote-tracking refs
//! - `pull` fetches then runs the merge engine over the mirrors
//! - `push` sends every local ref the remote-tracking mirror lacks

use libquire_core::refs::{fetch_refspec, id_from_ref, local_prefix, remote_ref};
use libquire_core::{Entity, Id, MergeStatus};
use tracing::{debug, info, warn};

use crate::engine::{merge_all, MergeOptions, MergeResult};
use crate::error::{GitError, SyncError};
use crate::repo::Repo;

/// Result of a pull
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullReport {
    /// Summary from the transport
    pub fetched: String,
    pub new: Vec<Id>,
    pub updated: Vec<Id>,
    /// Refs reported as already merged
    pub unchanged: usize,
}

/// Result of a push
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: Vec<Id>,
    /// Refs the remote-tracking mirror already had
    pub up_to_date: usize,
}

/// Fetch the remote's refs of kind `E` into `refs/remotes/<remote>/...`
pub fn fetch<E, R>(repo: &R, remote: &str) -> Result<String, GitError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    let refspec = fetch_refspec(E::NAMESPACE, remote);
    debug!(remote, refspec = %refspec, "fetching");
    repo.fetch_refs(remote, &refspec)
}

/// Push every local ref of kind `E` that is ahead of its remote-tracking ref.
///
/// The remote refuses non-fast-forward updates; the first refusal aborts the
/// push so the caller can pull and retry.
pub fn push<E, R>(repo: &R, remote: &str) -> Result<PushReport, SyncError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    let mut report = PushReport::default();

    for local in repo.list_refs(&local_prefix(E::NAMESPACE))? {
        let id = match id_from_ref(&local) {
            Ok(id) => id,
            Err(e) => {
                warn!(ref_name = %local, error = %e, "skipping malformed local ref");
                continue;
            }
        };
        let tracking = remote_ref(E::NAMESPACE, remote, &id);

        if let Ok(commits) = repo.commits_between(&tracking, &local) {
            if commits.is_empty() {
                report.up_to_date += 1;
                continue;
            }
        }

        repo.push_ref(remote, &local)?;

        // mirror what the remote now holds
        let head = repo.resolve_ref(&local)?;
        let previous = if repo.ref_exists(&tracking)? {
            Some(repo.resolve_ref(&tracking)?)
        } else {
            None
        };
        repo.update_ref(&tracking, &head, previous.as_ref())?;

        info!(id = id.human(), remote, "pushed");
        report.pushed.push(id);
    }
    Ok(report)
}

/// Fetch, then merge every remote-tracking ref.
///
/// The whole merge stream is drained; the first `Invalid` or `Error`
/// result fails the pull once all other refs had their chance to merge.
pub fn pull<E, R>(repo: R, remote: &str, options: MergeOptions) -> Result<PullReport, SyncError>
where
    E: Entity,
    R: Repo + Send + 'static,
{
    let fetched = fetch::<E, R>(&repo, remote)?;
    let stream = merge_all::<E, R>(repo, remote, options)?;

    let mut report = PullReport {
        fetched,
        ..Default::default()
    };
    let mut failure: Option<SyncError> = None;

    for result in stream {
        match result.status {
            MergeStatus::New => report.new.extend(result.id),
            MergeStatus::Updated => report.updated.extend(result.id),
            MergeStatus::Nothing => report.unchanged += 1,
            MergeStatus::Invalid | MergeStatus::Error => {
                if failure.is_none() {
                    failure = Some(into_failure(result));
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

fn into_failure<E>(result: MergeResult<E>) -> SyncError {
    let id = result.label().to_string();
    match result.err {
        Some(err) => err,
        None => SyncError::MergeFailure {
            id,
            reason: result.reason.unwrap_or_default(),
        },
    }
}
