//! Merging remote-tracking histories into local refs
//!
//! [`merge_all`] lists the remote-tracking refs of one entity kind, then
//! hands them to a producer thread that reconciles them one at a time and
//! streams a [`MergeResult`] per ref. Per-ref problems with remote data are
//! reported as `Invalid` and the run goes on. Local storage failures are
//! reported as `Error` and end the run.
//!
//! Dropping the [`MergeStream`] cancels the run after the ref in progress.

use libquire_core::refs::{id_from_ref, local_ref, remote_prefix};
use libquire_core::{Entity, Id, MergeStatus, ValidationError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{GitError, LoadError, SyncError};
use crate::loader::read;
use crate::repo::Repo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Emit `Nothing` for refs already up to date instead of skipping them
    pub report_unchanged: bool,
}

/// Outcome of merging one remote-tracking ref
#[derive(Debug)]
pub struct MergeResult<E> {
    /// Remote-tracking ref this result is about
    pub ref_name: String,
    /// Entity id, when the ref name carried a valid one
    pub id: Option<Id>,
    pub status: MergeStatus,
    /// The merged local entity for `New`, `Updated` and `Nothing`
    pub entity: Option<E>,
    /// Why the ref was `Invalid` or failed
    pub reason: Option<String>,
    /// Underlying error for `Error`
    pub err: Option<SyncError>,
}

impl<E> MergeResult<E> {
    fn merged(ref_name: &str, id: Id, status: MergeStatus, entity: Option<E>) -> Self {
        Self {
            ref_name: ref_name.to_string(),
            id: Some(id),
            status,
            entity,
            reason: None,
            err: None,
        }
    }

    fn invalid(ref_name: &str, id: Option<Id>, reason: String) -> Self {
        Self {
            ref_name: ref_name.to_string(),
            id,
            status: MergeStatus::Invalid,
            entity: None,
            reason: Some(reason),
            err: None,
        }
    }

    fn error(ref_name: &str, id: Option<Id>, context: &str, err: SyncError) -> Self {
        Self {
            ref_name: ref_name.to_string(),
            id,
            status: MergeStatus::Error,
            entity: None,
            reason: Some(format!("{}: {}", context, err)),
            err: Some(err),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Short id for display, falling back to the ref name
    pub fn label(&self) -> &str {
        match &self.id {
            Some(id) => id.human(),
            None => &self.ref_name,
        }
    }
}

/// Results of a merge run, in remote ref order.
///
/// Iterating blocks until the next result is ready and ends once the run is
/// over. Use [`MergeStream::recv`] from async code.
#[derive(Debug)]
pub struct MergeStream<E> {
    rx: mpsc::UnboundedReceiver<MergeResult<E>>,
}

impl<E> MergeStream<E> {
    pub async fn recv(&mut self) -> Option<MergeResult<E>> {
        self.rx.recv().await
    }
}

impl<E> Iterator for MergeStream<E> {
    type Item = MergeResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.blocking_recv()
    }
}

/// Merge every remote-tracking ref of `E` for `remote` into the local refs.
///
/// Failing to list the remote refs is returned directly and no stream is
/// created.
pub fn merge_all<E, R>(
    repo: R,
    remote: &str,
    options: MergeOptions,
) -> Result<MergeStream<E>, GitError>
where
    E: Entity,
    R: Repo + Send + 'static,
{
    let remote_refs = repo.list_refs(&remote_prefix(E::NAMESPACE, remote))?;
    debug!(remote, refs = remote_refs.len(), namespace = E::NAMESPACE, "starting merge");

    let (tx, rx) = mpsc::unbounded_channel();
    let run = MergeRun {
        repo,
        options,
        tx,
    };
    std::thread::Builder::new()
        .name(format!("quire-merge-{}", E::NAMESPACE))
        .spawn(move || run.run(remote_refs))?;

    Ok(MergeStream { rx })
}

enum Step<E> {
    Skip,
    Emit(MergeResult<E>),
    Abort(MergeResult<E>),
}

struct MergeRun<R, E> {
    repo: R,
    options: MergeOptions,
    tx: mpsc::UnboundedSender<MergeResult<E>>,
}

impl<R: Repo, E: Entity> MergeRun<R, E> {
    fn run(self, remote_refs: Vec<String>) {
        for remote_ref in &remote_refs {
            let (result, abort) = match self.merge_one(remote_ref) {
                Step::Skip => continue,
                Step::Emit(result) => (result, false),
                Step::Abort(result) => (result, true),
            };

            match result.status {
                MergeStatus::Error => error!(
                    ref_name = %result.ref_name,
                    reason = result.reason.as_deref().unwrap_or(""),
                    "merge aborted"
                ),
                MergeStatus::Invalid => warn!(
                    ref_name = %result.ref_name,
                    reason = result.reason.as_deref().unwrap_or(""),
                    "merge failed"
                ),
                status => info!(ref_name = %result.ref_name, status = %status, "merged"),
            }

            if self.tx.send(result).is_err() {
                debug!("merge stream dropped, stopping");
                return;
            }
            if abort {
                debug!(ref_name = %remote_ref, "aborting merge run");
                return;
            }
        }
        debug!(refs = remote_refs.len(), "merge run finished");
    }

    fn merge_one(&self, remote_ref: &str) -> Step<E> {
        let id = match id_from_ref(remote_ref) {
            Ok(id) => id,
            Err(e) => {
                return Step::Emit(MergeResult::invalid(
                    remote_ref,
                    None,
                    format!("invalid ref: {}", e),
                ))
            }
        };
        let local = local_ref(E::NAMESPACE, &id);

        // fast path: nothing on the remote side that the local ref lacks
        if let Ok(commits) = self.repo.commits_between(&local, remote_ref) {
            if commits.is_empty() {
                debug!(ref_name = %remote_ref, "up to date");
                if self.options.report_unchanged {
                    return Step::Emit(MergeResult::merged(
                        remote_ref,
                        id,
                        MergeStatus::Nothing,
                        None,
                    ));
                }
                return Step::Skip;
            }
        }

        let remote_entity: E = match read(&self.repo, remote_ref) {
            Ok(entity) => entity,
            Err(LoadError::Invalid(e)) => {
                return Step::Emit(MergeResult::invalid(
                    remote_ref,
                    Some(id),
                    format!("remote entity is invalid: {}", e),
                ))
            }
            Err(e) => {
                return Step::Emit(MergeResult::invalid(
                    remote_ref,
                    Some(id),
                    format!("remote entity is not readable: {}", e),
                ))
            }
        };
        if remote_entity.id() != &id {
            let err = ValidationError::IdMismatch {
                id: id.clone(),
                expected: remote_entity.id().clone(),
            };
            return Step::Emit(MergeResult::invalid(
                remote_ref,
                Some(id),
                format!("ref does not match its entity: {}", err),
            ));
        }

        let exists = match self.repo.ref_exists(&local) {
            Ok(exists) => exists,
            Err(e) => {
                return Step::Abort(MergeResult::error(
                    remote_ref,
                    Some(id),
                    "failed to check local ref",
                    e.into(),
                ))
            }
        };

        if !exists {
            if let Err(e) = self.repo.copy_ref(remote_ref, &local) {
                return Step::Abort(MergeResult::error(
                    remote_ref,
                    Some(id),
                    "failed to create local ref",
                    e.into(),
                ));
            }
            self.witness(&remote_entity);
            return Step::Emit(MergeResult::merged(
                remote_ref,
                id,
                MergeStatus::New,
                Some(remote_entity),
            ));
        }

        let mut local_entity: E = match read(&self.repo, &local) {
            Ok(entity) => entity,
            Err(e) => {
                return Step::Abort(MergeResult::error(
                    remote_ref,
                    Some(id),
                    "local entity is not readable",
                    e.into(),
                ))
            }
        };
        let old_head = local_entity.head().cloned();

        match local_entity.merge(&remote_entity) {
            Err(conflict) => Step::Emit(MergeResult::invalid(
                remote_ref,
                Some(id),
                format!("merge failed: {}", conflict),
            )),
            Ok(false) => Step::Emit(MergeResult::merged(
                remote_ref,
                id,
                MergeStatus::Nothing,
                Some(local_entity),
            )),
            Ok(true) => {
                let Some(new_head) = local_entity.head().cloned() else {
                    return Step::Emit(MergeResult::invalid(
                        remote_ref,
                        Some(id),
                        "merged history has an uncommitted head".to_string(),
                    ));
                };
                if let Err(e) = self.repo.update_ref(&local, &new_head, old_head.as_ref()) {
                    return Step::Abort(MergeResult::error(
                        remote_ref,
                        Some(id),
                        "failed to update local ref",
                        e.into(),
                    ));
                }
                self.witness(&local_entity);
                Step::Emit(MergeResult::merged(
                    remote_ref,
                    id,
                    MergeStatus::Updated,
                    Some(local_entity),
                ))
            }
        }
    }

    fn witness(&self, entity: &E) {
        if let Err(e) = self.repo.witness_clock(E::CLOCK, entity.last_time()) {
            warn!(error = %e, clock = E::CLOCK, "failed to witness merged lamport time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::commit;
    use crate::mem_repo::MemRepo;
    use libquire_core::refs::{fetch_refspec, remote_ref};
    use libquire_core::{Identity, LamportTime, Mutation};

    fn create(repo: &MemRepo, name: &str) -> Identity {
        let mut ident = Identity::new(
            Mutation::new(name, "mail@example.com"),
            LamportTime(1),
            1_700_000_000,
            None,
        );
        commit(repo, &mut ident).unwrap();
        ident
    }

    fn clone_of(origin: &MemRepo) -> MemRepo {
        let repo = MemRepo::new();
        repo.add_remote("origin", origin.clone());
        repo.fetch_refs("origin", &fetch_refspec(Identity::NAMESPACE, "origin"))
            .unwrap();
        repo
    }

    #[test]
    fn test_new_then_skipped() {
        let origin = MemRepo::new();
        let ident = create(&origin, "alice");
        let repo = clone_of(&origin);

        let results: Vec<_> =
            merge_all::<Identity, _>(repo.clone(), "origin", MergeOptions::default())
                .unwrap()
                .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, MergeStatus::New);
        assert_eq!(results[0].entity.as_ref().unwrap().id(), ident.id());

        let again: Vec<_> =
            merge_all::<Identity, _>(repo.clone(), "origin", MergeOptions::default())
                .unwrap()
                .collect();
        assert!(again.is_empty());

        let reported: Vec<_> = merge_all::<Identity, _>(
            repo,
            "origin",
            MergeOptions {
                report_unchanged: true,
            },
        )
        .unwrap()
        .collect();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].status, MergeStatus::Nothing);
        assert_eq!(reported[0].id.as_ref(), Some(ident.id()));
    }

    #[test]
    fn test_storage_failure_aborts_run() {
        let origin = MemRepo::new();
        create(&origin, "alice");
        create(&origin, "bob");
        let repo = clone_of(&origin);
        repo.fail_ref_writes(true);

        let results: Vec<_> = merge_all::<Identity, _>(repo, "origin", MergeOptions::default())
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, MergeStatus::Error);
        assert!(results[0].err.is_some());
    }

    #[test]
    fn test_ref_must_match_entity_id() {
        let origin = MemRepo::new();
        let alice = create(&origin, "alice");
        let bob = create(&origin, "bob");
        let repo = clone_of(&origin);

        // alice's remote-tracking ref now holds bob's history
        let bob_head = bob.head().unwrap().clone();
        repo.set_ref(&remote_ref(Identity::NAMESPACE, "origin", alice.id()), &bob_head);

        let results: Vec<_> = merge_all::<Identity, _>(repo, "origin", MergeOptions::default())
            .unwrap()
            .collect();
        let spoofed = results
            .iter()
            .find(|r| r.id.as_ref() == Some(alice.id()))
            .unwrap();
        assert_eq!(spoofed.status, MergeStatus::Invalid);
    }

    #[test]
    fn test_dropping_stream_ends_run() {
        let origin = MemRepo::new();
        for i in 0..20 {
            create(&origin, &format!("user{}", i));
        }
        let repo = clone_of(&origin);

        let mut stream =
            merge_all::<Identity, _>(repo.clone(), "origin", MergeOptions::default()).unwrap();
        assert_eq!(stream.next().unwrap().status, MergeStatus::New);
        drop(stream);

        // refs written before the producer noticed are complete histories
        for refname in repo.list_refs("refs/identities/").unwrap() {
            assert!(read::<Identity, _>(&repo, &refname).is_ok());
        }
    }
}
