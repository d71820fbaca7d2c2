//! Writing pending versions of an entity to its ref

use libquire_core::refs::local_ref;
use libquire_core::{Entity, LamportTime, VersionRecord};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::repo::{Repo, TreeEntry};

/// Write every uncommitted version and advance the entity's ref.
///
/// The ref moves by compare-and-swap from the last committed version, so a
/// concurrent writer makes this fail instead of losing history. Commit ids
/// are only recorded on the entity once the ref has moved.
pub fn commit<E, R>(repo: &R, entity: &mut E) -> Result<(), SyncError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    entity.validate()?;

    let versions = entity.versions();
    let first_pending = versions
        .iter()
        .position(|v| v.commit().is_none())
        .ok_or_else(|| SyncError::NothingToCommit {
            id: entity.id().to_string(),
        })?;
    let expected = match first_pending {
        0 => None,
        n => versions[n - 1].commit().cloned(),
    };

    let mut parent = expected.clone();
    let mut written = Vec::with_capacity(versions.len() - first_pending);
    for version in &versions[first_pending..] {
        let data = version.encode()?;
        let blob = repo.store_data(&data)?;
        let tree = repo.store_tree(&[TreeEntry::blob(E::VERSION_ENTRY, blob)])?;
        let commit = repo.store_commit(&tree, parent.as_ref())?;
        parent = Some(commit.clone());
        written.push(commit);
    }

    let refname = local_ref(E::NAMESPACE, entity.id());
    if let Some(head) = written.last() {
        repo.update_ref(&refname, head, expected.as_ref())?;
    }
    debug!(refname = %refname, commits = written.len(), "committed entity");

    for (version, commit) in entity.versions_mut()[first_pending..]
        .iter_mut()
        .zip(written)
    {
        version.set_commit(commit);
    }

    if let Err(e) = repo.witness_clock(E::CLOCK, entity.last_time()) {
        warn!(error = %e, "failed to witness committed lamport time");
    }
    Ok(())
}

/// [`commit`], doing nothing when every version is already stored
pub fn commit_as_needed<E, R>(repo: &R, entity: &mut E) -> Result<(), SyncError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    if !entity.needs_commit() {
        return Ok(());
    }
    commit(repo, entity)
}

/// Lamport time for a new local version of `entity` (or of a new entity)
pub fn next_time<E, R>(repo: &R, entity: Option<&E>) -> Result<LamportTime, SyncError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    if let Some(entity) = entity {
        repo.witness_clock(E::CLOCK, entity.last_time())?;
    }
    Ok(repo.increment_clock(E::CLOCK)?)
}
