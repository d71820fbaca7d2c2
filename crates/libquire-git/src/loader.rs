//! Reading entities back from their refs

use libquire_core::refs::{id_from_ref, local_prefix, local_ref, remote_ref};
use libquire_core::{Entity, Id, VersionRecord};
use tracing::debug;

use crate::error::LoadError;
use crate::repo::{ObjectKind, Repo};

/// Load and validate the entity whose history ends at `refname`
pub fn read<E, R>(repo: &R, refname: &str) -> Result<E, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    if !repo.ref_exists(refname)? {
        return Err(LoadError::RefNotFound {
            refname: refname.to_string(),
        });
    }

    let commits = repo.list_commits(refname)?;
    let mut versions = Vec::with_capacity(commits.len());
    for commit in commits {
        let entry = repo
            .read_tree(&commit)?
            .into_iter()
            .find(|e| e.name == E::VERSION_ENTRY && e.kind == ObjectKind::Blob)
            .ok_or_else(|| LoadError::MissingVersion {
                commit: commit.clone(),
            })?;
        let data = repo.read_data(&entry.oid)?;
        let mut version = E::Version::decode(&data).map_err(|source| LoadError::Decode {
            commit: commit.clone(),
            source,
        })?;
        version.set_commit(commit);
        versions.push(version);
    }

    let entity = E::from_versions(versions)?;
    entity.validate()?;
    debug!(refname, versions = entity.versions().len(), "loaded entity");
    Ok(entity)
}

pub fn read_local<E, R>(repo: &R, id: &Id) -> Result<E, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    read(repo, &local_ref(E::NAMESPACE, id))
}

pub fn read_remote<E, R>(repo: &R, remote: &str, id: &Id) -> Result<E, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    read(repo, &remote_ref(E::NAMESPACE, remote, id))
}

/// Ids of every local entity of a kind. Refs that do not carry an id are
/// skipped.
pub fn list_local_ids<E, R>(repo: &R) -> Result<Vec<Id>, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    Ok(repo
        .list_refs(&local_prefix(E::NAMESPACE))?
        .iter()
        .filter_map(|r| id_from_ref(r).ok())
        .collect())
}

/// Lazily load every local entity of a kind.
///
/// Listing failures are returned up front; each entity then loads (or fails)
/// on its own.
pub fn read_all_local<'a, E, R>(
    repo: &'a R,
) -> Result<impl Iterator<Item = Result<E, LoadError>> + 'a, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    let refs = repo.list_refs(&local_prefix(E::NAMESPACE))?;
    Ok(refs.into_iter().map(move |r| read::<E, R>(repo, &r)))
}

/// Find the one local entity whose id starts with `prefix`
pub fn find_local_by_prefix<E, R>(repo: &R, prefix: &str) -> Result<Option<Id>, LoadError>
where
    E: Entity,
    R: Repo + ?Sized,
{
    let mut matching = list_local_ids::<E, R>(repo)?
        .into_iter()
        .filter(|id| id.has_prefix(prefix));
    match (matching.next(), matching.next()) {
        (Some(id), None) => Ok(Some(id)),
        _ => Ok(None),
    }
}
