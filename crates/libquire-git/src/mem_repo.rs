//! In-memory [`Repo`] for tests and embedding
//!
//! Objects are content addressed with BLAKE2b-160 so ids look like git's.
//! Remotes are other `MemRepo` handles registered with [`MemRepo::add_remote`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use blake2::digest::consts::U20;
use blake2::{Blake2b, Digest};
use libquire_core::{LamportTime, MemClock, ObjectId};

use crate::error::GitError;
use crate::repo::{ObjectKind, Repo, TreeEntry};

#[derive(Debug, Clone)]
enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit {
        tree: ObjectId,
        parent: Option<ObjectId>,
    },
}

#[derive(Debug, Default)]
struct MemState {
    refs: BTreeMap<String, ObjectId>,
    objects: HashMap<ObjectId, Object>,
    clocks: HashMap<String, MemClock>,
    remotes: HashMap<String, MemRepo>,
    fail_ref_writes: bool,
    fail_lookups: Option<String>,
}

/// Shared handle; clones see the same repository
#[derive(Debug, Clone, Default)]
pub struct MemRepo {
    inner: Arc<Mutex<MemState>>,
}

impl MemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemState> {
        // state is only mutated in whole steps, a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_remote(&self, name: &str, remote: MemRepo) {
        self.state().remotes.insert(name.to_string(), remote);
    }

    /// Point a ref anywhere, bypassing compare-and-swap
    pub fn set_ref(&self, refname: &str, target: &ObjectId) {
        self.state()
            .refs
            .insert(refname.to_string(), target.clone());
    }

    /// Make every ref write fail, to exercise storage error paths
    pub fn fail_ref_writes(&self, fail: bool) {
        self.state().fail_ref_writes = fail;
    }

    /// Make existence checks fail for refs under `prefix`
    pub fn fail_lookups_under(&self, prefix: Option<&str>) {
        self.state().fail_lookups = prefix.map(str::to_string);
    }

    fn snapshot(&self) -> (BTreeMap<String, ObjectId>, HashMap<ObjectId, Object>) {
        let state = self.state();
        (state.refs.clone(), state.objects.clone())
    }

    fn remote(&self, name: &str) -> Result<MemRepo, GitError> {
        self.state()
            .remotes
            .get(name)
            .cloned()
            .ok_or_else(|| GitError::RemoteNotFound {
                remote: name.to_string(),
            })
    }
}

impl MemState {
    fn require_ref(&self, refname: &str) -> Result<&ObjectId, GitError> {
        self.refs.get(refname).ok_or_else(|| GitError::RefNotFound {
            refname: refname.to_string(),
        })
    }

    fn check_writable(&self) -> Result<(), GitError> {
        if self.fail_ref_writes {
            return Err(GitError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "ref writes are disabled",
            )));
        }
        Ok(())
    }

    fn insert(&mut self, object: Object) -> ObjectId {
        let oid = hash_object(&object);
        self.objects.insert(oid.clone(), object);
        oid
    }
}

fn hash_object(object: &Object) -> ObjectId {
    let mut hasher = Blake2b::<U20>::new();
    match object {
        Object::Blob(data) => {
            hasher.update(b"blob\0");
            hasher.update(data);
        }
        Object::Tree(entries) => {
            hasher.update(b"tree\0");
            for entry in entries {
                let kind: &[u8] = match entry.kind {
                    ObjectKind::Blob => b"blob",
                    ObjectKind::Tree => b"tree",
                };
                hasher.update(kind);
                hasher.update(b" ");
                hasher.update(entry.name.as_bytes());
                hasher.update(b"\0");
                hasher.update(entry.oid.as_str().as_bytes());
                hasher.update(b"\n");
            }
        }
        Object::Commit { tree, parent } => {
            hasher.update(b"commit\0");
            hasher.update(tree.as_str().as_bytes());
            if let Some(parent) = parent {
                hasher.update(b"\0");
                hasher.update(parent.as_str().as_bytes());
            }
        }
    }
    let hex = hex::encode(hasher.finalize());
    // 40 lowercase hex chars by construction
    ObjectId::parse(&hex).unwrap_or_else(|_| unreachable!("blake2b-160 digest is 40 hex chars"))
}

/// First-parent chain starting at `head`, newest first
fn ancestry(objects: &HashMap<ObjectId, Object>, head: &ObjectId) -> Result<Vec<ObjectId>, GitError> {
    let mut chain = Vec::new();
    let mut current = Some(head.clone());
    while let Some(oid) = current {
        match objects.get(&oid) {
            Some(Object::Commit { parent, .. }) => {
                current = parent.clone();
                chain.push(oid);
            }
            _ => {
                return Err(GitError::ObjectNotFound {
                    oid: oid.to_string(),
                })
            }
        }
    }
    Ok(chain)
}

/// Split `+refs/a/*:refs/b/*` into its source and destination prefixes
fn parse_glob_refspec(refspec: &str) -> Result<(&str, &str), GitError> {
    let spec = refspec.strip_prefix('+').unwrap_or(refspec);
    let (src, dst) = spec
        .split_once(':')
        .ok_or_else(|| git2::Error::from_str("refspec without destination"))?;
    match (src.strip_suffix('*'), dst.strip_suffix('*')) {
        (Some(src), Some(dst)) => Ok((src, dst)),
        _ => Err(git2::Error::from_str("only glob refspecs are supported").into()),
    }
}

impl Repo for MemRepo {
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>, GitError> {
        Ok(self
            .state()
            .refs
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn ref_exists(&self, refname: &str) -> Result<bool, GitError> {
        let state = self.state();
        if let Some(prefix) = &state.fail_lookups {
            if refname.starts_with(prefix.as_str()) {
                return Err(GitError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "ref lookups are disabled",
                )));
            }
        }
        Ok(state.refs.contains_key(refname))
    }

    fn resolve_ref(&self, refname: &str) -> Result<ObjectId, GitError> {
        self.state().require_ref(refname).cloned()
    }

    fn commits_between(&self, exclude: &str, main: &str) -> Result<Vec<ObjectId>, GitError> {
        let state = self.state();
        let exclude = state.require_ref(exclude)?;
        let main = state.require_ref(main)?;

        let hidden: HashSet<ObjectId> = ancestry(&state.objects, exclude)?.into_iter().collect();
        Ok(ancestry(&state.objects, main)?
            .into_iter()
            .filter(|oid| !hidden.contains(oid))
            .collect())
    }

    fn list_commits(&self, refname: &str) -> Result<Vec<ObjectId>, GitError> {
        let state = self.state();
        let head = state.require_ref(refname)?;
        let mut chain = ancestry(&state.objects, head)?;
        chain.reverse();
        Ok(chain)
    }

    fn copy_ref(&self, source: &str, dest: &str) -> Result<(), GitError> {
        let mut state = self.state();
        state.check_writable()?;
        let target = state.require_ref(source)?.clone();
        if state.refs.contains_key(dest) {
            return Err(GitError::RefExists {
                refname: dest.to_string(),
            });
        }
        state.refs.insert(dest.to_string(), target);
        Ok(())
    }

    fn update_ref(
        &self,
        refname: &str,
        target: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<(), GitError> {
        let mut state = self.state();
        state.check_writable()?;
        if !matches!(state.objects.get(target), Some(Object::Commit { .. })) {
            return Err(GitError::ObjectNotFound {
                oid: target.to_string(),
            });
        }

        let current = state.refs.get(refname);
        if current != expected {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: expected
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "nothing".to_string()),
                actual: current
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "nothing".to_string()),
            });
        }
        state.refs.insert(refname.to_string(), target.clone());
        Ok(())
    }

    fn store_data(&self, data: &[u8]) -> Result<ObjectId, GitError> {
        Ok(self.state().insert(Object::Blob(data.to_vec())))
    }

    fn read_data(&self, oid: &ObjectId) -> Result<Vec<u8>, GitError> {
        match self.state().objects.get(oid) {
            Some(Object::Blob(data)) => Ok(data.clone()),
            _ => Err(GitError::ObjectNotFound {
                oid: oid.to_string(),
            }),
        }
    }

    fn store_tree(&self, entries: &[TreeEntry]) -> Result<ObjectId, GitError> {
        let mut entries = entries.to_vec();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(self.state().insert(Object::Tree(entries)))
    }

    fn read_tree(&self, oid: &ObjectId) -> Result<Vec<TreeEntry>, GitError> {
        let state = self.state();
        let tree = match state.objects.get(oid) {
            Some(Object::Commit { tree, .. }) => tree,
            Some(Object::Tree(_)) => oid,
            _ => {
                return Err(GitError::ObjectNotFound {
                    oid: oid.to_string(),
                })
            }
        };
        match state.objects.get(tree) {
            Some(Object::Tree(entries)) => Ok(entries.clone()),
            _ => Err(GitError::ObjectNotFound {
                oid: tree.to_string(),
            }),
        }
    }

    fn store_commit(
        &self,
        tree: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<ObjectId, GitError> {
        let mut state = self.state();
        if !matches!(state.objects.get(tree), Some(Object::Tree(_))) {
            return Err(GitError::ObjectNotFound {
                oid: tree.to_string(),
            });
        }
        if let Some(parent) = parent {
            if !matches!(state.objects.get(parent), Some(Object::Commit { .. })) {
                return Err(GitError::ObjectNotFound {
                    oid: parent.to_string(),
                });
            }
        }
        Ok(state.insert(Object::Commit {
            tree: tree.clone(),
            parent: parent.cloned(),
        }))
    }

    fn fetch_refs(&self, remote: &str, refspec: &str) -> Result<String, GitError> {
        let (src, dst) = parse_glob_refspec(refspec)?;
        let (refs, objects) = self.remote(remote)?.snapshot();

        let mut state = self.state();
        let received = objects.len();
        state.objects.extend(objects);

        let mut updated = 0;
        for (name, target) in refs {
            if let Some(suffix) = name.strip_prefix(src) {
                state.refs.insert(format!("{}{}", dst, suffix), target);
                updated += 1;
            }
        }
        Ok(format!(
            "received {} objects, {} refs from {}",
            received, updated, remote
        ))
    }

    fn push_ref(&self, remote: &str, refname: &str) -> Result<String, GitError> {
        let target = self.resolve_ref(refname)?;
        let (_, objects) = self.snapshot();
        let history: HashSet<ObjectId> = ancestry(&objects, &target)?.into_iter().collect();

        let remote_repo = self.remote(remote)?;
        let mut remote_state = remote_repo.state();
        if let Some(current) = remote_state.refs.get(refname) {
            if !history.contains(current) {
                return Err(GitError::PushRejected {
                    refname: refname.to_string(),
                    reason: "non-fast-forward".to_string(),
                });
            }
        }
        remote_state.objects.extend(objects);
        remote_state.refs.insert(refname.to_string(), target);
        Ok(format!("pushed {} to {}", refname, remote))
    }

    fn increment_clock(&self, name: &str) -> Result<LamportTime, GitError> {
        self.state()
            .clocks
            .entry(name.to_string())
            .or_default()
            .increment()
            .ok_or_else(|| GitError::Clock(format!("lamport clock {} exhausted", name)))
    }

    fn witness_clock(&self, name: &str, time: LamportTime) -> Result<(), GitError> {
        self.state()
            .clocks
            .entry(name.to_string())
            .or_default()
            .witness(time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(repo: &MemRepo, data: &[u8], parent: Option<&ObjectId>) -> ObjectId {
        let blob = repo.store_data(data).unwrap();
        let tree = repo.store_tree(&[TreeEntry::blob("version", blob)]).unwrap();
        repo.store_commit(&tree, parent).unwrap()
    }

    #[test]
    fn test_history_walks() {
        let repo = MemRepo::new();
        let c1 = commit(&repo, b"1", None);
        let c2 = commit(&repo, b"2", Some(&c1));
        let c3 = commit(&repo, b"3", Some(&c2));
        repo.set_ref("refs/identities/a", &c1);
        repo.set_ref("refs/remotes/origin/identities/a", &c3);

        assert_eq!(
            repo.list_commits("refs/remotes/origin/identities/a").unwrap(),
            vec![c1.clone(), c2.clone(), c3.clone()]
        );
        assert_eq!(
            repo.commits_between("refs/identities/a", "refs/remotes/origin/identities/a")
                .unwrap(),
            vec![c3, c2]
        );
        assert!(matches!(
            repo.commits_between("refs/identities/none", "refs/identities/a"),
            Err(GitError::RefNotFound { .. })
        ));
    }

    #[test]
    fn test_list_refs_is_sorted_and_prefixed() {
        let repo = MemRepo::new();
        let c1 = commit(&repo, b"1", None);
        repo.set_ref("refs/identities/b", &c1);
        repo.set_ref("refs/identities/a", &c1);
        repo.set_ref("refs/other/c", &c1);

        assert_eq!(
            repo.list_refs("refs/identities/").unwrap(),
            vec!["refs/identities/a", "refs/identities/b"]
        );
    }

    #[test]
    fn test_update_ref_cas() {
        let repo = MemRepo::new();
        let c1 = commit(&repo, b"1", None);
        let c2 = commit(&repo, b"2", Some(&c1));

        repo.update_ref("refs/identities/a", &c1, None).unwrap();
        assert!(matches!(
            repo.update_ref("refs/identities/a", &c2, None),
            Err(GitError::CasFailed { .. })
        ));
        repo.update_ref("refs/identities/a", &c2, Some(&c1)).unwrap();
        assert_eq!(repo.resolve_ref("refs/identities/a").unwrap(), c2);

        repo.fail_ref_writes(true);
        assert!(matches!(
            repo.copy_ref("refs/identities/a", "refs/identities/b"),
            Err(GitError::Io(_))
        ));
    }

    #[test]
    fn test_fetch_and_push_between_repos() {
        let origin = MemRepo::new();
        let local = MemRepo::new();
        local.add_remote("origin", origin.clone());

        let c1 = commit(&origin, b"1", None);
        origin.set_ref("refs/identities/a", &c1);
        local
            .fetch_refs("origin", "+refs/identities/*:refs/remotes/origin/identities/*")
            .unwrap();
        assert_eq!(
            local.resolve_ref("refs/remotes/origin/identities/a").unwrap(),
            c1
        );

        local.copy_ref("refs/remotes/origin/identities/a", "refs/identities/a")
            .unwrap();
        let c2 = commit(&local, b"2", Some(&c1));
        local.update_ref("refs/identities/a", &c2, Some(&c1)).unwrap();
        local.push_ref("origin", "refs/identities/a").unwrap();
        assert_eq!(origin.resolve_ref("refs/identities/a").unwrap(), c2);
        assert_eq!(origin.list_commits("refs/identities/a").unwrap().len(), 2);

        // origin moves on independently: a second push must be refused
        let other = commit(&origin, b"other", Some(&c1));
        origin.set_ref("refs/identities/a", &other);
        let c3 = commit(&local, b"3", Some(&c2));
        local.update_ref("refs/identities/a", &c3, Some(&c2)).unwrap();
        assert!(matches!(
            local.push_ref("origin", "refs/identities/a"),
            Err(GitError::PushRejected { .. })
        ));
    }

    #[test]
    fn test_clocks() {
        let repo = MemRepo::new();
        assert_eq!(repo.increment_clock("identity").unwrap(), LamportTime(1));
        repo.witness_clock("identity", LamportTime(5)).unwrap();
        assert_eq!(repo.increment_clock("identity").unwrap(), LamportTime(6));
        assert_eq!(repo.increment_clock("other").unwrap(), LamportTime(1));
    }
}
