//! [`Repo`] over a real git repository through libgit2

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use git2::{
    ErrorCode, FetchOptions, ObjectType, Oid, PushOptions, RemoteCallbacks, Repository, Signature,
};
use libquire_core::config::quire_dir;
use libquire_core::{LamportTime, ObjectId};
use tracing::debug;

use crate::clock::PersistedClock;
use crate::error::GitError;
use crate::repo::{ObjectKind, Repo, TreeEntry};

const BLOB_MODE: i32 = 0o100644;
const TREE_MODE: i32 = 0o040000;

pub struct GitRepo {
    repo: Repository,
    git_dir: PathBuf,
}

impl GitRepo {
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::open(path).map_err(|e| not_a_repo(e, path))?;
        Ok(Self::wrap(repo))
    }

    /// Open the repository containing `path`
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(path).map_err(|e| not_a_repo(e, path))?;
        Ok(Self::wrap(repo))
    }

    fn wrap(repo: Repository) -> Self {
        // worktrees share refs and quire state with the main repository
        let git_dir = repo.commondir().to_path_buf();
        Self { repo, git_dir }
    }

    /// A second handle on the same repository, e.g. for a merge thread
    pub fn reopen(&self) -> Result<Self, GitError> {
        Self::open(self.repo.path())
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn find_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => Ok(reference.resolve()?.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn require_ref(&self, refname: &str) -> Result<Oid, GitError> {
        self.find_ref(refname)?.ok_or_else(|| GitError::RefNotFound {
            refname: refname.to_string(),
        })
    }

    fn signature(&self) -> Result<Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("quire", "quire@localhost")?),
        }
    }

    fn clock(&self, name: &str) -> Result<PersistedClock, GitError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(GitError::Clock(format!("invalid clock name: {:?}", name)));
        }
        Ok(PersistedClock::new(&quire_dir(&self.git_dir).join("clocks"), name))
    }
}

fn not_a_repo(e: git2::Error, path: &Path) -> GitError {
    if e.code() == ErrorCode::NotFound {
        GitError::NotARepo {
            path: path.to_path_buf(),
        }
    } else {
        GitError::Git(e)
    }
}

fn to_oid(oid: &ObjectId) -> Result<Oid, GitError> {
    Ok(Oid::from_str(oid.as_str())?)
}

fn from_oid(oid: Oid) -> Result<ObjectId, GitError> {
    Ok(ObjectId::parse(&oid.to_string())?)
}

impl Repo for GitRepo {
    fn list_refs(&self, prefix: &str) -> Result<Vec<String>, GitError> {
        let mut names = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            if let Some(name) = reference.name() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn ref_exists(&self, refname: &str) -> Result<bool, GitError> {
        Ok(self.find_ref(refname)?.is_some())
    }

    fn resolve_ref(&self, refname: &str) -> Result<ObjectId, GitError> {
        from_oid(self.require_ref(refname)?)
    }

    fn commits_between(&self, exclude: &str, main: &str) -> Result<Vec<ObjectId>, GitError> {
        let exclude = self.require_ref(exclude)?;
        let main = self.require_ref(main)?;

        let mut walk = self.repo.revwalk()?;
        walk.push(main)?;
        walk.hide(exclude)?;
        walk.map(|oid| from_oid(oid?)).collect()
    }

    fn list_commits(&self, refname: &str) -> Result<Vec<ObjectId>, GitError> {
        let mut commit = self.repo.find_commit(self.require_ref(refname)?)?;
        let mut commits = vec![from_oid(commit.id())?];
        while let Ok(parent) = commit.parent_id(0) {
            commit = self.repo.find_commit(parent)?;
            commits.push(from_oid(commit.id())?);
        }
        commits.reverse();
        Ok(commits)
    }

    fn copy_ref(&self, source: &str, dest: &str) -> Result<(), GitError> {
        let target = self.require_ref(source)?;
        let message = format!("quire: copy from {}", source);
        match self.repo.reference(dest, target, false, &message) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::Exists => Err(GitError::RefExists {
                refname: dest.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_ref(
        &self,
        refname: &str,
        target: &ObjectId,
        expected: Option<&ObjectId>,
    ) -> Result<(), GitError> {
        let target = to_oid(target)?;
        let result = match expected {
            Some(old) => {
                self.repo
                    .reference_matching(refname, target, true, to_oid(old)?, "quire: update")
            }
            None => self.repo.reference(refname, target, false, "quire: create"),
        };

        match result {
            Ok(_) => Ok(()),
            // a vanished ref reports NotFound against an expected old value
            Err(e)
                if matches!(e.code(), ErrorCode::Modified | ErrorCode::Exists)
                    || (expected.is_some() && e.code() == ErrorCode::NotFound) =>
            {
                let actual = self
                    .find_ref(refname)?
                    .map(|oid| oid.to_string())
                    .unwrap_or_else(|| "nothing".to_string());
                Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "nothing".to_string()),
                    actual,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store_data(&self, data: &[u8]) -> Result<ObjectId, GitError> {
        from_oid(self.repo.blob(data)?)
    }

    fn read_data(&self, oid: &ObjectId) -> Result<Vec<u8>, GitError> {
        match self.repo.find_blob(to_oid(oid)?) {
            Ok(blob) => Ok(blob.content().to_vec()),
            Err(e) if e.code() == ErrorCode::NotFound => Err(GitError::ObjectNotFound {
                oid: oid.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn store_tree(&self, entries: &[TreeEntry]) -> Result<ObjectId, GitError> {
        let mut builder = self.repo.treebuilder(None)?;
        for entry in entries {
            let mode = match entry.kind {
                ObjectKind::Blob => BLOB_MODE,
                ObjectKind::Tree => TREE_MODE,
            };
            builder.insert(&entry.name, to_oid(&entry.oid)?, mode)?;
        }
        from_oid(builder.write()?)
    }

    fn read_tree(&self, oid: &ObjectId) -> Result<Vec<TreeEntry>, GitError> {
        let object = match self.repo.find_object(to_oid(oid)?, None) {
            Ok(object) => object,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(GitError::ObjectNotFound {
                    oid: oid.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let tree = object.peel_to_tree()?;

        let mut entries = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let kind = match entry.kind() {
                Some(ObjectType::Blob) => ObjectKind::Blob,
                Some(ObjectType::Tree) => ObjectKind::Tree,
                _ => continue,
            };
            let Some(name) = entry.name() else { continue };
            entries.push(TreeEntry {
                name: name.to_string(),
                oid: from_oid(entry.id())?,
                kind,
            });
        }
        Ok(entries)
    }

    fn store_commit(
        &self,
        tree: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<ObjectId, GitError> {
        let tree = self.repo.find_tree(to_oid(tree)?)?;
        let parent = match parent {
            Some(p) => Some(self.repo.find_commit(to_oid(p)?)?),
            None => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(None, &sig, &sig, "quire: version", &tree, &parents)?;
        from_oid(oid)
    }

    fn fetch_refs(&self, remote: &str, refspec: &str) -> Result<String, GitError> {
        let mut git_remote = self.find_remote(remote)?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|_stats| true);

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        git_remote.fetch(&[refspec], Some(&mut fetch_options), None)?;

        let stats = git_remote.stats();
        debug!(remote, refspec, objects = stats.received_objects(), "fetched");
        Ok(format!(
            "received {} objects from {}",
            stats.received_objects(),
            remote
        ))
    }

    fn push_ref(&self, remote: &str, refname: &str) -> Result<String, GitError> {
        let mut git_remote = self.find_remote(remote)?;
        let refspec = format!("{0}:{0}", refname);

        let push_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let push_error_clone = Rc::clone(&push_error);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.push_update_reference(move |_refname, status| {
            if let Some(msg) = status {
                *push_error_clone.borrow_mut() = Some(msg.to_string());
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        match git_remote.push(&[refspec.as_str()], Some(&mut push_options)) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                return Err(GitError::PushRejected {
                    refname: refname.to_string(),
                    reason: e.message().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let rejected = push_error.borrow().clone();
        if let Some(reason) = rejected {
            return Err(GitError::PushRejected {
                refname: refname.to_string(),
                reason,
            });
        }

        debug!(remote, refname, "pushed");
        Ok(format!("pushed {} to {}", refname, remote))
    }

    fn increment_clock(&self, name: &str) -> Result<LamportTime, GitError> {
        self.clock(name)?.increment()
    }

    fn witness_clock(&self, name: &str, time: LamportTime) -> Result<(), GitError> {
        self.clock(name)?.witness(time)
    }
}

impl GitRepo {
    fn find_remote(&self, remote: &str) -> Result<git2::Remote<'_>, GitError> {
        match self.repo.find_remote(remote) {
            Ok(r) => Ok(r),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                Err(GitError::RemoteNotFound {
                    remote: remote.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitRepo) {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        let repo = GitRepo::open(temp.path()).unwrap();
        (temp, repo)
    }

    fn commit_blob(repo: &GitRepo, data: &[u8], parent: Option<&ObjectId>) -> ObjectId {
        let blob = repo.store_data(data).unwrap();
        let tree = repo.store_tree(&[TreeEntry::blob("version", blob)]).unwrap();
        repo.store_commit(&tree, parent).unwrap()
    }

    #[test]
    fn test_open_outside_repo_fails() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            GitRepo::open(temp.path()),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn test_objects_roundtrip() {
        let (_temp, repo) = setup();
        let c1 = commit_blob(&repo, b"one", None);

        let entries = repo.read_tree(&c1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "version");
        assert_eq!(entries[0].kind, ObjectKind::Blob);
        assert_eq!(repo.read_data(&entries[0].oid).unwrap(), b"one");
    }

    #[test]
    fn test_refs_and_history() {
        let (_temp, repo) = setup();
        let c1 = commit_blob(&repo, b"one", None);
        let c2 = commit_blob(&repo, b"two", Some(&c1));

        repo.update_ref("refs/identities/a", &c1, None).unwrap();
        repo.update_ref("refs/remotes/origin/identities/a", &c2, None)
            .unwrap();

        assert!(repo.ref_exists("refs/identities/a").unwrap());
        assert!(!repo.ref_exists("refs/identities/b").unwrap());
        assert_eq!(
            repo.list_refs("refs/identities/").unwrap(),
            vec!["refs/identities/a".to_string()]
        );
        assert_eq!(
            repo.list_commits("refs/remotes/origin/identities/a").unwrap(),
            vec![c1.clone(), c2.clone()]
        );
        assert_eq!(
            repo.commits_between("refs/identities/a", "refs/remotes/origin/identities/a")
                .unwrap(),
            vec![c2.clone()]
        );
        assert!(repo
            .commits_between("refs/remotes/origin/identities/a", "refs/identities/a")
            .unwrap()
            .is_empty());
        assert!(matches!(
            repo.commits_between("refs/identities/missing", "refs/identities/a"),
            Err(GitError::RefNotFound { .. })
        ));
    }

    #[test]
    fn test_update_ref_is_compare_and_swap() {
        let (_temp, repo) = setup();
        let c1 = commit_blob(&repo, b"one", None);
        let c2 = commit_blob(&repo, b"two", Some(&c1));

        repo.update_ref("refs/identities/a", &c1, None).unwrap();
        assert!(matches!(
            repo.update_ref("refs/identities/a", &c2, None),
            Err(GitError::CasFailed { .. })
        ));
        assert!(matches!(
            repo.update_ref("refs/identities/a", &c2, Some(&c2)),
            Err(GitError::CasFailed { .. })
        ));

        repo.update_ref("refs/identities/a", &c2, Some(&c1)).unwrap();
        assert_eq!(repo.resolve_ref("refs/identities/a").unwrap(), c2);
    }

    #[test]
    fn test_copy_ref_never_overwrites() {
        let (_temp, repo) = setup();
        let c1 = commit_blob(&repo, b"one", None);
        repo.update_ref("refs/remotes/origin/identities/a", &c1, None)
            .unwrap();

        repo.copy_ref("refs/remotes/origin/identities/a", "refs/identities/a")
            .unwrap();
        assert_eq!(repo.resolve_ref("refs/identities/a").unwrap(), c1);

        assert!(matches!(
            repo.copy_ref("refs/remotes/origin/identities/a", "refs/identities/a"),
            Err(GitError::RefExists { .. })
        ));
    }

    #[test]
    fn test_clock_lives_in_git_dir() {
        let (_temp, repo) = setup();
        assert_eq!(repo.increment_clock("identity").unwrap(), LamportTime(1));
        repo.witness_clock("identity", LamportTime(7)).unwrap();
        assert_eq!(repo.increment_clock("identity").unwrap(), LamportTime(8));
        assert!(repo.git_dir().join("quire/clocks/identity").exists());

        assert!(repo.increment_clock("../escape").is_err());
    }

    #[test]
    fn test_unknown_remote() {
        let (_temp, repo) = setup();
        assert!(matches!(
            repo.fetch_refs("nowhere", "+refs/identities/*:refs/remotes/nowhere/identities/*"),
            Err(GitError::RemoteNotFound { .. })
        ));
    }
}
