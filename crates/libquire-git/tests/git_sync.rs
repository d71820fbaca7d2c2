//! Two clones exchanging identities through a bare remote

use git2::Repository;
use libquire_core::{Entity, Identity, Mutation};
use libquire_git::{
    commit, fetch, next_time, pull, push, read_local, read_remote, GitRepo, MergeOptions,
    SyncError,
};
use tempfile::TempDir;

const NOW: i64 = 1_700_000_000;

struct Setup {
    _dirs: Vec<TempDir>,
    a: GitRepo,
    b: GitRepo,
}

fn setup() -> Setup {
    let remote = TempDir::new().unwrap();
    Repository::init_bare(remote.path()).unwrap();
    let url = remote.path().to_str().unwrap().to_string();

    let clone = |dir: &TempDir| {
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", &url).unwrap();
        GitRepo::open(dir.path()).unwrap()
    };
    let a_dir = TempDir::new().unwrap();
    let b_dir = TempDir::new().unwrap();
    let a = clone(&a_dir);
    let b = clone(&b_dir);

    Setup {
        _dirs: vec![remote, a_dir, b_dir],
        a,
        b,
    }
}

fn create(repo: &GitRepo, name: &str) -> Identity {
    let time = next_time::<Identity, _>(repo, None).unwrap();
    let mut ident = Identity::new(Mutation::new(name, "mail@example.com"), time, NOW, None);
    commit(repo, &mut ident).unwrap();
    ident
}

fn edit(repo: &GitRepo, ident: &mut Identity, name: &str) {
    let time = next_time(repo, Some(&*ident)).unwrap();
    ident.mutate(time, NOW, None, |m| m.name = name.to_string());
    commit(repo, ident).unwrap();
}

fn pull_into(repo: &GitRepo) -> Result<libquire_git::PullReport, SyncError> {
    pull::<Identity, _>(repo.reopen().unwrap(), "origin", MergeOptions::default())
}

#[test]
fn push_then_pull_new_identity() {
    let s = setup();
    let ident = create(&s.a, "alice");

    let report = push::<Identity, _>(&s.a, "origin").unwrap();
    assert_eq!(report.pushed, vec![ident.id().clone()]);

    let report = pull_into(&s.b).unwrap();
    assert_eq!(report.new, vec![ident.id().clone()]);

    let loaded: Identity = read_local(&s.b, ident.id()).unwrap();
    assert_eq!(loaded.name(), "alice");
    let mirrored: Identity = read_remote(&s.b, "origin", ident.id()).unwrap();
    assert_eq!(mirrored, loaded);
}

#[test]
fn edits_flow_both_ways() {
    let s = setup();
    let mut on_a = create(&s.a, "alice");
    push::<Identity, _>(&s.a, "origin").unwrap();
    pull_into(&s.b).unwrap();

    // A edits, B fast-forwards
    edit(&s.a, &mut on_a, "alice (a)");
    push::<Identity, _>(&s.a, "origin").unwrap();
    let report = pull_into(&s.b).unwrap();
    assert_eq!(report.updated, vec![on_a.id().clone()]);

    // B edits, A fast-forwards
    let mut on_b: Identity = read_local(&s.b, on_a.id()).unwrap();
    edit(&s.b, &mut on_b, "alice (b)");
    push::<Identity, _>(&s.b, "origin").unwrap();
    pull_into(&s.a).unwrap();

    let on_a: Identity = read_local(&s.a, on_a.id()).unwrap();
    assert_eq!(on_a.name(), "alice (b)");
    assert_eq!(on_a.versions().len(), 3);

    // nothing left to exchange
    assert!(push::<Identity, _>(&s.a, "origin").unwrap().pushed.is_empty());
    let report = pull_into(&s.b).unwrap();
    assert!(report.new.is_empty() && report.updated.is_empty());
}

#[test]
fn concurrent_edits_are_refused() {
    let s = setup();
    let mut on_a = create(&s.a, "alice");
    push::<Identity, _>(&s.a, "origin").unwrap();
    pull_into(&s.b).unwrap();
    let mut on_b: Identity = read_local(&s.b, on_a.id()).unwrap();

    edit(&s.a, &mut on_a, "from a");
    edit(&s.b, &mut on_b, "from b");
    push::<Identity, _>(&s.a, "origin").unwrap();

    assert!(push::<Identity, _>(&s.b, "origin").is_err());
    assert!(matches!(
        pull_into(&s.b),
        Err(SyncError::MergeFailure { .. })
    ));

    // both sides keep their own history
    let kept: Identity = read_local(&s.b, on_b.id()).unwrap();
    assert_eq!(kept.name(), "from b");
    let theirs: Identity = read_remote(&s.b, "origin", on_b.id()).unwrap();
    assert_eq!(theirs.name(), "from a");
}

#[test]
fn fetch_from_unknown_remote_fails() {
    let s = setup();
    assert!(fetch::<Identity, _>(&s.a, "nowhere").is_err());
}
