//! Git storage for quire
//!
//! This crate provides:
//! - The [`Repo`] capability trait, over libgit2 ([`GitRepo`]) or memory ([`MemRepo`])
//! - Loading and committing ref-backed entities
//! - The merge engine reconciling remote-tracking refs into local ones
//! - Fetch, push and pull of an entity namespace

pub mod clock;
pub mod commit;
pub mod engine;
pub mod error;
pub mod git_repo;
pub mod loader;
pub mod mem_repo;
pub mod repo;
pub mod resolver;
pub mod sync;

pub use commit::{commit, commit_as_needed, next_time};
pub use engine::{merge_all, MergeOptions, MergeResult, MergeStream};
pub use error::{GitError, LoadError, SyncError};
pub use git_repo::GitRepo;
pub use loader::{find_local_by_prefix, list_local_ids, read, read_all_local, read_local, read_remote};
pub use mem_repo::MemRepo;
pub use repo::{ObjectKind, Repo, TreeEntry};
pub use resolver::{Resolver, SimpleResolver};
pub use sync::{fetch, pull, push, PullReport, PushReport};
