//! Core library for quire
//!
//! Pure data model of the entity tracker: ids, lamport clocks, identities
//! and their versions, the ref namespace, and the causal merge used to
//! reconcile histories exchanged through a git remote. Nothing in this crate
//! touches a repository.

pub mod config;
pub mod entity;
pub mod error;
pub mod hash;
pub mod identity;
pub mod merge;
pub mod refs;
pub mod signing;
pub mod types;

pub use config::{load_repo_config, save_repo_config, RepoConfig};
pub use entity::{Entity, VersionRecord};
pub use error::{ConfigError, DecodeError, MergeConflict, ValidationError};
pub use identity::{Identity, IdentityRef, Key, Mutation, Version};
pub use merge::{reconcile, MergeStatus, Reconciliation};
pub use types::{Id, IdParseError, LamportTime, MemClock, ObjectId};
