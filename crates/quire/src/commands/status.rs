use std::collections::BTreeSet;

use libquire_core::refs::{id_from_ref, local_ref, remote_prefix, remote_ref};
use libquire_core::{Entity, Id, Identity};
use libquire_git::{list_local_ids, read, GitError, Repo};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::QuireContext;
use crate::error::CliError;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct StatusOutput {
    remote: String,
    user: Option<String>,
    identities: Vec<IdentityStatus>,
}

#[derive(Serialize)]
struct IdentityStatus {
    id: String,
    #[serde(flatten)]
    state: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state")]
enum SyncState {
    UpToDate,
    Ahead { commits: usize },
    Behind { commits: usize },
    Diverged { ahead: usize, behind: usize },
    LocalOnly,
    RemoteOnly,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::UpToDate => write!(f, "up-to-date"),
            SyncState::Ahead { commits } => write!(f, "ahead {}", commits),
            SyncState::Behind { commits } => write!(f, "behind {}", commits),
            SyncState::Diverged { ahead, behind } => {
                write!(f, "diverged (+{} -{})", ahead, behind)
            }
            SyncState::LocalOnly => write!(f, "local-only"),
            SyncState::RemoteOnly => write!(f, "remote-only"),
        }
    }
}

fn state_of<R: Repo>(repo: &R, remote: &str, id: &Id) -> Result<SyncState, GitError> {
    let local = local_ref(Identity::NAMESPACE, id);
    let tracking = remote_ref(Identity::NAMESPACE, remote, id);

    match (repo.ref_exists(&local)?, repo.ref_exists(&tracking)?) {
        (true, false) => Ok(SyncState::LocalOnly),
        (false, _) => Ok(SyncState::RemoteOnly),
        (true, true) => {
            let ahead = repo.commits_between(&tracking, &local)?.len();
            let behind = repo.commits_between(&local, &tracking)?.len();
            Ok(match (ahead, behind) {
                (0, 0) => SyncState::UpToDate,
                (commits, 0) => SyncState::Ahead { commits },
                (0, commits) => SyncState::Behind { commits },
                (ahead, behind) => SyncState::Diverged { ahead, behind },
            })
        }
    }
}

pub fn run(cli: &Cli, remote: Option<String>) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let remote = ctx.remote(remote);

    let mut ids: BTreeSet<Id> = list_local_ids::<Identity, _>(&ctx.repo)?
        .into_iter()
        .collect();
    for tracking in ctx
        .repo
        .list_refs(&remote_prefix(Identity::NAMESPACE, &remote))?
    {
        if let Ok(id) = id_from_ref(&tracking) {
            ids.insert(id);
        }
    }

    let user = ctx.adopted_id().map(|id| id.to_string());
    match ctx.adopted_id() {
        Some(id) => print_human(cli, &format!("User: {}", id.human())),
        None => print_human(cli, "User: none adopted"),
    }

    let mut identities = Vec::with_capacity(ids.len());
    for id in ids {
        let state = state_of(&ctx.repo, &remote, &id)?;
        let refname = match state {
            SyncState::RemoteOnly => remote_ref(Identity::NAMESPACE, &remote, &id),
            _ => local_ref(Identity::NAMESPACE, &id),
        };
        let name = read::<Identity, _>(&ctx.repo, &refname)
            .ok()
            .map(|i| i.display_name());

        print_human(
            cli,
            &format!(
                "{} {} {}",
                id.human(),
                state,
                name.as_deref().unwrap_or("(unreadable)")
            ),
        );
        identities.push(IdentityStatus {
            id: id.to_string(),
            state,
            name,
        });
    }

    output_success(
        cli,
        StatusOutput {
            remote,
            user,
            identities,
        },
    );
    Ok(())
}
