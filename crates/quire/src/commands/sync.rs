//! fetch, pull and push

use libquire_core::{Identity, MergeStatus};
use libquire_git::{fetch, merge_all, push, MergeOptions};
use serde::Serialize;
use tracing::debug;

use crate::cli::Cli;
use crate::context::QuireContext;
use crate::error::CliError;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct FetchOutput {
    remote: String,
    message: String,
}

#[derive(Serialize)]
struct PullOutput {
    remote: String,
    results: Vec<PullResultOutput>,
}

#[derive(Serialize)]
struct PullResultOutput {
    ref_name: String,
    id: Option<String>,
    status: MergeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct PushOutput {
    remote: String,
    pushed: Vec<String>,
    up_to_date: usize,
}

pub fn run_fetch(cli: &Cli, remote: Option<String>) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let remote = ctx.remote(remote);

    let message = fetch::<Identity, _>(&ctx.repo, &remote)?;
    print_human(cli, &format!("Fetched identities from {}: {}", remote, message));
    output_success(cli, FetchOutput { remote, message });
    Ok(())
}

pub fn run_pull(cli: &Cli, remote: Option<String>) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let remote = ctx.remote(remote);

    let message = fetch::<Identity, _>(&ctx.repo, &remote)?;
    debug!(remote = %remote, message = %message, "fetched identities");

    let options = MergeOptions {
        report_unchanged: ctx.config.report_unchanged(),
    };
    let stream = merge_all::<Identity, _>(ctx.repo.reopen()?, &remote, options)?;

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for result in stream {
        let name = result.entity.as_ref().map(|e| e.display_name());
        let detail = name
            .clone()
            .or_else(|| result.reason.clone())
            .unwrap_or_default();
        print_human(
            cli,
            &format!("{} {} {}", result.status, result.label(), detail),
        );

        if result.is_failure() {
            failures.push(format!("{}: {}", result.label(), detail));
        }
        results.push(PullResultOutput {
            ref_name: result.ref_name.clone(),
            id: result.id.as_ref().map(|id| id.to_string()),
            status: result.status,
            name,
            reason: result.reason,
        });
    }

    if let Some(first) = failures.first() {
        return Err(CliError::Conflict(format!(
            "{} of {} identities could not be merged; first: {}",
            failures.len(),
            results.len(),
            first
        )));
    }

    if results.is_empty() {
        print_human(cli, &format!("Already up to date with {}", remote));
    }
    output_success(cli, PullOutput { remote, results });
    Ok(())
}

pub fn run_push(cli: &Cli, remote: Option<String>) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let remote = ctx.remote(remote);

    let report = push::<Identity, _>(&ctx.repo, &remote)?;
    for id in &report.pushed {
        print_human(cli, &format!("pushed {}", id.human()));
    }
    if report.pushed.is_empty() {
        print_human(cli, &format!("Everything up to date with {}", remote));
    }

    output_success(
        cli,
        PushOutput {
            remote,
            pushed: report.pushed.iter().map(|id| id.to_string()).collect(),
            up_to_date: report.up_to_date,
        },
    );
    Ok(())
}
