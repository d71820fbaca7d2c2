use libquire_core::config::save_signing_key;
use libquire_core::signing::SigningKeyPair;
use libquire_core::{Entity, Identity, IdentityRef, Key, Mutation};
use libquire_git::{commit, list_local_ids, next_time, read_local};
use serde::Serialize;

use crate::cli::{Cli, UserCommand};
use crate::context::QuireContext;
use crate::error::CliError;
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct UserCreateOutput {
    id: String,
    name: String,
    adopted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

#[derive(Serialize)]
struct UserEditOutput {
    id: String,
    changed: bool,
    versions: usize,
}

#[derive(Serialize)]
struct UserListOutput {
    identities: Vec<UserInfo>,
}

#[derive(Serialize)]
struct UserInfo {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    adopted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct UserShowOutput {
    id: String,
    name: String,
    email: Option<String>,
    login: Option<String>,
    avatar_url: Option<String>,
    keys: Vec<String>,
    versions: usize,
    lamport: u64,
    last_modified: Option<String>,
    adopted: bool,
}

#[derive(Serialize)]
struct UserAdoptOutput {
    id: String,
    repo_config: String,
}

pub fn run(cli: &Cli, cmd: UserCommand) -> Result<(), CliError> {
    match cmd {
        UserCommand::Create {
            name,
            email,
            login,
            avatar_url,
            generate_key,
        } => {
            let mutation = Mutation {
                name,
                email,
                login,
                avatar_url,
                ..Default::default()
            };
            run_create(cli, mutation, generate_key)
        }
        UserCommand::Edit {
            id,
            name,
            email,
            login,
            avatar_url,
            generate_key,
        } => run_edit(
            cli,
            id.as_deref(),
            Edits {
                name,
                email,
                login,
                avatar_url,
            },
            generate_key,
        ),
        UserCommand::Ls => run_list(cli),
        UserCommand::Show { id } => run_show(cli, id.as_deref()),
        UserCommand::Adopt { id } => run_adopt(cli, &id),
    }
}

struct Edits {
    name: Option<String>,
    email: Option<String>,
    login: Option<String>,
    avatar_url: Option<String>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_key(ctx: &QuireContext) -> Result<(SigningKeyPair, Key), CliError> {
    let keypair = SigningKeyPair::generate();
    save_signing_key(ctx.git_dir(), &keypair)?;
    let key = Key::from_keypair(&keypair);
    Ok((keypair, key))
}

fn run_create(cli: &Cli, mut mutation: Mutation, generate_key: bool) -> Result<(), CliError> {
    let mut ctx = QuireContext::resolve()?;

    let keypair = if generate_key {
        let (keypair, key) = new_key(&ctx)?;
        mutation.keys.push(key);
        Some(keypair)
    } else {
        None
    };

    let time = next_time::<Identity, _>(&ctx.repo, None)?;
    let mut identity = Identity::new(mutation, time, now(), keypair.as_ref());
    commit(&ctx.repo, &mut identity)?;

    // the first identity created in a clone becomes its user
    let adopted = ctx.config.user.is_none();
    if adopted {
        ctx.config.user = Some(IdentityRef::from(identity.id().clone()));
        ctx.save_config()?;
    }

    print_human(
        cli,
        &format!("Created identity {} {}", identity.id().human(), identity.display_name()),
    );
    output_success(
        cli,
        UserCreateOutput {
            id: identity.id().to_string(),
            name: identity.name().to_string(),
            adopted,
            key: keypair.map(|k| k.public_key_hex()),
        },
    );
    Ok(())
}

fn run_edit(
    cli: &Cli,
    id: Option<&str>,
    edits: Edits,
    generate_key: bool,
) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let mut identity = ctx.identity_or_adopted(id)?;
    let signer = ctx.signer_for(&identity)?;

    let added_key = if generate_key {
        let (_, key) = new_key(&ctx)?;
        Some(key)
    } else {
        None
    };

    let time = next_time(&ctx.repo, Some(&identity))?;
    let changed = identity.mutate(time, now(), signer.as_ref(), |m| {
        if let Some(name) = edits.name {
            m.name = name;
        }
        if let Some(email) = edits.email {
            m.email = Some(email);
        }
        if let Some(login) = edits.login {
            m.login = Some(login);
        }
        if let Some(avatar_url) = edits.avatar_url {
            m.avatar_url = Some(avatar_url);
        }
        if let Some(key) = added_key {
            m.keys.push(key);
        }
    });

    if changed {
        commit(&ctx.repo, &mut identity)?;
        print_human(
            cli,
            &format!("Updated identity {} {}", identity.id().human(), identity.display_name()),
        );
    } else {
        print_human(cli, "Nothing changed");
    }

    output_success(
        cli,
        UserEditOutput {
            id: identity.id().to_string(),
            changed,
            versions: identity.versions().len(),
        },
    );
    Ok(())
}

fn run_list(cli: &Cli) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let adopted = ctx.adopted_id();

    let mut identities = Vec::new();
    for id in list_local_ids::<Identity, _>(&ctx.repo)? {
        let is_adopted = adopted == Some(&id);
        let info = match read_local::<Identity, _>(&ctx.repo, &id) {
            Ok(identity) => {
                let marker = if is_adopted { "*" } else { " " };
                print_human(
                    cli,
                    &format!("{} {} {}", marker, id.human(), identity.display_name()),
                );
                UserInfo {
                    id: id.to_string(),
                    name: Some(identity.display_name()),
                    adopted: is_adopted,
                    error: None,
                }
            }
            Err(e) => {
                print_human(cli, &format!("! {} invalid: {}", id.human(), e));
                UserInfo {
                    id: id.to_string(),
                    name: None,
                    adopted: is_adopted,
                    error: Some(e.to_string()),
                }
            }
        };
        identities.push(info);
    }

    output_success(cli, UserListOutput { identities });
    Ok(())
}

fn run_show(cli: &Cli, id: Option<&str>) -> Result<(), CliError> {
    let ctx = QuireContext::resolve()?;
    let identity = ctx.identity_or_adopted(id)?;
    let adopted = ctx.adopted_id() == Some(identity.id());
    let last_modified = identity.last_modification().map(|t| t.to_rfc3339());

    print_human(cli, &format!("Id:         {}", identity.id()));
    print_human(cli, &format!("Name:       {}", identity.name()));
    if let Some(email) = identity.email() {
        print_human(cli, &format!("Email:      {}", email));
    }
    if let Some(login) = identity.login() {
        print_human(cli, &format!("Login:      {}", login));
    }
    if let Some(avatar_url) = identity.avatar_url() {
        print_human(cli, &format!("Avatar:     {}", avatar_url));
    }
    for key in identity.keys() {
        print_human(cli, &format!("Key:        {}", key.fingerprint()));
    }
    print_human(cli, &format!("Versions:   {}", identity.versions().len()));
    if let Some(ref t) = last_modified {
        print_human(cli, &format!("Modified:   {}", t));
    }
    if adopted {
        print_human(cli, "Adopted:    yes");
    }

    output_success(
        cli,
        UserShowOutput {
            id: identity.id().to_string(),
            name: identity.name().to_string(),
            email: identity.email().map(String::from),
            login: identity.login().map(String::from),
            avatar_url: identity.avatar_url().map(String::from),
            keys: identity.keys().iter().map(|k| k.public_key.clone()).collect(),
            versions: identity.versions().len(),
            lamport: identity.last_lamport().0,
            last_modified,
            adopted,
        },
    );
    Ok(())
}

fn run_adopt(cli: &Cli, prefix: &str) -> Result<(), CliError> {
    let mut ctx = QuireContext::resolve()?;
    let identity = ctx.find_identity(prefix)?;

    ctx.config.user = Some(IdentityRef::from(identity.id().clone()));
    let path = ctx.save_config()?;

    print_human(
        cli,
        &format!("Adopted identity {} {}", identity.id().human(), identity.display_name()),
    );
    output_success(
        cli,
        UserAdoptOutput {
            id: identity.id().to_string(),
            repo_config: path.to_string_lossy().to_string(),
        },
    );
    Ok(())
}
