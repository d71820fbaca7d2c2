use std::path::{Path, PathBuf};

use libquire_core::config::{load_signing_key, save_repo_config};
use libquire_core::signing::SigningKeyPair;
use libquire_core::{load_repo_config, Id, Identity, RepoConfig};
use libquire_git::{find_local_by_prefix, read_local, GitRepo};

use crate::error::CliError;

/// Resolved repository context for a quire command
pub struct QuireContext {
    pub repo: GitRepo,
    pub config: RepoConfig,
}

impl QuireContext {
    /// Open the repository containing the current directory.
    ///
    /// Worktrees resolve to the main repository's git dir, where refs and
    /// `.git/quire/` state are shared.
    pub fn resolve() -> Result<Self, CliError> {
        let cwd = std::env::current_dir()?;
        let repo = GitRepo::discover(&cwd)?;
        let config = load_repo_config(repo.git_dir())?.unwrap_or_default();
        Ok(Self { repo, config })
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.git_dir()
    }

    pub fn save_config(&self) -> Result<PathBuf, CliError> {
        save_repo_config(self.git_dir(), &self.config)?;
        Ok(libquire_core::config::quire_dir(self.git_dir()).join("config.toml"))
    }

    /// Remote from the command line, then repo config, then `origin`
    pub fn remote(&self, remote: Option<String>) -> String {
        remote.unwrap_or_else(|| self.config.remote().to_string())
    }

    pub fn adopted_id(&self) -> Option<&Id> {
        self.config.user.as_ref().map(|u| u.id())
    }

    /// Find a local identity by id prefix
    pub fn find_identity(&self, prefix: &str) -> Result<Identity, CliError> {
        if prefix.is_empty() {
            return Err(CliError::InvalidArgs("empty identity id".to_string()));
        }
        let id = find_local_by_prefix::<Identity, _>(&self.repo, prefix)?.ok_or_else(|| {
            CliError::NotFound(format!("no unique identity matches '{}'", prefix))
        })?;
        Ok(read_local(&self.repo, &id)?)
    }

    /// The identity named on the command line, or else the adopted one
    pub fn identity_or_adopted(&self, prefix: Option<&str>) -> Result<Identity, CliError> {
        match prefix {
            Some(prefix) => self.find_identity(prefix),
            None => {
                let id = self.adopted_id().ok_or_else(|| {
                    CliError::NotFound("no identity adopted in this repository".to_string())
                })?;
                Ok(read_local(&self.repo, id)?)
            }
        }
    }

    /// A key pair of this clone that is listed on the identity's current version
    pub fn signer_for(&self, identity: &Identity) -> Result<Option<SigningKeyPair>, CliError> {
        for key in identity.keys() {
            if let Some(keypair) = load_signing_key(self.git_dir(), &key.public_key)? {
                return Ok(Some(keypair));
            }
        }
        Ok(None)
    }
}
