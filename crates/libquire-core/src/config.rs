use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::IdentityRef;
use crate::signing::SigningKeyPair;

/// Remote used when none is given on the command line
pub const DEFAULT_REMOTE: &str = "origin";

/// Repo-level configuration stored in .git/quire/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Remote used by fetch/pull/push when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_remote: Option<String>,
    /// Identity adopted by the user of this clone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityRef>,
    /// Merge engine options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Report up-to-date entities as `nothing` instead of skipping them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_unchanged: Option<bool>,
}

impl RepoConfig {
    pub fn remote(&self) -> &str {
        self.default_remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }

    pub fn report_unchanged(&self) -> bool {
        self.merge
            .as_ref()
            .and_then(|m| m.report_unchanged)
            .unwrap_or(false)
    }
}

/// quire's private directory inside the git dir
pub fn quire_dir(git_dir: &Path) -> PathBuf {
    git_dir.join("quire")
}

/// Load repo config from .git/quire/config.toml
pub fn load_repo_config(git_dir: &Path) -> Result<Option<RepoConfig>, ConfigError> {
    let config_path = quire_dir(git_dir).join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: RepoConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save repo config to .git/quire/config.toml
pub fn save_repo_config(git_dir: &Path, config: &RepoConfig) -> Result<(), ConfigError> {
    let dir = quire_dir(git_dir);
    std::fs::create_dir_all(&dir)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(dir.join("config.toml"), content)?;
    Ok(())
}

/// Directory holding signing key seeds, one file per public key
pub fn keys_dir(git_dir: &Path) -> PathBuf {
    quire_dir(git_dir).join("keys")
}

/// Store a signing key seed under .git/quire/keys/<public key>
pub fn save_signing_key(git_dir: &Path, keypair: &SigningKeyPair) -> Result<PathBuf, ConfigError> {
    let dir = keys_dir(git_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(keypair.public_key_hex());
    std::fs::write(&path, keypair.seed_hex())?;
    Ok(path)
}

/// Load the signing key for a public key, if this clone holds it
pub fn load_signing_key(
    git_dir: &Path,
    public_key: &str,
) -> Result<Option<SigningKeyPair>, ConfigError> {
    let path = keys_dir(git_dir).join(public_key);
    if !path.exists() {
        return Ok(None);
    }
    let seed = std::fs::read_to_string(&path)?;
    Ok(Some(SigningKeyPair::from_seed_hex(&seed)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::Id;
    use tempfile::tempdir;

    #[test]
    fn test_repo_config_roundtrip() {
        let dir = tempdir().unwrap();
        let git_dir = dir.path();
        let id = Id::parse(&"7".repeat(64)).unwrap();

        let config = RepoConfig {
            default_remote: Some("upstream".to_string()),
            user: Some(IdentityRef::from(id.clone())),
            merge: Some(MergeConfig {
                report_unchanged: Some(true),
            }),
        };

        save_repo_config(git_dir, &config).unwrap();
        let loaded = load_repo_config(git_dir).unwrap().unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.remote(), "upstream");
        assert!(loaded.report_unchanged());
        assert_eq!(loaded.user.unwrap().id(), &id);
    }

    #[test]
    fn test_missing_config_defaults() {
        let dir = tempdir().unwrap();
        assert!(load_repo_config(dir.path()).unwrap().is_none());

        let config = RepoConfig::default();
        assert_eq!(config.remote(), DEFAULT_REMOTE);
        assert!(!config.report_unchanged());
    }

    #[test]
    fn test_rejects_malformed_user_id() {
        let dir = tempdir().unwrap();
        let quire = quire_dir(dir.path());
        std::fs::create_dir_all(&quire).unwrap();
        std::fs::write(quire.join("config.toml"), "[user]\nid = \"../../HEAD\"\n").unwrap();

        assert!(matches!(
            load_repo_config(dir.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_signing_key_storage() {
        let dir = tempdir().unwrap();
        let keypair = SigningKeyPair::generate();

        save_signing_key(dir.path(), &keypair).unwrap();
        let loaded = load_signing_key(dir.path(), &keypair.public_key_hex())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.public_key_hex(), keypair.public_key_hex());

        assert!(load_signing_key(dir.path(), &"0".repeat(64)).unwrap().is_none());
    }
}
