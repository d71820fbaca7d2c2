use libquire_core::{ConfigError, IdParseError};
use libquire_git::{GitError, LoadError, SyncError};
use thiserror::Error;

/// Error type for quire commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ID parse error: {0}")]
    IdParse(#[from] IdParseError),

    #[error(transparent)]
    Git(GitError),

    #[error(transparent)]
    Load(LoadError),

    #[error(transparent)]
    Sync(SyncError),
}

impl CliError {
    /// Error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            CliError::InvalidArgs(_) => "invalid_args",
            CliError::NotFound(_) => "not_found",
            CliError::Conflict(_) => "conflict",
            CliError::Io(_) => "io_error",
            CliError::Json(_) => "internal_error",
            CliError::Config(_) => "config_error",
            CliError::IdParse(_) => "invalid_args",
            CliError::Git(_) => "git_error",
            CliError::Load(_) => "invalid_data",
            CliError::Sync(_) => "sync_error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::IdParse(_) => 2,
            CliError::NotFound(_) => 3,
            CliError::Conflict(_) => 4,
            CliError::Io(_) => 5,
            CliError::Git(_) => 5,
            _ => 1,
        }
    }

    /// Actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            CliError::NotFound(msg) => {
                if msg.contains("adopted") {
                    vec![
                        "Run 'quire user create --name <name>' to create an identity",
                        "Or run 'quire user adopt <id>' to adopt an existing one",
                    ]
                } else if msg.contains("identity") {
                    vec!["Run 'quire user ls' to see local identities"]
                } else if msg.contains("remote") {
                    vec!["Run 'git remote -v' to see configured remotes"]
                } else {
                    vec![]
                }
            }
            CliError::Conflict(msg) => {
                if msg.contains("push") {
                    vec!["Run 'quire pull' to merge remote changes, then push again"]
                } else {
                    vec![
                        "Divergent identity edits are not merged automatically",
                        "Run 'quire status' to see which identities diverged",
                    ]
                }
            }
            CliError::IdParse(_) => vec![
                "Identity ids are 64 lowercase hex characters",
                "Use 'quire user ls' to see valid ids",
            ],
            _ => vec![],
        }
    }
}

impl From<GitError> for CliError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { .. } => {
                CliError::NotFound("Not a git repository (or any parent)".to_string())
            }
            GitError::RemoteNotFound { remote } => {
                CliError::NotFound(format!("remote '{}' does not exist", remote))
            }
            GitError::PushRejected { refname, reason } => CliError::Conflict(format!(
                "push of {} was rejected: {}",
                refname, reason
            )),
            other => CliError::Git(other),
        }
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::RefNotFound { refname } => {
                CliError::NotFound(format!("identity {} does not exist", refname))
            }
            LoadError::Store(e) => e.into(),
            other => CliError::Load(other),
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Git(e) => e.into(),
            SyncError::Load(e) => e.into(),
            SyncError::MergeFailure { id, reason } => {
                CliError::Conflict(format!("identity {}: {}", id, reason))
            }
            other => CliError::Sync(other),
        }
    }
}
