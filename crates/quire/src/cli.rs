use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quire", about = "Git-native identities for distributed ticket tracking", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Identity management commands
    User {
        #[command(subcommand)]
        cmd: UserCommand,
    },

    /// Fetch identities from a remote without merging them
    Fetch {
        /// Remote name (default: repo config, then origin)
        remote: Option<String>,
    },

    /// Fetch identities from a remote and merge them into local refs
    Pull {
        /// Remote name (default: repo config, then origin)
        remote: Option<String>,
    },

    /// Push local identities to a remote
    Push {
        /// Remote name (default: repo config, then origin)
        remote: Option<String>,
    },

    /// Compare local identities with their remote-tracking refs
    Status {
        /// Remote name (default: repo config, then origin)
        remote: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum UserCommand {
    /// Create a new identity
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        login: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,

        /// Generate a signing key and list it on the identity
        #[arg(long)]
        generate_key: bool,
    },

    /// Edit an identity (default: the adopted one)
    Edit {
        /// Identity id or unique prefix
        id: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        login: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,

        /// Generate a new signing key and add it to the identity
        #[arg(long)]
        generate_key: bool,
    },

    /// List local identities
    #[command(alias = "list")]
    Ls,

    /// Show an identity (default: the adopted one)
    Show {
        /// Identity id or unique prefix
        id: Option<String>,
    },

    /// Adopt an identity as the user of this clone
    Adopt {
        /// Identity id or unique prefix
        id: String,
    },
}
