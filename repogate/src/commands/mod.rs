//! CLI command implementations.

pub mod config;
pub mod trust;
pub mod verify;

use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Repository path or URL
    pub path: String,

    /// Tool used to reach the repository
    #[arg(long, default_value = repogate_common::probe::ssh::TOOL_NAME)]
    pub tool: String,

    /// Login name
    #[arg(short, long)]
    pub username: Option<String>,

    /// Environment variable holding the password
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,

    /// Namespace (site) the trust decision belongs to
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Accept unknown or changed host keys and certificates
    #[arg(long)]
    pub trust_host: bool,

    /// Per-attempt probe timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum TrustCommand {
    /// List accepted host keys and certificates
    List {
        /// Only show one namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}
