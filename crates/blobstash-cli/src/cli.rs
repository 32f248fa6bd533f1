//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "blobstash", version, about = "Store and list JSON records on the blobstash API")]
pub struct Cli {
    /// API base URL (overrides config file)
    #[arg(long, global = true, env = "BLOBSTASH_API_URL")]
    pub api_url: Option<String>,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account (does not log in)
    Register(RegisterArgs),
    /// Log in and remember the session token
    Login(LoginArgs),
    /// Log out and forget the session token
    Logout,
    /// Save a JSON record
    Save(SaveArgs),
    /// List saved records
    List(ListArgs),
    /// Show whether a session token is stored
    Status,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    /// Prompted for when omitted
    #[arg(long, env = "BLOBSTASH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Defaults to the last email used
    #[arg(long)]
    pub email: Option<String>,
    /// Prompted for when omitted
    #[arg(long, env = "BLOBSTASH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// JSON document, or `-` to read stdin
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub json: Option<String>,
    /// Read the JSON document from a file
    #[arg(long, short)]
    pub file: Option<PathBuf>,
    /// Record timestamp (RFC 3339); defaults to now
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print the raw JSON array instead of a table
    #[arg(long)]
    pub json: bool,
}
