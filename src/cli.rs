// src/cli.rs

use crate::remote::Health;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Register deployments with a deployment-tracking service", long_about = None)]
pub struct Args {
    /// API key for the tracking service
    #[arg(short = 'k', long, env = "DEPLOY_TRACKER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the tracking service
    #[arg(long, default_value = "https://app.sleuth.io", hide = true)]
    pub baseurl: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a deploy using information from a local git repository
    Deploy(DeployArgs),
    /// Validate a rules file against a deployment
    Validate(ValidateArgs),
    /// Set the health of the latest deploy in an environment
    SetHealth(SetHealthArgs),
}

#[derive(clap::Args, Debug)]
pub struct DeployArgs {
    /// Organization slug
    #[arg(short, long)]
    pub organization: String,

    /// Deployment slug
    #[arg(short, long)]
    pub deployment: String,

    /// Environment slug
    #[arg(short, long, default_value = "production")]
    pub environment: String,

    /// Commit link template; REVISION is replaced with the commit id
    #[arg(long, default_value = "https://example.com/REVISION")]
    pub commit_url_pattern: String,

    /// File link template; REVISION and PATH are replaced
    #[arg(long, default_value = "https://example.com/REVISION/PATH")]
    pub file_url_pattern: String,

    /// Seconds to wait for the service to record a first-deploy seed
    #[arg(long, default_value_t = 5)]
    pub settle_timeout: u64,

    /// Path to the git repository (defaults to the current directory)
    pub git_path: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Organization slug
    #[arg(short, long)]
    pub organization: String,

    /// Deployment slug
    #[arg(short, long)]
    pub deployment: String,

    /// Rules file to validate
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct SetHealthArgs {
    /// Organization slug
    #[arg(short, long)]
    pub organization: String,

    /// Deployment slug
    #[arg(short, long)]
    pub deployment: String,

    /// Environment slug
    #[arg(short, long, default_value = "production")]
    pub environment: String,

    #[arg(value_enum, ignore_case = true)]
    pub health: Health,
}
