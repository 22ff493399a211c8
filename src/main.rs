// src/main.rs

mod bootstrap;
mod cli;
mod commands;
mod deploy;
mod error;
mod model;
mod remote;
mod resolver;
mod shaper;
mod source;

use clap::Parser;
use cli::{Args, Command};
use remote::{RemoteConfig, TrackerClient};
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start_time = Instant::now();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    tracing::debug!("finished in {:.2?}", start_time.elapsed());
}

fn run(args: Args) -> error::Result<()> {
    let client = TrackerClient::new(RemoteConfig {
        base_url: args.baseurl,
        api_key: args.api_key,
    })?;

    match args.command {
        Command::Deploy(deploy) => commands::deploy(&client, deploy),
        Command::Validate(validate) => commands::validate(&client, validate),
        Command::SetHealth(set_health) => commands::set_health(&client, set_health),
    }
}
