// src/commands.rs

use crate::bootstrap::SettlePolicy;
use crate::cli::{DeployArgs, SetHealthArgs, ValidateArgs};
use crate::deploy::{self, DeployOutcome, DeployRequest};
use crate::error::{Error, Result};
use crate::model::UrlTemplates;
use crate::remote::{DeploymentService, Target, TrackerClient};
use crate::source::GitSource;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub fn deploy(client: &TrackerClient, args: DeployArgs) -> Result<()> {
    let repo_path = args.git_path.as_deref().unwrap_or(Path::new("."));
    let source = GitSource::open(repo_path)?;

    let request = DeployRequest {
        target: Target {
            organization: args.organization,
            deployment: args.deployment,
            environment: args.environment,
        },
        templates: UrlTemplates {
            commit: args.commit_url_pattern,
            file: args.file_url_pattern,
        },
        settle: SettlePolicy {
            timeout: Duration::from_secs(args.settle_timeout),
            ..SettlePolicy::default()
        },
    };

    match deploy::run(&source, client, &request)? {
        DeployOutcome::Seeded { revision } => info!(%revision, "seeded first deploy"),
        DeployOutcome::Registered { head, commits, files } => {
            info!(%head, commits, files, "registered deploy")
        }
    }
    Ok(())
}

pub fn validate(client: &TrackerClient, args: ValidateArgs) -> Result<()> {
    let rules = client.validate_rules(&args.organization, &args.deployment, &args.path)?;
    println!("Validated {} rule(s)", rules.len());
    Ok(())
}

pub fn set_health(client: &TrackerClient, args: SetHealthArgs) -> Result<()> {
    let target = Target {
        organization: args.organization,
        deployment: args.deployment,
        environment: args.environment,
    };
    let latest = client
        .latest_deploy(&target)?
        .ok_or_else(|| Error::NoRecordedDeploy {
            deployment: target.deployment.clone(),
            environment: target.environment.clone(),
        })?;

    if !client.set_health(&target, &latest.slug, args.health)? {
        return Err(Error::RemoteValidation("health not set".to_string()));
    }
    println!("Health set successfully: {}{}", client.base_url(), latest.url);
    Ok(())
}
