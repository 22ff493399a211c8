// src/deploy.rs

use crate::bootstrap::{await_settled, BootstrapPolicy, Plan, SettlePolicy};
use crate::error::Result;
use crate::model::{BaselineState, Revision, UrlTemplates};
use crate::remote::{DeploymentService, Target};
use crate::resolver::DeltaResolver;
use crate::shaper::PayloadShaper;
use crate::source::RevisionSource;
use tracing::info;

pub struct DeployRequest {
    pub target: Target,
    pub templates: UrlTemplates,
    pub settle: SettlePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Only a seed went out; the repository has a single commit.
    Seeded { revision: String },
    Registered {
        head: String,
        commits: usize,
        files: usize,
    },
}

/// Runs one deploy registration end to end: look up the baseline, bootstrap if
/// there is none, resolve the delta, shape it and submit it.
pub fn run<S, R>(source: &S, service: &R, request: &DeployRequest) -> Result<DeployOutcome>
where
    S: RevisionSource + ?Sized,
    R: DeploymentService + ?Sized,
{
    let target = &request.target;
    let state = BaselineState::from(service.latest_deploy(target)?);
    let head = source.head()?;
    info!(head = %head.id, ?state, "starting deploy registration");

    let shaper = PayloadShaper::new(target.environment.as_str());
    let policy = BootstrapPolicy::new(source, &request.templates, &shaper);

    let baseline = match policy.plan(&state, &head)? {
        Plan::Resolve { baseline } => baseline,
        Plan::SeedThenResolve { seed, baseline } => {
            println!("Sending initial state prior to the first deployment");
            service.register_deploy(target, &seed)?;
            let settled = await_settled(service, target, &seed.head_revision, &request.settle)?;
            info!(?settled, seed = %seed.head_revision, "seed deploy submitted");
            baseline
        }
        Plan::SeedOnly { seed } => {
            println!("Only one commit detected, so nothing will show up until there are two");
            println!("Sending initial state prior to the first deployment");
            service.register_deploy(target, &seed)?;
            return Ok(DeployOutcome::Seeded {
                revision: seed.head_revision,
            });
        }
    };

    register_delta(source, service, request, &shaper, &baseline, &head)
}

fn register_delta<S, R>(
    source: &S,
    service: &R,
    request: &DeployRequest,
    shaper: &PayloadShaper,
    baseline: &Revision,
    head: &Revision,
) -> Result<DeployOutcome>
where
    S: RevisionSource + ?Sized,
    R: DeploymentService + ?Sized,
{
    println!("Determining differences from {} to {}", baseline.id, head.id);
    let delta = DeltaResolver::new(source, &request.templates).resolve(baseline, head)?;
    let record = shaper.shape(&head.id, delta.commits, delta.files);

    service.register_deploy(&request.target, &record)?;
    println!("Deployment registered!");

    Ok(DeployOutcome::Registered {
        head: record.head_revision,
        commits: record.commits.len(),
        files: record.files.len(),
    })
}
