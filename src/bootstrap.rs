// src/bootstrap.rs

use crate::error::Result;
use crate::model::{BaselineState, Commit, DeploymentRecord, FileChange, Revision, UrlTemplates, SEED_PLACEHOLDER_PATH};
use crate::remote::{DeploymentService, Target};
use crate::shaper::PayloadShaper;
use crate::source::RevisionSource;
use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What a run has to do given what the tracking service already knows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// A baseline is recorded; diff against it.
    Resolve { baseline: Revision },
    /// Nothing recorded yet: seed with the head's first parent, then diff against it.
    SeedThenResolve {
        seed: DeploymentRecord,
        baseline: Revision,
    },
    /// Nothing recorded and the head is a root commit: seed with it and stop.
    SeedOnly { seed: DeploymentRecord },
}

pub struct BootstrapPolicy<'a, S: ?Sized> {
    source: &'a S,
    templates: &'a UrlTemplates,
    shaper: &'a PayloadShaper,
}

impl<'a, S: RevisionSource + ?Sized> BootstrapPolicy<'a, S> {
    pub fn new(source: &'a S, templates: &'a UrlTemplates, shaper: &'a PayloadShaper) -> Self {
        Self {
            source,
            templates,
            shaper,
        }
    }

    pub fn plan(&self, state: &BaselineState, head: &Revision) -> Result<Plan> {
        match state {
            BaselineState::Known(id) => Ok(Plan::Resolve {
                baseline: self.source.commit(id)?,
            }),
            BaselineState::Unknown => match head.parents.first() {
                Some(parent_id) => {
                    let parent = self.source.commit(parent_id)?;
                    let seed = self.seed(&parent);
                    Ok(Plan::SeedThenResolve { seed, baseline: parent })
                }
                None => Ok(Plan::SeedOnly { seed: self.seed(head) }),
            },
        }
    }

    /// A record whose only commit is `revision`, with no diff behind it.
    fn seed(&self, revision: &Revision) -> DeploymentRecord {
        let commit = Commit::new(revision.clone(), BTreeSet::new(), self.templates);
        let placeholder = FileChange::new(self.templates, &revision.id, SEED_PLACEHOLDER_PATH);
        self.shaper.shape(&revision.id, vec![commit], vec![placeholder])
    }
}

/// How long to wait for the tracking service to pick up a seed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The service reports the seed as its latest deploy.
    Consistent,
    /// The window elapsed first.
    TimedOut,
}

/// Polls the latest deploy until it reports `revision` or the timeout passes.
///
/// The service gives no completion signal for a seed, so running out the
/// window is treated as settled, with a warning.
pub fn await_settled<R: DeploymentService + ?Sized>(
    service: &R,
    target: &Target,
    revision: &str,
    policy: &SettlePolicy,
) -> Result<Settled> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        let latest = service.latest_deploy(target)?;
        if latest.as_ref().is_some_and(|deploy| deploy.revision == revision) {
            debug!(revision, "seed deploy is visible");
            return Ok(Settled::Consistent);
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(revision, timeout = ?policy.timeout, "seed deploy not reported yet, continuing anyway");
            return Ok(Settled::TimedOut);
        }
        thread::sleep(policy.poll_interval.min(deadline - now));
    }
}
