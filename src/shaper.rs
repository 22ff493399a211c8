// src/shaper.rs

use crate::model::{Commit, DeploymentRecord, FileChange};
use chrono::Utc;
use tracing::warn;

pub const MAX_COMMITS: usize = 250;
pub const MAX_FILES: usize = 200;
pub const MAX_COMMIT_FILES: usize = 200;
pub const MAX_COMMIT_PARENTS: usize = 200;

/// Size limits applied before submission. Every limit is a plain prefix cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub commits: usize,
    pub files: usize,
    pub commit_files: usize,
    pub commit_parents: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            commits: MAX_COMMITS,
            files: MAX_FILES,
            commit_files: MAX_COMMIT_FILES,
            commit_parents: MAX_COMMIT_PARENTS,
        }
    }
}

pub struct PayloadShaper {
    environment: String,
    limits: Limits,
}

impl PayloadShaper {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            limits: Limits::default(),
        }
    }

    /// Builds a record stamped with the current time.
    ///
    /// Commits past the limit are dropped from the end of the list, so a very
    /// long range loses its most recent commits rather than its oldest.
    pub fn shape(&self, head_revision: &str, commits: Vec<Commit>, mut files: Vec<FileChange>) -> DeploymentRecord {
        if commits.len() > self.limits.commits {
            warn!(
                total = commits.len(),
                kept = self.limits.commits,
                "commit list truncated, newest commits are not reported"
            );
        }
        let commits = commits
            .into_iter()
            .take(self.limits.commits)
            .map(|commit| commit.truncated(self.limits.commit_files, self.limits.commit_parents))
            .collect();
        files.truncate(self.limits.files);

        DeploymentRecord {
            head_revision: head_revision.to_string(),
            environment: self.environment.clone(),
            timestamp: Utc::now(),
            commits,
            files,
            pull_requests: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, Revision, UrlTemplates};
    use chrono::DateTime;

    fn templates() -> UrlTemplates {
        UrlTemplates {
            commit: "https://example.com/REVISION".to_string(),
            file: "https://example.com/REVISION/PATH".to_string(),
        }
    }

    fn commit(n: usize, files: usize, parents: usize) -> Commit {
        let revision = Revision {
            id: format!("{n:040x}"),
            message: format!("commit {n}"),
            author: Author {
                name: "Dev".to_string(),
                email: "dev@example.com".to_string(),
            },
            committed_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            parents: (0..parents).map(|p| format!("parent-{p:03}")).collect(),
        };
        let files = (0..files).map(|f| format!("file-{f:04}.txt")).collect();
        Commit::new(revision, files, &templates())
    }

    fn files(count: usize) -> Vec<FileChange> {
        (0..count)
            .map(|f| FileChange::new(&templates(), "head", format!("src/{f:04}.rs")))
            .collect()
    }

    #[test]
    fn short_payload_is_unchanged() {
        let commits: Vec<_> = (0..MAX_COMMITS).map(|n| commit(n, 3, 1)).collect();
        let files = files(MAX_FILES);

        let record = PayloadShaper::new("production").shape("head", commits.clone(), files.clone());
        assert_eq!(record.head_revision, "head");
        assert_eq!(record.environment, "production");
        assert_eq!(record.commits, commits);
        assert_eq!(record.files, files);
        assert!(record.pull_requests.is_empty());
    }

    #[test]
    fn long_payload_keeps_leading_entries() {
        let commits: Vec<_> = (0..MAX_COMMITS + 40).map(|n| commit(n, 0, 1)).collect();
        let files = files(MAX_FILES + 7);

        let record = PayloadShaper::new("staging").shape("head", commits.clone(), files.clone());
        assert_eq!(record.commits, commits[..MAX_COMMITS].to_vec());
        assert_eq!(record.files, files[..MAX_FILES].to_vec());
    }

    #[test]
    fn per_commit_lists_are_capped() {
        let big = commit(1, MAX_COMMIT_FILES + 5, MAX_COMMIT_PARENTS + 5);
        let record = PayloadShaper::new("production").shape("head", vec![big.clone()], Vec::new());

        let shaped = &record.commits[0];
        assert_eq!(shaped.files, big.files[..MAX_COMMIT_FILES].to_vec());
        assert_eq!(shaped.parents, big.parents[..MAX_COMMIT_PARENTS].to_vec());
    }

    #[test]
    fn shaping_is_idempotent() {
        let shaper = PayloadShaper::new("production");
        let commits: Vec<_> = (0..MAX_COMMITS + 10).map(|n| commit(n, MAX_COMMIT_FILES + 1, 2)).collect();

        let once = shaper.shape("head", commits, files(MAX_FILES + 1));
        let twice = shaper.shape("head", once.commits.clone(), once.files.clone());
        assert_eq!(once.commits, twice.commits);
        assert_eq!(once.files, twice.files);
    }
}
