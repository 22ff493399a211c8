// src/model.rs

use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;

/// Marker replaced by a revision id in URL templates
pub const REVISION_MARKER: &str = "REVISION";

/// Marker replaced by a repository-relative path in file URL templates
pub const PATH_MARKER: &str = "PATH";

/// Path of the single file entry carried by a seed record
pub const SEED_PLACEHOLDER_PATH: &str = "ignored";

/// Caller-supplied link templates for commits and files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplates {
    pub commit: String,
    pub file: String,
}

impl UrlTemplates {
    pub fn commit_url(&self, revision: &str) -> String {
        self.commit.replace(REVISION_MARKER, revision)
    }

    pub fn file_url(&self, revision: &str, path: &str) -> String {
        self.file
            .replace(REVISION_MARKER, revision)
            .replace(PATH_MARKER, path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

// The tracking service keys users by email, so it doubles as the username.
impl Serialize for Author {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Author", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("username", &self.email)?;
        state.end()
    }
}

/// Commit metadata as read from the repository, before any diffing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: String,
    pub message: String,
    pub author: Author,
    pub committed_at: DateTime<FixedOffset>,
    /// Parent ids in the order git records them; the first one is the mainline
    pub parents: Vec<String>,
}

/// A commit as reported to the tracking service.
///
/// `files` holds the paths that differ between this commit and the commit that
/// preceded it in the walk, which is not necessarily its graph parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub revision: String,
    pub message: String,
    pub author: Author,
    #[serde(rename = "date")]
    pub committed_at: DateTime<FixedOffset>,
    pub files: Vec<String>,
    pub parents: Vec<String>,
    pub url: String,
}

impl Commit {
    pub fn new(revision: Revision, files: BTreeSet<String>, templates: &UrlTemplates) -> Self {
        let url = templates.commit_url(&revision.id);
        Self {
            revision: revision.id,
            message: revision.message,
            author: revision.author,
            committed_at: revision.committed_at,
            files: files.into_iter().collect(),
            parents: revision.parents,
            url,
        }
    }

    /// Keeps only the first `max_files` files and `max_parents` parents.
    pub fn truncated(mut self, max_files: usize, max_parents: usize) -> Self {
        self.files.truncate(max_files);
        self.parents.truncate(max_parents);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub url: String,
    pub additions: u32,
    pub deletions: u32,
}

impl FileChange {
    /// Line stats are not computed; additions and deletions stay zero.
    pub fn new(templates: &UrlTemplates, revision: &str, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            url: templates.file_url(revision, &path),
            path,
            additions: 0,
            deletions: 0,
        }
    }
}

/// A bounded description of one deployment, ready to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    #[serde(rename = "sha")]
    pub head_revision: String,
    pub environment: String,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub commits: Vec<Commit>,
    pub files: Vec<FileChange>,
    /// Reserved by the wire format; never populated.
    pub pull_requests: Vec<()>,
}

/// What the tracking service knows about the last deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineState {
    Known(String),
    Unknown,
}

impl From<Option<LatestDeploy>> for BaselineState {
    fn from(latest: Option<LatestDeploy>) -> Self {
        match latest {
            Some(deploy) => BaselineState::Known(deploy.revision),
            None => BaselineState::Unknown,
        }
    }
}

/// The most recently recorded deploy for an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestDeploy {
    pub slug: String,
    pub revision: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> UrlTemplates {
        UrlTemplates {
            commit: "https://git.example.com/c/REVISION".to_string(),
            file: "https://git.example.com/f/REVISION/PATH".to_string(),
        }
    }

    fn revision(id: &str) -> Revision {
        Revision {
            id: id.to_string(),
            message: "fix things\n".to_string(),
            author: Author {
                name: "Jo Dev".to_string(),
                email: "jo@example.com".to_string(),
            },
            committed_at: DateTime::parse_from_rfc3339("2024-03-01T10:00:00+02:00").unwrap(),
            parents: vec!["p1".to_string(), "p2".to_string(), "p3".to_string()],
        }
    }

    #[test]
    fn templates_substitute_revision_and_path() {
        let t = templates();
        assert_eq!(t.commit_url("abc"), "https://git.example.com/c/abc");
        assert_eq!(t.file_url("abc", "src/lib.rs"), "https://git.example.com/f/abc/src/lib.rs");
    }

    #[test]
    fn file_change_has_zero_line_stats() {
        let change = FileChange::new(&templates(), "abc", "README.md");
        assert_eq!(change.path, "README.md");
        assert_eq!(change.url, "https://git.example.com/f/abc/README.md");
        assert_eq!((change.additions, change.deletions), (0, 0));
    }

    #[test]
    fn commit_serializes_with_username_and_offset_date() {
        let files = ["b.txt", "a.txt"].iter().map(|s| s.to_string()).collect();
        let commit = Commit::new(revision("abc"), files, &templates());
        let json = serde_json::to_value(&commit).unwrap();

        assert_eq!(json["revision"], "abc");
        assert_eq!(json["author"]["username"], "jo@example.com");
        assert_eq!(json["date"], "2024-03-01T10:00:00+02:00");
        assert_eq!(json["files"], serde_json::json!(["a.txt", "b.txt"]));
        assert_eq!(json["url"], "https://git.example.com/c/abc");
    }

    #[test]
    fn truncated_keeps_prefixes() {
        let files = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let commit = Commit::new(revision("abc"), files, &templates()).truncated(2, 1);
        assert_eq!(commit.files, vec!["a", "b"]);
        assert_eq!(commit.parents, vec!["p1"]);
    }

    #[test]
    fn baseline_state_from_lookup() {
        assert_eq!(BaselineState::from(None), BaselineState::Unknown);
        let latest = LatestDeploy {
            slug: "deploy-1".to_string(),
            revision: "abc".to_string(),
            url: "/deploys/1".to_string(),
        };
        assert_eq!(BaselineState::from(Some(latest)), BaselineState::Known("abc".to_string()));
    }
}
