// src/source.rs

use crate::error::{Error, Result};
use crate::model::{Author, Revision};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::{Commit, DiffOptions, ErrorCode, Repository, Sort};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Read-only access to the history of a repository
pub trait RevisionSource {
    /// The commit HEAD points at.
    fn head(&self) -> Result<Revision>;

    /// Looks up a commit by id (or anything else git can resolve to a commit).
    fn commit(&self, id: &str) -> Result<Revision>;

    /// Commits reachable from `to_inclusive` but not from `from_exclusive`,
    /// newest first. Empty when the two share no history.
    fn range(&self, from_exclusive: &str, to_inclusive: &str) -> Result<Vec<Revision>>;

    /// Every path whose content differs between the trees of `a` and `b`.
    fn diff_paths(&self, a: &str, b: &str) -> Result<BTreeSet<String>>;
}

pub struct GitSource {
    repo: Repository,
}

impl GitSource {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = Repository::discover(repo_path)?;
        debug!(path = %repo_path.display(), "opened repository");
        Ok(Self { repo })
    }

    fn find(&self, id: &str) -> Result<Commit<'_>> {
        let object = self.repo.revparse_single(id).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
                Error::NotFound(id.to_string())
            }
            _ => e.into(),
        })?;
        object
            .peel_to_commit()
            .map_err(|_| Error::NotFound(id.to_string()))
    }
}

impl RevisionSource for GitSource {
    fn head(&self) -> Result<Revision> {
        let head = self.repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => Error::EmptyRepository,
            _ => e.into(),
        })?;
        let commit = head.peel_to_commit()?;
        Ok(to_revision(&commit))
    }

    fn commit(&self, id: &str) -> Result<Revision> {
        let commit = self.find(id)?;
        Ok(to_revision(&commit))
    }

    fn range(&self, from_exclusive: &str, to_inclusive: &str) -> Result<Vec<Revision>> {
        let base = self.find(from_exclusive)?.id();
        let tip = self.find(to_inclusive)?.id();
        if base == tip {
            return Ok(Vec::new());
        }

        match self.repo.merge_base(base, tip) {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(%base, %tip, "no common ancestor, range is empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        }

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.hide(base)?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        revwalk
            .map(|oid| -> Result<Revision> {
                let commit = self.repo.find_commit(oid?)?;
                Ok(to_revision(&commit))
            })
            .collect()
    }

    fn diff_paths(&self, a: &str, b: &str) -> Result<BTreeSet<String>> {
        let old_tree = self.find(a)?.tree()?;
        let new_tree = self.find(b)?.tree()?;

        let mut diff_opts = DiffOptions::new();
        diff_opts.include_typechange(true);

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;

        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            let old_path = delta.old_file().path_bytes();
            let new_path = delta.new_file().path_bytes();
            paths.extend(
                old_path
                    .into_iter()
                    .chain(new_path)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            );
        }
        Ok(paths)
    }
}

fn to_revision(commit: &Commit) -> Revision {
    let author = commit.author();
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    let committed_at = DateTime::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .with_timezone(&offset);

    Revision {
        id: commit.id().to_string(),
        message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        author: Author {
            name: author.name().unwrap_or("Unknown").to_string(),
            email: author.email().unwrap_or("").to_string(),
        },
        committed_at,
        parents: commit.parent_ids().map(|id| id.to_string()).collect(),
    }
}
