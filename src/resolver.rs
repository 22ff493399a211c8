// src/resolver.rs

use crate::error::Result;
use crate::model::{Commit, FileChange, Revision, UrlTemplates};
use crate::source::RevisionSource;
use indicatif::ProgressBar;
use std::collections::HashSet;
use tracing::debug;

/// Commits and files between a baseline and a head, before shaping
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delta {
    /// Oldest first; each commit's files are relative to the one before it.
    pub commits: Vec<Commit>,
    /// Direct diff between head and baseline.
    pub files: Vec<FileChange>,
}

pub struct DeltaResolver<'a, S: ?Sized> {
    source: &'a S,
    templates: &'a UrlTemplates,
}

impl<'a, S: RevisionSource + ?Sized> DeltaResolver<'a, S> {
    pub fn new(source: &'a S, templates: &'a UrlTemplates) -> Self {
        Self { source, templates }
    }

    pub fn resolve(&self, baseline: &Revision, head: &Revision) -> Result<Delta> {
        // 1. Collect the range and walk it from the baseline forwards
        let mut range = self.source.range(&baseline.id, &head.id)?;
        range.reverse();
        debug!(baseline = %baseline.id, head = %head.id, commits = range.len(), "resolving delta");

        let bar = ProgressBar::new(range.len() as u64);
        bar.set_message("Walking commits");

        // 2. Attribute files to each commit against the previous step of the walk
        let mut seen = HashSet::new();
        let mut commits = Vec::with_capacity(range.len());
        let mut previous = baseline.id.clone();
        for revision in range {
            bar.inc(1);
            if !seen.insert(revision.id.clone()) {
                continue;
            }
            let changed = self.source.diff_paths(&previous, &revision.id)?;
            previous = revision.id.clone();
            commits.push(Commit::new(revision, changed, self.templates));
        }
        bar.finish_and_clear();

        // 3. The aggregate is its own diff, not the union of the walk
        let files = self
            .source
            .diff_paths(&head.id, &baseline.id)?
            .into_iter()
            .map(|path| FileChange::new(self.templates, &head.id, path))
            .collect();

        Ok(Delta { commits, files })
    }
}
