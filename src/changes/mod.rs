//! Change sources: "what changed", independent of where it comes from.
//!
//! A [`ChangeSource`] is an immutable description of a change set: the
//! working tree, the staged index, one commit, or a batch of commits. It
//! becomes a concrete list of [`FileChange`]s only when asked, against a
//! store.

use std::collections::BTreeSet;

use log::debug;

use crate::error::{Error, Result};
use crate::store::{ObjectId, ObjectStore, Snapshot, TreeChange};

pub use crate::store::ChangeKind;

/// One side of a file change. Content is read from the store on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    pub snapshot: Snapshot,
    pub path: String,
    pub executable: bool,
}

impl FileVersion {
    /// Read this version's bytes.
    pub fn content(&self, store: &dyn ObjectStore) -> Result<Vec<u8>> {
        store
            .read(&self.snapshot, &self.path)?
            .map(|blob| blob.content)
            .ok_or_else(|| Error::NotFound(format!("{} at {}", self.path, self.snapshot)))
    }
}

/// A change to one regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    /// Absent for added files.
    pub previous: Option<FileVersion>,
    /// Absent for deleted files.
    pub current: Option<FileVersion>,
}

impl FileChange {
    fn from_tree_change(change: TreeChange, base: &Snapshot, target: &Snapshot) -> Self {
        let previous = change.old_executable.map(|executable| FileVersion {
            snapshot: base.clone(),
            path: change.old_path.clone().unwrap_or_else(|| change.path.clone()),
            executable,
        });
        let current = change.new_executable.map(|executable| FileVersion {
            snapshot: target.clone(),
            path: change.path.clone(),
            executable,
        });
        Self {
            path: change.path,
            kind: change.kind,
            previous,
            current,
        }
    }

    pub fn previous_executable(&self) -> Option<bool> {
        self.previous.as_ref().map(|v| v.executable)
    }

    pub fn current_executable(&self) -> Option<bool> {
        self.current.as_ref().map(|v| v.executable)
    }
}

/// The four kinds of change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// On-disk files relative to `HEAD`.
    WorkingTree,
    /// Staged content relative to `HEAD`.
    StagedIndex,
    /// A commit relative to its first parent.
    Commit(ObjectId),
    /// Each member commit relative to its own first parent, concatenated.
    CommitRange(Vec<ObjectId>),
}

/// A change set, optionally restricted to an allow-list of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSource {
    kind: SourceKind,
    allow: Option<BTreeSet<String>>,
}

impl ChangeSource {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind, allow: None }
    }

    pub fn working_tree() -> Self {
        Self::new(SourceKind::WorkingTree)
    }

    pub fn staged_index() -> Self {
        Self::new(SourceKind::StagedIndex)
    }

    pub fn commit(id: ObjectId) -> Self {
        Self::new(SourceKind::Commit(id))
    }

    pub fn commit_range(ids: Vec<ObjectId>) -> Self {
        Self::new(SourceKind::CommitRange(ids))
    }

    /// Only report changes to these paths. An empty list means no restriction.
    pub fn restrict_to<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allow: BTreeSet<String> = paths.into_iter().map(Into::into).collect();
        self.allow = (!allow.is_empty()).then_some(allow);
        self
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Changed files, ordered by path within each commit.
    pub fn list_changes(&self, store: &dyn ObjectStore) -> Result<Vec<FileChange>> {
        let mut changes = Vec::new();
        match &self.kind {
            SourceKind::WorkingTree => {
                let base = head_snapshot(store)?;
                self.collect(store, &base, &Snapshot::WorkTree, &mut changes)?;
            }
            SourceKind::StagedIndex => {
                let base = head_snapshot(store)?;
                self.collect(store, &base, &Snapshot::Index, &mut changes)?;
            }
            SourceKind::Commit(id) => self.collect_commit(store, id, &mut changes)?,
            SourceKind::CommitRange(ids) => {
                for id in ids {
                    self.collect_commit(store, id, &mut changes)?;
                }
            }
        }
        Ok(changes)
    }

    fn collect_commit(
        &self,
        store: &dyn ObjectStore,
        id: &ObjectId,
        out: &mut Vec<FileChange>,
    ) -> Result<()> {
        let base = match store.parents(id)?.into_iter().next() {
            Some(parent) => Snapshot::Commit(parent),
            None => Snapshot::Empty,
        };
        self.collect(store, &base, &Snapshot::Commit(id.clone()), out)
    }

    fn collect(
        &self,
        store: &dyn ObjectStore,
        base: &Snapshot,
        target: &Snapshot,
        out: &mut Vec<FileChange>,
    ) -> Result<()> {
        let before = out.len();
        for change in store.diff(base, target)? {
            if let Some(allow) = &self.allow
                && !allow.contains(&change.path)
            {
                continue;
            }
            out.push(FileChange::from_tree_change(change, base, target));
        }
        debug!("{base} -> {target}: {} changed file(s)", out.len() - before);
        Ok(())
    }
}

/// `HEAD`'s commit, or the empty snapshot on an unborn branch.
pub fn head_snapshot(store: &dyn ObjectStore) -> Result<Snapshot> {
    Ok(match store.try_resolve("HEAD")? {
        Some(id) => Snapshot::Commit(id),
        None => Snapshot::Empty,
    })
}
