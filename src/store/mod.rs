//! Object and ref data provider.
//!
//! The policy engine never talks to a repository directly. Everything it
//! needs (file content, executable bits, commit parents, ref tips) comes
//! through the [`ObjectStore`] trait, which has a libgit2-backed
//! implementation for real repositories and an in-memory one for tests.

/// libgit2-backed store for an on-disk repository.
pub mod git;
/// In-memory store with explicit commits, index, and working tree.
pub mod memory;

pub use git::GitStore;
pub use memory::MemoryStore;

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// A content-addressed object identifier (hex SHA-1 or SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse a hex identifier. Accepts 40 (SHA-1) and 64 (SHA-256) digits.
    pub fn parse(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if !matches!(hex.len(), 40 | 64) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::NotFound(format!("invalid object id '{hex}'")));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// The all-zero sentinel used for "no object" in ref updates.
    pub fn is_null(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for reports.
    pub fn short(&self) -> &str {
        &self.0[..10]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fixed point in repository state that file content can be read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Snapshot {
    /// Nothing: the baseline of a root commit or an unborn branch.
    Empty,
    /// The staged (about-to-be-committed) state.
    Index,
    /// Files on disk at read time.
    WorkTree,
    /// A recorded commit's tree.
    Commit(ObjectId),
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Empty => f.write_str("(empty)"),
            Snapshot::Index => f.write_str("(index)"),
            Snapshot::WorkTree => f.write_str("(working tree)"),
            Snapshot::Commit(id) => f.write_str(id.short()),
        }
    }
}

/// Regular-file content at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: Vec<u8>,
    pub executable: bool,
}

/// How a path changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        }
    }
}

/// One changed regular file as reported by a store diff.
///
/// `old_executable` is `None` when the file did not exist (as a regular
/// file) in the baseline; `new_executable` is `None` when it no longer does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub kind: ChangeKind,
    /// Current path (or the removed path, for deletions).
    pub path: String,
    /// Baseline path when it differs from `path` (renames).
    pub old_path: Option<String>,
    pub old_executable: Option<bool>,
    pub new_executable: Option<bool>,
}

/// Read-only access to repository objects and refs.
///
/// All queries are synchronous. Lookups of unknown identifiers fail with
/// [`Error::NotFound`]; failures reading object data fail with
/// [`Error::Io`] or [`Error::Git`].
pub trait ObjectStore {
    /// Resolve a revision expression (`HEAD`, a branch, a hex id) to a commit.
    fn resolve(&self, rev: &str) -> Result<ObjectId>;

    /// Parent identifiers of a commit, first parent first.
    fn parents(&self, id: &ObjectId) -> Result<Vec<ObjectId>>;

    /// One-line summary of a commit message.
    fn summary(&self, id: &ObjectId) -> Result<String>;

    /// Full commit message.
    fn message(&self, id: &ObjectId) -> Result<String>;

    /// Commits currently pointed at by any ref.
    fn ref_tips(&self) -> Result<Vec<ObjectId>>;

    /// Commits reachable from `tips` and from none of `hidden`, each once.
    ///
    /// The default walks [`ObjectStore::parents`] from `hidden` first, then
    /// depth-first from each tip. Stores with a native history walk should
    /// override it so the cost follows the new commits, not the history.
    fn commits_excluding(&self, tips: &[ObjectId], hidden: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack = hidden.to_vec();
        while let Some(id) = stack.pop() {
            if seen.insert(id.clone()) {
                stack.extend(self.parents(&id)?);
            }
        }

        let mut found = Vec::new();
        for tip in tips {
            let mut stack = vec![tip.clone()];
            while let Some(id) = stack.pop() {
                if !seen.insert(id.clone()) {
                    continue;
                }
                stack.extend(self.parents(&id)?.into_iter().rev());
                found.push(id);
            }
        }
        Ok(found)
    }

    /// Every regular-file path at a snapshot, sorted.
    fn paths(&self, snapshot: &Snapshot) -> Result<Vec<String>>;

    /// Content of a regular file at a snapshot, or `None` if absent.
    fn read(&self, snapshot: &Snapshot, path: &str) -> Result<Option<Blob>>;

    /// Repository-private attribute rules, which outrank every in-tree file.
    fn info_attributes(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Resolve, mapping [`Error::NotFound`] to `None`.
    fn try_resolve(&self, rev: &str) -> Result<Option<ObjectId>> {
        match self.resolve(rev) {
            Ok(id) => Ok(Some(id)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Changed regular files between two snapshots, ordered by path.
    ///
    /// The default implementation compares full listings and pairs
    /// exact-content delete/add pairs as renames.
    fn diff(&self, from: &Snapshot, to: &Snapshot) -> Result<Vec<TreeChange>> {
        let old_paths: BTreeSet<String> = self.paths(from)?.into_iter().collect();
        let new_paths: BTreeSet<String> = self.paths(to)?.into_iter().collect();

        let mut changes = Vec::new();
        let mut added = Vec::new();
        let mut deleted = Vec::new();

        for path in old_paths.union(&new_paths) {
            let old = if old_paths.contains(path) {
                self.read(from, path)?
            } else {
                None
            };
            let new = if new_paths.contains(path) {
                self.read(to, path)?
            } else {
                None
            };
            match (old, new) {
                (Some(o), Some(n)) if o != n => changes.push(TreeChange {
                    kind: ChangeKind::Modified,
                    path: path.clone(),
                    old_path: None,
                    old_executable: Some(o.executable),
                    new_executable: Some(n.executable),
                }),
                (None, Some(n)) => added.push((path.clone(), n)),
                (Some(o), None) => deleted.push((path.clone(), o)),
                _ => {}
            }
        }

        for (path, blob) in added {
            if let Some(pos) = deleted.iter().position(|(_, old)| *old == blob) {
                let (old_path, _) = deleted.remove(pos);
                changes.push(TreeChange {
                    kind: ChangeKind::Renamed,
                    path,
                    old_path: Some(old_path),
                    old_executable: Some(blob.executable),
                    new_executable: Some(blob.executable),
                });
            } else {
                changes.push(TreeChange {
                    kind: ChangeKind::Added,
                    path,
                    old_path: None,
                    old_executable: None,
                    new_executable: Some(blob.executable),
                });
            }
        }
        for (path, blob) in deleted {
            changes.push(TreeChange {
                kind: ChangeKind::Deleted,
                path,
                old_path: None,
                old_executable: Some(blob.executable),
                new_executable: None,
            });
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }
}
