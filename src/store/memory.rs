use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::store::{Blob, ObjectId, ObjectStore, Snapshot};

/// A file tree: path → content.
pub type Tree = BTreeMap<String, Blob>;

#[derive(Debug, Clone)]
struct CommitRecord {
    parents: Vec<ObjectId>,
    message: String,
    tree: Tree,
}

/// An in-memory repository.
///
/// Commit identifiers are synthesized from a counter, so they are unique
/// within one store but carry no content hash. Refs, the index, and the
/// working tree are plain maps that tests mutate directly.
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: HashMap<ObjectId, CommitRecord>,
    refs: BTreeMap<String, ObjectId>,
    head: Option<String>,
    index: Tree,
    worktree: Tree,
    info_attributes: Option<String>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit without moving any ref.
    pub fn commit(&mut self, parents: &[ObjectId], message: &str, tree: Tree) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(format!("{:040x}", self.next_id));
        self.commits.insert(
            id.clone(),
            CommitRecord {
                parents: parents.to_vec(),
                message: message.to_string(),
                tree,
            },
        );
        id
    }

    /// Point a ref at a commit. The first ref set becomes `HEAD`.
    pub fn set_ref(&mut self, name: &str, id: &ObjectId) {
        self.refs.insert(name.to_string(), id.clone());
        if self.head.is_none() {
            self.head = Some(name.to_string());
        }
    }

    /// Make `HEAD` follow the named ref (which may not exist yet).
    pub fn set_head(&mut self, name: &str) {
        self.head = Some(name.to_string());
    }

    pub fn set_index(&mut self, tree: Tree) {
        self.index = tree;
    }

    pub fn set_worktree(&mut self, tree: Tree) {
        self.worktree = tree;
    }

    pub fn set_info_attributes(&mut self, rules: &str) {
        self.info_attributes = Some(rules.to_string());
    }

    /// The recorded tree of a commit.
    pub fn tree(&self, id: &ObjectId) -> Result<&Tree> {
        Ok(&self.record(id)?.tree)
    }

    fn record(&self, id: &ObjectId) -> Result<&CommitRecord> {
        self.commits
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("commit {id}")))
    }

    fn snapshot_tree(&self, snapshot: &Snapshot) -> Result<Option<&Tree>> {
        Ok(match snapshot {
            Snapshot::Empty => None,
            Snapshot::Index => Some(&self.index),
            Snapshot::WorkTree => Some(&self.worktree),
            Snapshot::Commit(id) => Some(&self.record(id)?.tree),
        })
    }
}

/// Build a tree from `(path, content)` pairs; no file is executable.
pub fn tree<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Tree {
    files
        .into_iter()
        .map(|(path, content)| {
            (
                path.to_string(),
                Blob {
                    content: content.as_bytes().to_vec(),
                    executable: false,
                },
            )
        })
        .collect()
}

impl ObjectStore for MemoryStore {
    fn resolve(&self, rev: &str) -> Result<ObjectId> {
        let name = if rev == "HEAD" {
            self.head.as_deref().unwrap_or("HEAD")
        } else {
            rev
        };
        for candidate in [
            name.to_string(),
            format!("refs/heads/{name}"),
            format!("refs/tags/{name}"),
        ] {
            if let Some(id) = self.refs.get(&candidate) {
                return Ok(id.clone());
            }
        }
        if let Ok(id) = ObjectId::parse(rev)
            && self.commits.contains_key(&id)
        {
            return Ok(id);
        }
        Err(Error::NotFound(format!("revision '{rev}'")))
    }

    fn parents(&self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        Ok(self.record(id)?.parents.clone())
    }

    fn summary(&self, id: &ObjectId) -> Result<String> {
        Ok(self
            .record(id)?
            .message
            .lines()
            .next()
            .unwrap_or("")
            .to_string())
    }

    fn message(&self, id: &ObjectId) -> Result<String> {
        Ok(self.record(id)?.message.clone())
    }

    fn ref_tips(&self) -> Result<Vec<ObjectId>> {
        Ok(self.refs.values().cloned().collect())
    }

    fn paths(&self, snapshot: &Snapshot) -> Result<Vec<String>> {
        Ok(self
            .snapshot_tree(snapshot)?
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read(&self, snapshot: &Snapshot, path: &str) -> Result<Option<Blob>> {
        Ok(self
            .snapshot_tree(snapshot)?
            .and_then(|t| t.get(path))
            .cloned())
    }

    fn info_attributes(&self) -> Result<Option<String>> {
        Ok(self.info_attributes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChangeKind;

    #[test]
    fn head_follows_first_ref() {
        let mut store = MemoryStore::new();
        let c = store.commit(&[], "root", tree([("a", "1\n")]));
        store.set_ref("refs/heads/main", &c);
        assert_eq!(store.resolve("HEAD").unwrap(), c);
        assert_eq!(store.resolve("main").unwrap(), c);
        assert_eq!(store.resolve(c.as_str()).unwrap(), c);
    }

    #[test]
    fn unborn_head_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.resolve("HEAD"), Err(Error::NotFound(_))));
        assert_eq!(store.try_resolve("HEAD").unwrap(), None);
    }

    #[test]
    fn unknown_commit_is_not_found() {
        let store = MemoryStore::new();
        let id = ObjectId::parse(&"f".repeat(40)).unwrap();
        assert!(matches!(store.parents(&id), Err(Error::NotFound(_))));
    }

    #[test]
    fn generic_diff_classifies_changes() {
        let mut store = MemoryStore::new();
        let base = store.commit(
            &[],
            "base",
            tree([("keep", "same\n"), ("edit", "old\n"), ("gone", "bye\n"), ("move", "moved body\n")]),
        );
        let next = store.commit(
            &[base.clone()],
            "next",
            tree([("keep", "same\n"), ("edit", "new\n"), ("fresh", "hi\n"), ("moved", "moved body\n")]),
        );
        let changes = store
            .diff(&Snapshot::Commit(base), &Snapshot::Commit(next))
            .unwrap();
        let summary: Vec<(&str, ChangeKind)> =
            changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("edit", ChangeKind::Modified),
                ("fresh", ChangeKind::Added),
                ("gone", ChangeKind::Deleted),
                ("moved", ChangeKind::Renamed),
            ]
        );
        assert_eq!(changes[3].old_path.as_deref(), Some("move"));
    }

    #[test]
    fn mode_only_change_is_modified() {
        let mut store = MemoryStore::new();
        let mut t = tree([("run.sh", "echo\n")]);
        let base = store.commit(&[], "base", t.clone());
        t.get_mut("run.sh").unwrap().executable = true;
        store.set_index(t);
        let changes = store.diff(&Snapshot::Commit(base), &Snapshot::Index).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].new_executable, Some(true));
    }
}
