//! Which commits a push introduces, and in what order to check them.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, warn};
use serde::Serialize;

use crate::changes::ChangeSource;
use crate::error::{Error, Result};
use crate::store::{ObjectId, ObjectStore};

/// One `<old> <new> <ref>` record from the push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefUpdate {
    pub old: ObjectId,
    pub new: ObjectId,
    pub name: String,
}

impl RefUpdate {
    /// Parse one record. `line` is 1-based and only used for errors.
    pub fn parse_line(text: &str, line: usize) -> Result<Self> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let &[old, new, name] = fields.as_slice() else {
            return Err(Error::MalformedInput {
                line,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        };
        let id = |hex: &str| {
            ObjectId::parse(hex).map_err(|_| Error::MalformedInput {
                line,
                reason: format!("not an object id: {hex:?}"),
            })
        };
        Ok(Self {
            old: id(old)?,
            new: id(new)?,
            name: name.to_string(),
        })
    }

    pub fn is_deletion(&self) -> bool {
        self.new.is_null()
    }

    pub fn is_creation(&self) -> bool {
        self.old.is_null()
    }
}

/// Parse the whole ref-update stream. Blank lines are skipped.
pub fn parse_updates(input: &str) -> Result<Vec<RefUpdate>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| RefUpdate::parse_line(text, i + 1))
        .collect()
}

/// A commit introduced by a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitNode {
    pub id: ObjectId,
    pub parents: Vec<ObjectId>,
    pub summary: String,
}

impl CommitNode {
    /// The commit's own changes, against its first parent.
    pub fn change_source(&self) -> ChangeSource {
        ChangeSource::commit(self.id.clone())
    }
}

pub struct CommitGraphResolver<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> CommitGraphResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Commits reachable from any update's new tip and from no current ref
    /// tip, de-duplicated, in the order the store walks them.
    ///
    /// Non-fast-forward updates are treated like any other: whatever the new
    /// tip brings that no ref already has gets checked.
    pub fn new_commits(&self, updates: &[RefUpdate]) -> Result<Vec<CommitNode>> {
        let tips: Vec<ObjectId> = updates
            .iter()
            .filter(|u| !u.is_deletion() && u.old != u.new)
            .map(|u| u.new.clone())
            .collect();
        if tips.is_empty() {
            return Ok(Vec::new());
        }

        let hidden = self.store.ref_tips()?;
        let ids = self.store.commits_excluding(&tips, &hidden)?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            found.push(CommitNode {
                parents: self.store.parents(&id)?,
                summary: self.store.summary(&id)?,
                id,
            });
        }
        debug!("{} moved ref(s), {} new commit(s)", tips.len(), found.len());
        Ok(found)
    }
}

/// Order `commits` so each comes after its parents in the set. Ties keep
/// input order.
pub fn topo_sort(commits: Vec<CommitNode>) -> Vec<CommitNode> {
    let index: HashMap<&ObjectId, usize> =
        commits.iter().enumerate().map(|(i, c)| (&c.id, i)).collect();

    let mut pending = vec![0usize; commits.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); commits.len()];
    for (i, commit) in commits.iter().enumerate() {
        let in_set: BTreeSet<usize> = commit
            .parents
            .iter()
            .filter_map(|p| index.get(p).copied())
            .collect();
        pending[i] = in_set.len();
        for p in in_set {
            children[p].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..commits.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(commits.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &child in &children[i] {
            pending[child] -= 1;
            if pending[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() < commits.len() {
        warn!("commit graph has a cycle; appending {} commit(s) unordered", commits.len() - order.len());
        let placed: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..commits.len()).filter(|i| !placed.contains(i)));
    }

    let mut slots: Vec<Option<CommitNode>> = commits.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
