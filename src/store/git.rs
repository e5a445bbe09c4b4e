use std::fs;
use std::path::{Path, PathBuf};

use git2::{
    Delta, DiffFindOptions, DiffOptions, FileMode, ObjectType, Oid, Repository, Sort, Tree,
    TreeWalkMode, TreeWalkResult,
};

use crate::error::{Error, Result};
use crate::store::{Blob, ChangeKind, ObjectId, ObjectStore, Snapshot, TreeChange};

/// Store backed by an on-disk repository through libgit2.
pub struct GitStore {
    repo: Repository,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("git_dir", &self.repo.path())
            .finish()
    }
}

impl GitStore {
    /// Open the repository containing `path` (searching upward).
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .map_err(|e| Error::NotFound(format!("repository at {}: {}", path.display(), e.message())))?;
        Ok(Self { repo })
    }

    /// Open the repository git runs the current hook for.
    ///
    /// Honours the variables git exports to hooks, including `GIT_INDEX_FILE`
    /// for `git commit -a` and the object directory overrides through which a
    /// pre-receive hook sees quarantined pushed objects. Without `GIT_DIR` the
    /// repository is discovered from the current directory.
    pub fn open_from_env() -> Result<Self> {
        let repo = Repository::open_from_env()
            .map_err(|e| Error::NotFound(format!("repository from environment: {}", e.message())))?;
        Ok(Self { repo })
    }

    pub fn from_repository(repo: Repository) -> Self {
        Self { repo }
    }

    fn oid(id: &ObjectId) -> Result<Oid> {
        Oid::from_str(id.as_str()).map_err(|_| Error::NotFound(format!("object {id}")))
    }

    fn object_id(oid: Oid) -> Result<ObjectId> {
        ObjectId::parse(&oid.to_string())
    }

    fn find_commit(&self, id: &ObjectId) -> Result<git2::Commit<'_>> {
        self.repo
            .find_commit(Self::oid(id)?)
            .map_err(|_| Error::NotFound(format!("commit {id}")))
    }

    /// Tree of a committed snapshot; `None` for the empty baseline.
    fn commit_tree(&self, snapshot: &Snapshot) -> Result<Option<Tree<'_>>> {
        match snapshot {
            Snapshot::Empty => Ok(None),
            Snapshot::Commit(id) => Ok(Some(self.find_commit(id)?.tree()?)),
            other => Err(Error::Git(format!("{other} has no recorded tree"))),
        }
    }

    fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| Error::Git("bare repository has no working tree".into()))
    }

    fn blob_at(&self, oid: Oid, mode: u32) -> Result<Option<Blob>> {
        let blob = self.repo.find_blob(oid)?;
        Ok(Some(Blob {
            content: blob.content().to_vec(),
            executable: mode == u32::from(FileMode::BlobExecutable),
        }))
    }

    fn read_worktree(&self, path: &str) -> Result<Option<Blob>> {
        let full: PathBuf = self.workdir()?.join(path);
        let meta = match fs::symlink_metadata(&full) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Ok(None);
        }
        let content = fs::read(&full)?;
        Ok(Some(Blob {
            content,
            executable: is_executable(&meta),
        }))
    }
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

fn is_regular(mode: FileMode) -> bool {
    matches!(
        mode,
        FileMode::Blob | FileMode::BlobGroupWritable | FileMode::BlobExecutable
    )
}

fn side(file: &git2::DiffFile<'_>) -> Option<bool> {
    is_regular(file.mode()).then(|| matches!(file.mode(), FileMode::BlobExecutable))
}

fn delta_path(file: &git2::DiffFile<'_>) -> Option<String> {
    file.path().map(|p| p.to_string_lossy().replace('\\', "/"))
}

impl ObjectStore for GitStore {
    fn resolve(&self, rev: &str) -> Result<ObjectId> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|_| Error::NotFound(format!("revision '{rev}'")))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::NotFound(format!("revision '{rev}' is not a commit")))?;
        Self::object_id(commit.id())
    }

    fn parents(&self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        self.find_commit(id)?
            .parent_ids()
            .map(Self::object_id)
            .collect()
    }

    fn summary(&self, id: &ObjectId) -> Result<String> {
        Ok(self.find_commit(id)?.summary().unwrap_or("").to_string())
    }

    fn message(&self, id: &ObjectId) -> Result<String> {
        Ok(self.find_commit(id)?.message().unwrap_or("").to_string())
    }

    fn ref_tips(&self) -> Result<Vec<ObjectId>> {
        let mut tips = Vec::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            // Symbolic refs and refs to non-commits (e.g. tagged blobs) are skipped.
            if let Ok(commit) = reference.peel_to_commit() {
                let id = Self::object_id(commit.id())?;
                if !tips.contains(&id) {
                    tips.push(id);
                }
            }
        }
        Ok(tips)
    }

    fn commits_excluding(&self, tips: &[ObjectId], hidden: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        for tip in tips {
            walk.push(Self::oid(tip)?)
                .map_err(|_| Error::NotFound(format!("commit {tip}")))?;
        }
        for id in hidden {
            walk.hide(Self::oid(id)?)?;
        }
        walk.map(|oid| Self::object_id(oid?)).collect()
    }

    fn paths(&self, snapshot: &Snapshot) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        match snapshot {
            Snapshot::Empty => {}
            Snapshot::Commit(_) => {
                if let Some(tree) = self.commit_tree(snapshot)? {
                    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                        if entry.kind() == Some(ObjectType::Blob)
                            && is_regular_mode(entry.filemode() as u32)
                            && let Some(name) = entry.name()
                        {
                            paths.push(format!("{root}{name}"));
                        }
                        TreeWalkResult::Ok
                    })?;
                }
            }
            Snapshot::Index | Snapshot::WorkTree => {
                // The working tree is enumerated through the index: untracked
                // files are never part of a change set.
                let index = self.repo.index()?;
                for entry in index.iter() {
                    if is_regular_mode(entry.mode) {
                        paths.push(String::from_utf8_lossy(&entry.path).into_owned());
                    }
                }
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn read(&self, snapshot: &Snapshot, path: &str) -> Result<Option<Blob>> {
        match snapshot {
            Snapshot::Empty => Ok(None),
            Snapshot::WorkTree => self.read_worktree(path),
            Snapshot::Index => {
                let index = self.repo.index()?;
                match index.get_path(Path::new(path), 0) {
                    Some(entry) if is_regular_mode(entry.mode) => self.blob_at(entry.id, entry.mode),
                    _ => Ok(None),
                }
            }
            Snapshot::Commit(_) => {
                let Some(tree) = self.commit_tree(snapshot)? else {
                    return Ok(None);
                };
                let entry = match tree.get_path(Path::new(path)) {
                    Ok(entry) => entry,
                    Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let mode = entry.filemode() as u32;
                if !is_regular_mode(mode) {
                    return Ok(None);
                }
                self.blob_at(entry.id(), mode)
            }
        }
    }

    fn info_attributes(&self) -> Result<Option<String>> {
        let path = self.repo.path().join("info").join("attributes");
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn diff(&self, from: &Snapshot, to: &Snapshot) -> Result<Vec<TreeChange>> {
        let mut opts = DiffOptions::new();
        opts.include_untracked(false);
        let old_tree = self.commit_tree(from)?;

        let mut diff = match to {
            Snapshot::Empty | Snapshot::Commit(_) => {
                let new_tree = self.commit_tree(to)?;
                self.repo
                    .diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), Some(&mut opts))?
            }
            Snapshot::Index => {
                let index = self.repo.index()?;
                self.repo
                    .diff_tree_to_index(old_tree.as_ref(), Some(&index), Some(&mut opts))?
            }
            Snapshot::WorkTree => self
                .repo
                .diff_tree_to_workdir_with_index(old_tree.as_ref(), Some(&mut opts))?,
        };
        diff.find_similar(Some(DiffFindOptions::new().renames(true)))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old = delta.old_file();
            let new = delta.new_file();
            let (old_exec, new_exec) = (side(&old), side(&new));

            let kind = match delta.status() {
                Delta::Conflicted => {
                    let path = delta_path(&new).or_else(|| delta_path(&old)).unwrap_or_default();
                    return Err(Error::Unmerged(path));
                }
                Delta::Added | Delta::Copied => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed,
                Delta::Modified | Delta::Typechange => ChangeKind::Modified,
                _ => continue,
            };

            // A side that is a symlink or submodule counts as absent.
            let (kind, old_exec) = match (kind, old_exec, new_exec) {
                (_, None, None) => continue,
                (ChangeKind::Modified, None, Some(_)) => (ChangeKind::Added, None),
                (ChangeKind::Modified | ChangeKind::Renamed, Some(_), None) => {
                    (ChangeKind::Deleted, old_exec)
                }
                (ChangeKind::Added, _, _) => (ChangeKind::Added, None),
                (k, o, _) => (k, o),
            };

            let path = if kind == ChangeKind::Deleted {
                delta_path(&old)
            } else {
                delta_path(&new)
            };
            let Some(path) = path else { continue };
            let old_path = match kind {
                ChangeKind::Renamed => delta_path(&old),
                _ => None,
            };

            changes.push(TreeChange {
                kind,
                path,
                old_path,
                old_executable: old_exec,
                new_executable: if kind == ChangeKind::Deleted { None } else { new_exec },
            });
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }
}

fn is_regular_mode(mode: u32) -> bool {
    mode == u32::from(FileMode::Blob)
        || mode == u32::from(FileMode::BlobGroupWritable)
        || mode == u32::from(FileMode::BlobExecutable)
}
