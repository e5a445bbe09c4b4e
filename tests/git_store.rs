use std::fs;
use std::path::Path;

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

use commitgate::ack::{AckState, EditorMode, RejectReason};
use commitgate::changes::{ChangeKind, ChangeSource};
use commitgate::checks::marker::MARKER;
use commitgate::checks::CheckKind;
use commitgate::config::Config;
use commitgate::gate::{Gate, Verdict};
use commitgate::store::{GitStore, ObjectId, ObjectStore, Snapshot};

const ATTRS: &str = "* check-trailing-ws check-atatat check-no-exec\n";

/// A scratch repository in a temporary directory.
struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    #[cfg(unix)]
    fn make_executable(&self, path: &str) {
        use std::os::unix::fs::PermissionsExt;
        let full = self.path().join(path);
        fs::set_permissions(full, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn stage(&self, paths: &[&str]) {
        let mut index = self.repo.index().unwrap();
        for path in paths {
            if self.path().join(path).symlink_metadata().is_ok() {
                index.add_path(Path::new(path)).unwrap();
            } else {
                index.remove_path(Path::new(path)).unwrap();
            }
        }
        index.write().unwrap();
    }

    /// Commit the index on top of `parent`, moving `update_ref` if given.
    fn commit(&self, parent: Option<Oid>, update_ref: Option<&str>, message: &str) -> Oid {
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let mut index = self.repo.index().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parent = parent.map(|id| self.repo.find_commit(id).unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(update_ref, &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// Base commit on `HEAD` with the attribute file and `files`.
    fn base(&self, files: &[(&str, &str)]) -> Oid {
        self.write(".gitattributes", ATTRS);
        let mut paths = vec![".gitattributes"];
        for (path, content) in files {
            self.write(path, content);
            paths.push(*path);
        }
        self.stage(&paths);
        self.commit(None, Some("HEAD"), "base")
    }

    fn store(&self) -> GitStore {
        GitStore::discover(self.path()).unwrap()
    }
}

fn id(oid: Oid) -> ObjectId {
    ObjectId::parse(&oid.to_string()).unwrap()
}

// ── Store queries ──

#[test]
fn resolve_and_describe_commits() {
    let fx = Fixture::new();
    let base = fx.base(&[("a.txt", "one\n")]);
    fx.write("a.txt", "two\n");
    fx.stage(&["a.txt"]);
    let next = fx.commit(Some(base), Some("HEAD"), "Second commit\n\nWith a body.\n");

    let store = fx.store();
    assert_eq!(store.resolve("HEAD").unwrap(), id(next));
    assert_eq!(store.resolve("HEAD~1").unwrap(), id(base));
    assert_eq!(store.parents(&id(next)).unwrap(), vec![id(base)]);
    assert_eq!(store.summary(&id(next)).unwrap(), "Second commit");
    assert!(store.message(&id(next)).unwrap().contains("With a body."));
    assert_eq!(store.ref_tips().unwrap(), vec![id(next)]);
    assert!(matches!(
        store.resolve("no-such-branch"),
        Err(commitgate::Error::NotFound(_))
    ));
}

#[test]
fn paths_and_reads() {
    let fx = Fixture::new();
    let base = fx.base(&[("src/lib.rs", "fn f() {}\n"), ("b.txt", "b\n")]);
    let store = fx.store();
    let snapshot = Snapshot::Commit(id(base));
    assert_eq!(
        store.paths(&snapshot).unwrap(),
        vec![".gitattributes", "b.txt", "src/lib.rs"]
    );
    let blob = store.read(&snapshot, "src/lib.rs").unwrap().unwrap();
    assert_eq!(blob.content, b"fn f() {}\n");
    assert!(!blob.executable);
    assert!(store.read(&snapshot, "missing.txt").unwrap().is_none());
    assert!(store.read(&Snapshot::Empty, "b.txt").unwrap().is_none());
}

#[test]
fn index_and_worktree_diffs() {
    let fx = Fixture::new();
    fx.base(&[("a.txt", "one\n"), ("b.txt", "b\n")]);
    fx.write("a.txt", "one\ntwo\n");
    fx.stage(&["a.txt"]);
    fx.write("b.txt", "b\nunstaged\n");

    let store = fx.store();
    let head = Snapshot::Commit(store.resolve("HEAD").unwrap());

    let staged = store.diff(&head, &Snapshot::Index).unwrap();
    let staged: Vec<(&str, ChangeKind)> = staged.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(staged, vec![("a.txt", ChangeKind::Modified)]);

    let worktree = store.diff(&head, &Snapshot::WorkTree).unwrap();
    let worktree: Vec<&str> = worktree.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(worktree, vec!["a.txt", "b.txt"]);
}

#[test]
fn rename_without_edits_is_clean() {
    let fx = Fixture::new();
    let base = fx.base(&[("old/name.txt", "dirty \nline\nmore\nlines\n")]);
    fs::rename(fx.path().join("old"), fx.path().join("new")).unwrap();
    fx.stage(&["old/name.txt", "new/name.txt"]);
    let next = fx.commit(Some(base), Some("HEAD"), "move");

    let store = fx.store();
    let changes = ChangeSource::commit(id(next)).list_changes(&store).unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Renamed);
    assert_eq!(changes[0].path, "new/name.txt");
    assert!(commitgate::evaluate(&store, &ChangeSource::commit(id(next))).unwrap().is_empty());
}

// ── Hooks ──

#[test]
fn pre_commit_reports_staged_lines_only() {
    let fx = Fixture::new();
    fx.base(&[("a.txt", "old \n")]);
    fx.write("a.txt", "old \nnew \n");
    fx.stage(&["a.txt"]);
    fx.write("a.txt", "old \nnew \nunstaged \n");

    let store = fx.store();
    let config = Config::default_config();
    let report = Gate::new(&store, &config).pre_commit(&[]).unwrap();
    assert_eq!(report.verdict, Verdict::Fail);
    let lines: Vec<Option<u32>> = report.violations.iter().map(|v| v.line).collect();
    assert_eq!(lines, vec![Some(2)]);
}

#[test]
fn first_commit_checks_every_line() {
    let fx = Fixture::new();
    fx.write(".gitattributes", ATTRS);
    fx.write("a.txt", "x \ny\nz \n");
    fx.stage(&[".gitattributes", "a.txt"]);

    let store = fx.store();
    let config = Config::default_config();
    let report = Gate::new(&store, &config).pre_commit(&[]).unwrap();
    let lines: Vec<Option<u32>> = report.violations.iter().map(|v| v.line).collect();
    assert_eq!(lines, vec![Some(1), Some(3)]);
}

#[cfg(unix)]
#[test]
fn executable_file_is_rejected() {
    let fx = Fixture::new();
    fx.base(&[]);
    fx.write("run.sh", "echo hi\n");
    fx.make_executable("run.sh");
    fx.stage(&["run.sh"]);

    let store = fx.store();
    let config = Config::default_config();
    let report = Gate::new(&store, &config).pre_commit(&[]).unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].check, CheckKind::NoExecutable);
    assert_eq!(report.violations[0].line, None);
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_checked() {
    let fx = Fixture::new();
    fx.base(&[]);
    std::os::unix::fs::symlink("target with space ", fx.path().join("link")).unwrap();
    fx.stage(&["link"]);

    let store = fx.store();
    let config = Config::default_config();
    assert!(Gate::new(&store, &config).pre_commit(&[]).unwrap().passed());
}

#[test]
fn info_attributes_disable_checks() {
    let fx = Fixture::new();
    fx.base(&[]);
    fs::create_dir_all(fx.path().join(".git/info")).unwrap();
    fs::write(fx.path().join(".git/info/attributes"), "*.log -check-trailing-ws\n").unwrap();
    fx.write("build.log", "noisy \n");
    fx.stage(&["build.log"]);

    let store = fx.store();
    let config = Config::default_config();
    assert!(Gate::new(&store, &config).pre_commit(&[]).unwrap().passed());
}

#[test]
fn commit_msg_round_trip_on_disk() {
    let fx = Fixture::new();
    fx.base(&[("notes.txt", "plan\n")]);
    fx.write("notes.txt", &format!("plan\n{MARKER} secret\n"));
    fx.stage(&["notes.txt"]);

    let store = fx.store();
    let config = Config::default_config();
    let gate = Gate::new(&store, &config);
    let msg = fx.path().join(".git/COMMIT_EDITMSG");

    fs::write(&msg, "Add secret\n").unwrap();
    let report = gate.finalize_message_file(&msg).unwrap();
    assert_eq!(report.ack, Some(AckState::Rejected(RejectReason::NotAcknowledged)));

    gate.prepare_message_file(&msg, EditorMode::Interactive).unwrap();
    assert!(fs::read_to_string(&msg).unwrap().starts_with(MARKER));
    assert!(gate.finalize_message_file(&msg).unwrap().passed());
}

#[test]
fn push_stops_at_first_offending_commit() {
    let fx = Fixture::new();
    let base = fx.base(&[("log.txt", "start\n")]);

    let mut parent = base;
    let mut pushed = Vec::new();
    for n in 1..=5 {
        let path = format!("f{n}.txt");
        fx.write(&path, if n == 3 { "bad \n" } else { "good\n" });
        fx.stage(&[path.as_str()]);
        parent = fx.commit(Some(parent), None, &format!("commit {n}"));
        pushed.push(parent);
    }

    let store = fx.store();
    let config = Config::default_config();
    let input = format!("{} {} refs/heads/main\n", base, pushed[4]);
    let report = Gate::new(&store, &config).pre_receive(&input).unwrap();

    assert_eq!(report.verdict, Verdict::Fail);
    let commit = report.commit.expect("offending commit");
    assert_eq!(commit.id, id(pushed[2]));
    assert_eq!(commit.summary, "commit 3");
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].path, "f3.txt");
}

#[test]
fn pushed_marker_is_rejected_despite_message() {
    let fx = Fixture::new();
    let base = fx.base(&[("notes.txt", "plan\n")]);
    fx.write("notes.txt", &format!("plan\n{MARKER}\n"));
    fx.stage(&["notes.txt"]);
    let local = fx.commit(Some(base), None, &format!("{MARKER} keep local"));

    let store = fx.store();
    let config = Config::default_config();
    let input = format!("{base} {local} refs/heads/main\n");
    let report = Gate::new(&store, &config).pre_receive(&input).unwrap();
    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.ack, Some(AckState::Rejected(RejectReason::ServerBoundary)));
    let footer = report.footer.as_deref().unwrap();
    assert!(footer.contains("never accepted"), "{footer}");
}

#[test]
fn unmerged_index_is_an_error() {
    let fx = Fixture::new();
    let base = fx.base(&[("a.txt", "one\n")]);
    fx.write("a.txt", "ours\n");
    fx.stage(&["a.txt"]);
    fx.commit(Some(base), Some("HEAD"), "ours");
    fx.write("a.txt", "theirs\n");
    fx.stage(&["a.txt"]);
    let theirs = fx.commit(Some(base), None, "theirs");

    fx.repo
        .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();
    let annotated = fx.repo.find_annotated_commit(theirs).unwrap();
    fx.repo.merge(&[&annotated], None, None).unwrap();
    let mut index = fx.repo.index().unwrap();
    assert!(index.has_conflicts());
    index.write().unwrap();

    let store = fx.store();
    let config = Config::default_config();
    match Gate::new(&store, &config).pre_commit(&[]) {
        Err(commitgate::Error::Unmerged(path)) => assert_eq!(path, "a.txt"),
        other => panic!("expected an unmerged error, got {other:?}"),
    }
}

#[test]
fn history_walk_hides_existing_refs() {
    let fx = Fixture::new();
    let mut tip = fx.base(&[("log.txt", "start\n")]);
    for n in 1..=3 {
        fx.write("log.txt", &format!("old {n}\n"));
        fx.stage(&["log.txt"]);
        tip = fx.commit(Some(tip), Some("HEAD"), &format!("old {n}"));
    }
    let old_tip = tip;
    let mut pushed = Vec::new();
    for n in 1..=2 {
        fx.write("log.txt", &format!("new {n}\n"));
        fx.stage(&["log.txt"]);
        tip = fx.commit(Some(tip), None, &format!("new {n}"));
        pushed.push(id(tip));
    }

    let store = fx.store();
    let hidden = store.ref_tips().unwrap();
    assert_eq!(hidden, vec![id(old_tip)]);
    let found = store.commits_excluding(&[id(tip)], &hidden).unwrap();
    assert_eq!(found, pushed);
}
