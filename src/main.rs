//! commitgate: git hook dispatcher.
//!
//! Install by symlinking (or calling from) the hook scripts:
//!
//!   .git/hooks/pre-commit          → commitgate pre-commit
//!   .git/hooks/prepare-commit-msg  → commitgate prepare-commit-msg "$@"
//!   .git/hooks/commit-msg          → commitgate commit-msg "$@"
//!   hooks/pre-receive (server)     → commitgate pre-receive
//!
//! Exit status: 0 pass, 1 policy failure, 2 anything else.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commitgate::ack::{AckState, EditorMode};
use commitgate::changes::ChangeSource;
use commitgate::config::Config;
use commitgate::gate::{Gate, Hook, Report};
use commitgate::store::{GitStore, ObjectStore};
use commitgate::{logging, Result};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Repository to operate on, discovered upwards from this path
    /// [default: the repository git runs the hook for]
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check staged changes (marker check excluded; see commit-msg)
    PreCommit {
        /// Only check these paths
        paths: Vec<String>,
    },
    /// Add the marker acknowledgment to the draft message when needed
    PrepareCommitMsg {
        file: PathBuf,
        /// Where the draft came from (message, template, merge, squash, commit)
        source: Option<String>,
        sha: Option<String>,
    },
    /// Reject a marker commit whose message does not acknowledge it
    CommitMsg { file: PathBuf },
    /// Check pushed commits; reads `<old> <new> <ref>` lines on stdin
    PreReceive,
    /// Audit changes outside a hook
    Check {
        /// Check the index instead of the working tree
        #[arg(long, conflicts_with = "commit")]
        staged: bool,
        /// Check a commit; repeat to check several as one change set
        #[arg(long, value_name = "REV")]
        commit: Vec<String>,
        /// Only check these paths
        paths: Vec<String>,
    },
}

fn main() {
    let args = Args::parse();
    let config = Config::load();
    logging::init(&config);

    match run(&args, &config) {
        Ok(report) => {
            logging::log_outcome(&config, &report);
            emit(&report, args.json);
            std::process::exit(report.exit_code());
        }
        Err(e) => {
            eprintln!("commitgate: {e}");
            std::process::exit(2);
        }
    }
}

fn run(args: &Args, config: &Config) -> Result<Report> {
    let store = match &args.repo {
        Some(path) => GitStore::discover(path)?,
        None => GitStore::open_from_env()?,
    };
    let gate = Gate::new(&store, config);

    match &args.command {
        Command::PreCommit { paths } => gate.pre_commit(paths),
        Command::PrepareCommitMsg { file, source, .. } => {
            let git_editor = std::env::var("GIT_EDITOR").ok();
            let editor = EditorMode::detect(source.as_deref(), git_editor.as_deref());
            gate.prepare_message_file(file, editor)
        }
        Command::CommitMsg { file } => gate.finalize_message_file(file),
        Command::PreReceive => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            gate.pre_receive(&input)
        }
        Command::Check {
            staged,
            commit,
            paths,
        } => {
            let source = check_source(&store, *staged, commit)?.restrict_to(paths.iter().cloned());
            gate.check(Hook::Check, &source)
        }
    }
}

fn check_source(store: &dyn ObjectStore, staged: bool, commits: &[String]) -> Result<ChangeSource> {
    Ok(match commits {
        [] if staged => ChangeSource::staged_index(),
        [] => ChangeSource::working_tree(),
        [rev] => ChangeSource::commit(store.resolve(rev)?),
        revs => ChangeSource::commit_range(
            revs.iter()
                .map(|rev| store.resolve(rev))
                .collect::<Result<_>>()?,
        ),
    })
}

fn emit(report: &Report, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("commitgate: {e}"),
        }
    } else if !report.passed() {
        eprint!("{report}");
    } else if report.ack == Some(AckState::Acknowledged) {
        eprintln!("commitgate: marker acknowledged; this commit will be rejected on push");
    }
}
