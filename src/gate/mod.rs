//! Entry points: one method per hook, each producing a [`Report`].

mod report;

pub use report::{CommitRef, Hook, Report, Verdict};

use std::path::Path;

use log::{debug, info};

use crate::ack::{AckState, Boundary, EditorMode};
use crate::changes::ChangeSource;
use crate::checks::{CheckEngine, CheckKind, CheckSet, Violation};
use crate::config::{Config, EngineConfig, PushMode};
use crate::error::Result;
use crate::graph::{parse_updates, topo_sort, CommitGraphResolver};
use crate::store::ObjectStore;

pub struct Gate<'a> {
    store: &'a dyn ObjectStore,
    config: &'a Config,
    engine: EngineConfig,
}

impl<'a> Gate<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a Config) -> Self {
        Self {
            store,
            config,
            engine: config.engine_config(),
        }
    }

    /// Swap in an explicit engine configuration.
    pub fn with_engine_config(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    fn checks_for(&self, hook: Hook) -> CheckSet {
        let hooks = &self.config.hooks;
        match hook {
            Hook::PreCommit => hooks.pre_commit_checks(),
            Hook::PreReceive => hooks.pre_receive_checks(),
            Hook::Check => hooks.check_checks(),
            Hook::PrepareCommitMsg | Hook::CommitMsg => [CheckKind::ForbiddenMarker].into(),
        }
    }

    /// Evaluate one change set with `hook`'s configured checks.
    pub fn check(&self, hook: Hook, source: &ChangeSource) -> Result<Report> {
        let engine = CheckEngine::new(self.store, &self.engine);
        let violations = engine.evaluate_only(source, &self.checks_for(hook))?;
        let report = Report::from_violations(hook, violations);
        info!("{hook}: {} ({} violation(s))", report.verdict.as_str(), report.violations.len());
        Ok(report)
    }

    /// Staged changes, optionally restricted to `paths`.
    pub fn pre_commit(&self, paths: &[String]) -> Result<Report> {
        let source = ChangeSource::staged_index().restrict_to(paths.iter().cloned());
        self.check(Hook::PreCommit, &source)
    }

    /// Marker violations in the staged content and the state they start in.
    fn staged_marker_state(&self) -> Result<(Vec<Violation>, AckState)> {
        let engine = CheckEngine::new(self.store, &self.engine);
        let violations = engine.evaluate_only(
            &ChangeSource::staged_index(),
            &self.checks_for(Hook::CommitMsg),
        )?;
        let state = AckState::from_violations(&violations);
        Ok((violations, state))
    }

    /// A rejection lists the marker locations; anything else passes.
    fn ack_report(&self, hook: Hook, violations: Vec<Violation>, state: AckState) -> Report {
        let report = match state {
            AckState::Rejected(reason) => Report::from_violations(hook, violations)
                .with_ack(state)
                .fail_with(&reason.explain(&self.engine.marker)),
            _ => Report::pass(hook).with_ack(state),
        };
        info!("{hook}: {} ({state})", report.verdict.as_str());
        report
    }

    /// Draft stage of the acknowledgment protocol. `draft` is rewritten in
    /// place when the author needs to acknowledge the marker.
    pub fn prepare_message(&self, draft: &mut String, editor: EditorMode) -> Result<Report> {
        let (violations, state) = self.staged_marker_state()?;
        let state = state.prepare(draft, &violations, editor, &self.engine);
        Ok(self.ack_report(Hook::PrepareCommitMsg, violations, state))
    }

    /// [`Gate::prepare_message`] on a message file. The file is overwritten
    /// once, and only if the draft changed.
    pub fn prepare_message_file(&self, path: &Path, editor: EditorMode) -> Result<Report> {
        let original = std::fs::read_to_string(path)?;
        let mut draft = original.clone();
        let report = self.prepare_message(&mut draft, editor)?;
        if draft != original {
            std::fs::write(path, &draft)?;
            debug!("rewrote {}", path.display());
        }
        Ok(report)
    }

    /// Final stage of the acknowledgment protocol.
    pub fn finalize_message(&self, message: &str) -> Result<Report> {
        let (violations, state) = self.staged_marker_state()?;
        let state = state.finalize(message, Boundary::Local, &self.engine);
        Ok(self.ack_report(Hook::CommitMsg, violations, state))
    }

    pub fn finalize_message_file(&self, path: &Path) -> Result<Report> {
        let message = std::fs::read_to_string(path)?;
        self.finalize_message(&message)
    }

    /// Check every commit the pushed ref updates introduce.
    ///
    /// Commit messages play no part: a marker acknowledged locally is still
    /// a violation here.
    pub fn pre_receive(&self, input: &str) -> Result<Report> {
        let updates = parse_updates(input)?;
        let commits = topo_sort(CommitGraphResolver::new(self.store).new_commits(&updates)?);
        info!("pre-receive: {} update(s), {} new commit(s)", updates.len(), commits.len());

        let engine = CheckEngine::new(self.store, &self.engine);
        let kinds = self.checks_for(Hook::PreReceive);

        match self.config.settings.push_mode {
            PushMode::PerCommit => {
                for node in &commits {
                    let violations = engine.evaluate_only(&node.change_source(), &kinds)?;
                    if violations.is_empty() {
                        debug!("{} {:?}: clean", node.id.short(), node.summary);
                        continue;
                    }
                    let message = self.store.message(&node.id)?;
                    let state = AckState::from_violations(&violations).finalize(
                        &message,
                        Boundary::Server,
                        &self.engine,
                    );
                    info!("pre-receive: rejected at {} ({state})", node.id.short());
                    let report = Report::from_violations(Hook::PreReceive, violations)
                        .with_commit(CommitRef {
                            id: node.id.clone(),
                            summary: node.summary.clone(),
                        });
                    return Ok(match state {
                        AckState::Clean => report,
                        AckState::Rejected(reason) => report
                            .with_ack(state)
                            .fail_with(&reason.explain(&self.engine.marker)),
                        _ => report.with_ack(state),
                    });
                }
                info!("pre-receive: pass");
                Ok(Report::pass(Hook::PreReceive))
            }
            PushMode::Aggregate => {
                let ids = commits.into_iter().map(|node| node.id).collect();
                let source = ChangeSource::commit_range(ids);
                let violations = engine.evaluate_only(&source, &kinds)?;
                let report = Report::from_violations(Hook::PreReceive, violations);
                info!(
                    "pre-receive: {} ({} violation(s), aggregate)",
                    report.verdict.as_str(),
                    report.violations.len()
                );
                Ok(report)
            }
        }
    }
}
