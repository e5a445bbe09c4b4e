use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::attributes::AttributeResolver;
use crate::changes::{ChangeSource, FileChange};
use crate::checks::executable::NoExecutableCheck;
use crate::checks::marker::MarkerCheck;
use crate::checks::trailing_whitespace::TrailingWhitespaceCheck;
use crate::checks::{all_checks, new_lines, CheckKind, CheckSet, FileCheck, FileContext, Violation};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::store::{ObjectStore, Snapshot};

/// Applies the registered checks to a change set.
///
/// Attribute rules are read from the snapshot each file's current content
/// lives in, so a commit is always judged by its own `.gitattributes`.
pub struct CheckEngine<'a> {
    store: &'a dyn ObjectStore,
    config: &'a EngineConfig,
    checks: Vec<Box<dyn FileCheck>>,
}

impl<'a> CheckEngine<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a EngineConfig) -> Self {
        let checks: Vec<Box<dyn FileCheck>> = vec![
            Box::new(TrailingWhitespaceCheck),
            Box::new(MarkerCheck::new(&config.marker)),
            Box::new(NoExecutableCheck),
        ];
        Self {
            store,
            config,
            checks,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Every violation in `source`, with all checks eligible.
    pub fn evaluate(&self, source: &ChangeSource) -> Result<Vec<Violation>> {
        self.evaluate_only(source, &all_checks())
    }

    /// Every violation in `source` from checks in `kinds` that attributes
    /// also enable. Violations come out in change order, then check order.
    pub fn evaluate_only(&self, source: &ChangeSource, kinds: &CheckSet) -> Result<Vec<Violation>> {
        let changes = source.list_changes(self.store)?;
        let resolvers = self.load_resolvers(&changes)?;

        let mut violations = Vec::new();
        for change in &changes {
            let Some(current) = &change.current else {
                continue;
            };
            let Some(resolver) = resolvers.get(&current.snapshot) else {
                continue;
            };
            let enabled: CheckSet = resolver
                .enabled_checks(&change.path)
                .intersection(kinds)
                .copied()
                .collect();
            if enabled.is_empty() {
                continue;
            }

            let found = self.check_file(change, &enabled)?;
            debug!(
                "{} ({}): {} check(s), {} violation(s)",
                change.path,
                change.kind.as_str(),
                enabled.len(),
                found.len()
            );
            violations.extend(found);
        }
        Ok(violations)
    }

    /// One resolver per snapshot that holds current content, loaded with
    /// only the directories those files live in.
    fn load_resolvers(&self, changes: &[FileChange]) -> Result<HashMap<Snapshot, AttributeResolver>> {
        let mut paths: HashMap<&Snapshot, BTreeSet<&str>> = HashMap::new();
        for change in changes {
            if let Some(current) = &change.current {
                paths.entry(&current.snapshot).or_default().insert(&change.path);
            }
        }

        let mut resolvers = HashMap::new();
        for (snapshot, paths) in paths {
            let resolver = AttributeResolver::load(
                self.store,
                snapshot,
                paths,
                &self.config.attribute_file,
                self.config.use_info_file,
                &self.config.attribute_names,
            )?;
            resolvers.insert(snapshot.clone(), resolver);
        }
        Ok(resolvers)
    }

    fn check_file(&self, change: &FileChange, enabled: &CheckSet) -> Result<Vec<Violation>> {
        let Some(current) = &change.current else {
            return Ok(Vec::new());
        };

        let lines = if enabled.iter().any(|k| k.is_line_scoped()) {
            let content = current.content(self.store)?;
            let previous = match &change.previous {
                Some(previous) => Some(previous.content(self.store)?),
                None => None,
            };
            new_lines(previous.as_deref(), &content)?
        } else {
            Vec::new()
        };

        let file = FileContext {
            path: &change.path,
            executable: current.executable,
            new_lines: &lines,
        };
        Ok(self
            .checks
            .iter()
            .filter(|check| enabled.contains(&check.kind()))
            .flat_map(|check| check.check(&file))
            .collect())
    }

    /// Whether any violation is of `kind`.
    pub fn any_of(violations: &[Violation], kind: CheckKind) -> bool {
        violations.iter().any(|v| v.check == kind)
    }
}
