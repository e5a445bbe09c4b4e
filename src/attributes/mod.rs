//! Per-path check enablement from attribute files.
//!
//! Rules are gathered root-first from every ancestor directory's attribute
//! file and then from the repository-private file, so for any path the last
//! matching rule is also the most specific one.

/// Attribute file line parsing.
pub mod parse;
/// Glob patterns scoped to an attribute file's directory.
pub mod pattern;

pub use parse::parse_rules;
pub use pattern::Pattern;

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::checks::{CheckKind, CheckSet};
use crate::error::Result;
use crate::store::{ObjectStore, Snapshot};

/// State an attribute rule assigns to a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrState {
    /// `name`: enable.
    Set,
    /// `-name`: disable.
    Unset,
    /// `!name`: forget earlier rules, back to the default (disabled).
    Unspecified,
}

/// One `(pattern, check, state)` triple, in file order.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub pattern: Pattern,
    pub check: CheckKind,
    pub state: AttrState,
}

/// Maps attribute names to the checks they control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    names: BTreeMap<String, CheckKind>,
}

impl AttributeNames {
    pub fn new(pairs: impl IntoIterator<Item = (String, CheckKind)>) -> Self {
        Self {
            names: pairs.into_iter().collect(),
        }
    }

    pub fn check_for(&self, attribute: &str) -> Option<CheckKind> {
        self.names.get(attribute).copied()
    }

    /// The attribute name for a check, if one is configured.
    pub fn attribute_for(&self, check: CheckKind) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, k)| **k == check)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self::new([
            ("check-trailing-ws".to_string(), CheckKind::TrailingWhitespace),
            ("check-atatat".to_string(), CheckKind::ForbiddenMarker),
            ("check-no-exec".to_string(), CheckKind::NoExecutable),
        ])
    }
}

/// Resolves which checks are enabled for a path.
#[derive(Debug, Clone, Default)]
pub struct AttributeResolver {
    rules: Vec<AttributeRule>,
}

impl AttributeResolver {
    /// Build from rules already in precedence order (lowest first).
    pub fn new(rules: Vec<AttributeRule>) -> Self {
        Self { rules }
    }

    /// Read the attribute files that can affect `paths` at `snapshot`.
    ///
    /// `file_name` is the per-directory file (normally `.gitattributes`);
    /// when `use_info_file` is set the store's private rules are appended
    /// last.
    pub fn load<'p>(
        store: &dyn ObjectStore,
        snapshot: &Snapshot,
        paths: impl IntoIterator<Item = &'p str>,
        file_name: &str,
        use_info_file: bool,
        names: &AttributeNames,
    ) -> Result<Self> {
        // (depth, dir) so shallower directories sort first.
        let mut dirs: BTreeSet<(usize, String)> = BTreeSet::new();
        for path in paths {
            let mut dir = String::new();
            dirs.insert((0, dir.clone()));
            let components: Vec<&str> = path.split('/').collect();
            for (depth, component) in components[..components.len() - 1].iter().enumerate() {
                dir.push_str(component);
                dir.push('/');
                dirs.insert((depth + 1, dir.clone()));
            }
        }

        let mut rules = Vec::new();
        for (_, dir) in &dirs {
            let file = format!("{dir}{file_name}");
            if let Some(blob) = store.read(snapshot, &file)? {
                let text = String::from_utf8_lossy(&blob.content);
                let parsed = parse_rules(&text, dir, &file, names);
                debug!("{file} at {snapshot}: {} check rule(s)", parsed.len());
                rules.extend(parsed);
            }
        }
        if use_info_file && let Some(text) = store.info_attributes()? {
            rules.extend(parse_rules(&text, "", "info/attributes", names));
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    /// The checks enabled for `path`. Each check takes the state of the last
    /// rule that matches; unmatched checks are disabled.
    pub fn enabled_checks(&self, path: &str) -> CheckSet {
        let mut states: BTreeMap<CheckKind, AttrState> = BTreeMap::new();
        for rule in &self.rules {
            if rule.pattern.matches(path) {
                states.insert(rule.check, rule.state);
            }
        }
        states
            .into_iter()
            .filter(|(_, state)| *state == AttrState::Set)
            .map(|(check, _)| check)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{tree, MemoryStore};

    fn resolver(text: &str) -> AttributeResolver {
        AttributeResolver::new(parse_rules(text, "", ".gitattributes", &AttributeNames::default()))
    }

    #[test]
    fn unmatched_path_has_nothing_enabled() {
        let r = resolver("*.c check-trailing-ws");
        assert!(r.enabled_checks("README.md").is_empty());
    }

    #[test]
    fn later_rule_wins() {
        let r = resolver("* check-trailing-ws\n*.md -check-trailing-ws\n");
        assert!(r.enabled_checks("a.c").contains(&CheckKind::TrailingWhitespace));
        assert!(!r.enabled_checks("a.md").contains(&CheckKind::TrailingWhitespace));
    }

    #[test]
    fn later_enable_overrides_earlier_disable() {
        let r = resolver("*.md -check-trailing-ws\n* check-trailing-ws\n");
        assert!(r.enabled_checks("a.md").contains(&CheckKind::TrailingWhitespace));
    }

    #[test]
    fn checks_resolve_independently() {
        let r = resolver("* check-trailing-ws check-atatat\n*.bin -check-trailing-ws\n");
        let set = r.enabled_checks("x.bin");
        assert!(!set.contains(&CheckKind::TrailingWhitespace));
        assert!(set.contains(&CheckKind::ForbiddenMarker));
    }

    #[test]
    fn unspecified_falls_back_to_disabled() {
        let r = resolver("* check-atatat\n*.txt !check-atatat\n");
        assert!(r.enabled_checks("a.txt").is_empty());
    }

    #[test]
    fn nested_files_are_more_specific() {
        let mut store = MemoryStore::new();
        store.set_index(tree([
            (".gitattributes", "*.txt check-trailing-ws\n"),
            ("vendor/.gitattributes", "*.txt -check-trailing-ws\n"),
            ("vendor/x.txt", "x\n"),
            ("y.txt", "y\n"),
        ]));
        let r = AttributeResolver::load(
            &store,
            &Snapshot::Index,
            ["vendor/x.txt", "y.txt"],
            ".gitattributes",
            true,
            &AttributeNames::default(),
        )
        .unwrap();
        assert!(r.enabled_checks("vendor/x.txt").is_empty());
        assert!(r.enabled_checks("y.txt").contains(&CheckKind::TrailingWhitespace));
    }

    #[test]
    fn info_attributes_outrank_tree_files() {
        let mut store = MemoryStore::new();
        store.set_index(tree([(".gitattributes", "* -check-atatat\n"), ("a", "")]));
        store.set_info_attributes("* check-atatat\n");
        let r = AttributeResolver::load(
            &store,
            &Snapshot::Index,
            ["a"],
            ".gitattributes",
            true,
            &AttributeNames::default(),
        )
        .unwrap();
        assert!(r.enabled_checks("a").contains(&CheckKind::ForbiddenMarker));
    }

    #[test]
    fn info_attributes_can_be_ignored() {
        let mut store = MemoryStore::new();
        store.set_index(tree([("a", "")]));
        store.set_info_attributes("* check-atatat\n");
        let r = AttributeResolver::load(
            &store,
            &Snapshot::Index,
            ["a"],
            ".gitattributes",
            false,
            &AttributeNames::default(),
        )
        .unwrap();
        assert!(r.enabled_checks("a").is_empty());
    }

    #[test]
    fn attribute_names_round_trip() {
        let names = AttributeNames::default();
        assert_eq!(names.attribute_for(CheckKind::ForbiddenMarker), Some("check-atatat"));
        assert_eq!(names.check_for("check-no-exec"), Some(CheckKind::NoExecutable));
        assert_eq!(names.check_for("text"), None);
    }
}
