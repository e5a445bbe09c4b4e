//! Policy checks and the engine that applies them.
//!
//! Each check is a [`FileCheck`] implementation that inspects one changed
//! file at a time. The set of checks is closed: which ones run for a path is
//! decided by attribute rules, never by user code.

/// The engine: change source + attributes + diff scoping → violations.
pub mod engine;
/// Executable-bit check.
pub mod executable;
/// Forbidden marker token check.
pub mod marker;
/// Diff scoping: new lines of a changed file.
pub mod scope;
/// Trailing whitespace check.
pub mod trailing_whitespace;

pub use engine::CheckEngine;
pub use scope::{new_lines, NewLine};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed set of policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Added/modified lines must not end in spaces or tabs.
    TrailingWhitespace,
    /// Added/modified lines must not contain the marker token.
    ForbiddenMarker,
    /// Matching files must never be executable.
    NoExecutable,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [
        CheckKind::TrailingWhitespace,
        CheckKind::ForbiddenMarker,
        CheckKind::NoExecutable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::TrailingWhitespace => "trailing-whitespace",
            CheckKind::ForbiddenMarker => "forbidden-marker",
            CheckKind::NoExecutable => "no-executable",
        }
    }

    /// Whether the check looks at diff-scoped lines (and so needs content).
    pub fn is_line_scoped(self) -> bool {
        !matches!(self, CheckKind::NoExecutable)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of checks, iterated in declaration order.
pub type CheckSet = BTreeSet<CheckKind>;

/// Every check.
pub fn all_checks() -> CheckSet {
    CheckKind::ALL.into_iter().collect()
}

/// One policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    /// Line in the current content; `None` for whole-file checks.
    pub line: Option<u32>,
    pub check: CheckKind,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.path, line, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// What a check sees of one changed file.
#[derive(Debug)]
pub struct FileContext<'a> {
    pub path: &'a str,
    /// Current executable bit.
    pub executable: bool,
    /// Diff-scoped lines; empty for binary files or when no line check runs.
    pub new_lines: &'a [NewLine],
}

/// A single policy applied to one changed file.
pub trait FileCheck: Send + Sync {
    fn kind(&self) -> CheckKind;

    /// Violations for this file, in line order.
    fn check(&self, file: &FileContext) -> Vec<Violation>;
}
