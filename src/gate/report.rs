use std::fmt;

use serde::Serialize;

use crate::ack::AckState;
use crate::checks::Violation;
use crate::store::ObjectId;

/// The hook entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hook {
    PreCommit,
    PrepareCommitMsg,
    CommitMsg,
    PreReceive,
    /// Manual audit outside any hook.
    Check,
}

impl Hook {
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::PreCommit => "pre-commit",
            Hook::PrepareCommitMsg => "prepare-commit-msg",
            Hook::CommitMsg => "commit-msg",
            Hook::PreReceive => "pre-receive",
            Hook::Check => "check",
        }
    }

    /// Trailing instructions printed after a failing report.
    fn footer(self) -> &'static str {
        match self {
            Hook::PreCommit => {
                "Commit aborted. Fix the lines above and stage them again, or adjust \
                 the check attributes in .gitattributes."
            }
            Hook::PrepareCommitMsg | Hook::CommitMsg => "Commit aborted.",
            Hook::PreReceive => {
                "Push rejected. Rewrite the offending commit (for example with \
                 `git rebase -i`) and push again."
            }
            Hook::Check => "Fix the lines above; .gitattributes decides which checks apply.",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

/// The commit a push report is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    pub id: ObjectId,
    pub summary: String,
}

/// The outcome of one entry point.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub hook: Hook,
    pub verdict: Verdict,
    pub violations: Vec<Violation>,
    /// The first offending commit of a push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitRef>,
    /// Final acknowledgment state, for the message hooks and pushes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<AckState>,
    /// Instructions for the author; present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

impl Report {
    pub fn pass(hook: Hook) -> Self {
        Self {
            hook,
            verdict: Verdict::Pass,
            violations: Vec::new(),
            commit: None,
            ack: None,
            footer: None,
        }
    }

    /// Pass with no violations, fail (with the hook's footer) otherwise.
    pub fn from_violations(hook: Hook, violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            return Self::pass(hook);
        }
        Self {
            verdict: Verdict::Fail,
            violations,
            footer: Some(hook.footer().to_string()),
            ..Self::pass(hook)
        }
    }

    /// Fail with an explanation ahead of the hook's footer.
    pub fn fail_with(mut self, explanation: &str) -> Self {
        self.verdict = Verdict::Fail;
        self.footer = Some(format!("{explanation}\n{}", self.hook.footer()));
        self
    }

    pub fn with_commit(mut self, commit: CommitRef) -> Self {
        self.commit = Some(commit);
        self
    }

    pub fn with_ack(mut self, state: AckState) -> Self {
        self.ack = Some(state);
        self
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Process exit status: 0 on pass, 1 on policy failure.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commitgate {}: {}", self.hook, self.verdict.label())?;
        if let Some(commit) = &self.commit {
            writeln!(f, "in commit {} \"{}\"", commit.id.short(), commit.summary)?;
        }
        for v in &self.violations {
            writeln!(f, "  {v} [{}]", v.check)?;
        }
        if let Some(footer) = &self.footer {
            writeln!(f)?;
            writeln!(f, "{footer}")?;
        }
        Ok(())
    }
}
