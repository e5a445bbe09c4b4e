//! The local-commit acknowledgment protocol.
//!
//! A commit whose staged content introduces the marker token may still be
//! committed locally if its message carries the token too. The token in the
//! message is the author's acknowledgment that the commit must never leave
//! this machine. At the server boundary the acknowledgment counts for
//! nothing: [`AckState::finalize`] with [`Boundary::Server`] rejects every
//! state that saw the marker.

use std::fmt;

use serde::Serialize;

use crate::checks::{CheckKind, Violation};
use crate::config::EngineConfig;

/// Where the protocol is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// On the author's machine, while committing.
    Local,
    /// On the shared server, while receiving a push.
    Server,
}

/// Whether the author will see the draft message before it is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Interactive,
    /// `-m`, `-F`, or a no-op editor: the draft is final as written.
    None,
}

impl EditorMode {
    /// Decide from the draft's source argument and the configured editor.
    pub fn detect(source: Option<&str>, git_editor: Option<&str>) -> Self {
        if matches!(source, Some("message")) {
            return EditorMode::None;
        }
        match git_editor {
            Some(editor) if editor.trim() == ":" => EditorMode::None,
            _ => EditorMode::Interactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The marker was found and no editor will be shown to acknowledge it.
    NoEditor,
    /// The finalized message does not carry the token.
    NotAcknowledged,
    /// Marker commits never pass the server, acknowledged or not.
    ServerBoundary,
}

impl RejectReason {
    pub fn explain(self, marker: &str) -> String {
        match self {
            RejectReason::NoEditor => format!(
                "staged content introduces the marker \"{marker}\" and no editor will be shown; \
                 remove the marker, or include \"{marker}\" in the commit message"
            ),
            RejectReason::NotAcknowledged => format!(
                "staged content introduces the marker \"{marker}\"; either remove it from the \
                 files, or keep \"{marker}\" in the commit message to commit locally"
            ),
            RejectReason::ServerBoundary => format!(
                "commits introducing the marker \"{marker}\" are never accepted here"
            ),
        }
    }
}

/// Protocol state for one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state", content = "reason")]
pub enum AckState {
    /// No marker violations.
    Clean,
    /// Marker violations found; nothing decided yet.
    MarkerIntroduced,
    /// The draft message now carries the token; waiting for the author.
    AwaitingAcknowledgment,
    Acknowledged,
    Rejected(RejectReason),
}

impl AckState {
    /// Initial state from a marker evaluation.
    pub fn from_violations(violations: &[Violation]) -> Self {
        if violations.iter().any(|v| v.check == CheckKind::ForbiddenMarker) {
            AckState::MarkerIntroduced
        } else {
            AckState::Clean
        }
    }

    /// Draft stage. May rewrite `draft`; never touches it unless the state
    /// moves to [`AckState::AwaitingAcknowledgment`] from a draft lacking
    /// the token. The comment block added to the draft lists where `found`
    /// places the marker.
    pub fn prepare(
        self,
        draft: &mut String,
        found: &[Violation],
        editor: EditorMode,
        config: &EngineConfig,
    ) -> Self {
        if self != AckState::MarkerIntroduced {
            return self;
        }
        if carries_token(draft, config) {
            return AckState::AwaitingAcknowledgment;
        }
        if editor == EditorMode::None {
            return AckState::Rejected(RejectReason::NoEditor);
        }

        let marker = &config.marker;
        let c = config.comment_char;
        let mut header = format!(
            "{marker}\n\
             {c} Staged files introduce \"{marker}\". Keep the line above to commit locally\n\
             {c} (the push will still be rejected), or delete it to abort.\n"
        );
        for v in found.iter().filter(|v| v.check == CheckKind::ForbiddenMarker) {
            match v.line {
                Some(line) => header.push_str(&format!("{c}   {}:{line}\n", v.path)),
                None => header.push_str(&format!("{c}   {}\n", v.path)),
            }
        }
        draft.insert_str(0, &header);
        AckState::AwaitingAcknowledgment
    }

    /// Final stage, after the author had a chance to edit `message`.
    pub fn finalize(self, message: &str, boundary: Boundary, config: &EngineConfig) -> Self {
        match (self, boundary) {
            (AckState::Clean, _) | (AckState::Rejected(_), _) => self,
            (_, Boundary::Server) => AckState::Rejected(RejectReason::ServerBoundary),
            (AckState::Acknowledged, Boundary::Local) => self,
            (AckState::MarkerIntroduced | AckState::AwaitingAcknowledgment, Boundary::Local) => {
                if carries_token(message, config) {
                    AckState::Acknowledged
                } else {
                    AckState::Rejected(RejectReason::NotAcknowledged)
                }
            }
        }
    }

    /// Whether the commit may proceed.
    pub fn is_accepted(self) -> bool {
        matches!(self, AckState::Clean | AckState::Acknowledged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AckState::Clean => "clean",
            AckState::MarkerIntroduced => "marker-introduced",
            AckState::AwaitingAcknowledgment => "awaiting-acknowledgment",
            AckState::Acknowledged => "acknowledged",
            AckState::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for AckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `message` without its comment lines.
pub fn strip_comments(message: &str, comment_char: char) -> String {
    message
        .lines()
        .filter(|line| !line.starts_with(comment_char))
        .collect::<Vec<_>>()
        .join("\n")
}

fn carries_token(message: &str, config: &EngineConfig) -> bool {
    strip_comments(message, config.comment_char).contains(&config.marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::marker::MARKER;

    fn marker_violation() -> Violation {
        Violation {
            path: "a.txt".into(),
            line: Some(1),
            check: CheckKind::ForbiddenMarker,
            message: String::new(),
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn no_marker_is_clean() {
        let ws = Violation {
            check: CheckKind::TrailingWhitespace,
            ..marker_violation()
        };
        assert_eq!(AckState::from_violations(&[ws]), AckState::Clean);
        assert_eq!(AckState::from_violations(&[]), AckState::Clean);
    }

    #[test]
    fn clean_never_touches_draft() {
        let mut draft = "Fix it\n".to_string();
        let state = AckState::Clean.prepare(&mut draft, &[], EditorMode::Interactive, &config());
        assert_eq!(state, AckState::Clean);
        assert_eq!(draft, "Fix it\n");
        assert!(state.finalize(&draft, Boundary::Local, &config()).is_accepted());
    }

    #[test]
    fn prepare_prepends_token_and_comment() {
        let mut draft = "Fix it\n".to_string();
        let found = [marker_violation()];
        let state = AckState::from_violations(&found).prepare(
            &mut draft,
            &found,
            EditorMode::Interactive,
            &config(),
        );
        assert_eq!(state, AckState::AwaitingAcknowledgment);
        assert!(draft.starts_with(&format!("{MARKER}\n# ")));
        assert!(draft.contains("\n#   a.txt:1\n"), "{draft}");
        assert!(draft.ends_with("Fix it\n"));
    }

    #[test]
    fn prepare_without_editor_rejects() {
        let mut draft = "Fix it\n".to_string();
        let state = AckState::MarkerIntroduced.prepare(&mut draft, &[], EditorMode::None, &config());
        assert_eq!(state, AckState::Rejected(RejectReason::NoEditor));
        assert_eq!(draft, "Fix it\n");
    }

    #[test]
    fn prepare_with_token_already_present_leaves_draft() {
        let original = format!("WIP {MARKER}\n");
        let mut draft = original.clone();
        let state = AckState::MarkerIntroduced.prepare(&mut draft, &[], EditorMode::None, &config());
        assert_eq!(state, AckState::AwaitingAcknowledgment);
        assert_eq!(draft, original);
    }

    #[test]
    fn finalize_kept_token_acknowledges() {
        let mut draft = "Fix it\n".to_string();
        let state = AckState::MarkerIntroduced.prepare(&mut draft, &[], EditorMode::Interactive, &config());
        let state = state.finalize(&draft, Boundary::Local, &config());
        assert_eq!(state, AckState::Acknowledged);
        assert!(state.is_accepted());
    }

    #[test]
    fn finalize_deleted_token_rejects() {
        let state = AckState::AwaitingAcknowledgment.finalize(
            &format!("Fix it\n# {MARKER} only in a comment\n"),
            Boundary::Local,
            &config(),
        );
        assert_eq!(state, AckState::Rejected(RejectReason::NotAcknowledged));
        assert!(!state.is_accepted());
    }

    #[test]
    fn server_ignores_acknowledgment() {
        let message = format!("{MARKER} keep local\n");
        for state in [
            AckState::MarkerIntroduced,
            AckState::AwaitingAcknowledgment,
            AckState::Acknowledged,
        ] {
            assert_eq!(
                state.finalize(&message, Boundary::Server, &config()),
                AckState::Rejected(RejectReason::ServerBoundary),
                "{state} at the server"
            );
        }
        assert_eq!(
            AckState::Clean.finalize(&message, Boundary::Server, &config()),
            AckState::Clean
        );
    }

    #[test]
    fn rejected_is_terminal() {
        let state = AckState::Rejected(RejectReason::NoEditor);
        assert_eq!(
            state.finalize(&format!("{MARKER}\n"), Boundary::Local, &config()),
            state
        );
    }

    #[test]
    fn custom_comment_char() {
        let mut config = config();
        config.comment_char = ';';
        let message = format!("; {MARKER}\n# {MARKER}\n");
        assert_eq!(
            AckState::MarkerIntroduced.finalize(&message, Boundary::Local, &config),
            AckState::Acknowledged
        );
    }

    #[test]
    fn strip_comments_keeps_indented_hash() {
        assert_eq!(strip_comments("a\n# b\n  # c\n", '#'), "a\n  # c");
    }

    #[test]
    fn editor_detection() {
        assert_eq!(EditorMode::detect(Some("message"), None), EditorMode::None);
        assert_eq!(EditorMode::detect(None, Some(":")), EditorMode::None);
        assert_eq!(EditorMode::detect(Some("template"), Some("vim")), EditorMode::Interactive);
        assert_eq!(EditorMode::detect(None, None), EditorMode::Interactive);
    }
}
