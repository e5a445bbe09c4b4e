use crate::checks::{CheckKind, FileCheck, FileContext, Violation};

/// Flags new lines that end in a space or tab.
///
/// Only the `\n` terminator is ignored, so a line ending in `" \r"` passes.
pub struct TrailingWhitespaceCheck;

impl FileCheck for TrailingWhitespaceCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::TrailingWhitespace
    }

    fn check(&self, file: &FileContext) -> Vec<Violation> {
        file.new_lines
            .iter()
            .filter(|line| line.text.ends_with([' ', '\t']))
            .map(|line| Violation {
                path: file.path.to_string(),
                line: Some(line.number),
                check: CheckKind::TrailingWhitespace,
                message: "trailing whitespace".into(),
            })
            .collect()
    }
}
