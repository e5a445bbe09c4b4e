//! Diff scoping: which lines of a file are new.

use git2::{DiffOptions, Patch};
use serde::Serialize;

use crate::error::Result;

/// How far into a blob to look for a NUL byte.
pub const BINARY_SNIFF_LEN: usize = 8000;

/// A line present in the current content but not in the baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLine {
    /// 1-based line number in the current content.
    pub number: u32,
    /// The line without its `\n` terminator.
    pub text: String,
}

pub fn is_binary(content: &[u8]) -> bool {
    content[..content.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

/// Lines of `current` that are added or modified relative to `previous`
/// (`None` for a new file, where every line is new).
///
/// Binary content on either side yields no lines.
pub fn new_lines(previous: Option<&[u8]>, current: &[u8]) -> Result<Vec<NewLine>> {
    let previous = previous.unwrap_or_default();
    if is_binary(current) || is_binary(previous) {
        return Ok(Vec::new());
    }
    if previous == current {
        return Ok(Vec::new());
    }

    let mut opts = DiffOptions::new();
    opts.context_lines(0).force_text(true);
    let patch = Patch::from_buffers(previous, None, current, None, Some(&mut opts))?;

    let mut lines = Vec::new();
    for hunk in 0..patch.num_hunks() {
        for idx in 0..patch.num_lines_in_hunk(hunk)? {
            let line = patch.line_in_hunk(hunk, idx)?;
            if line.origin() != '+' {
                continue;
            }
            let Some(number) = line.new_lineno() else {
                continue;
            };
            let content = line.content();
            let content = content.strip_suffix(b"\n").unwrap_or(content);
            lines.push(NewLine {
                number,
                text: String::from_utf8_lossy(content).into_owned(),
            });
        }
    }
    Ok(lines)
}
