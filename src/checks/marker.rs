use crate::checks::{CheckKind, FileCheck, FileContext, Violation};

/// The "never share this" token. Spelled in pieces so this file does not
/// itself contain it.
pub const MARKER: &str = concat!("@@", "@");

/// Flags new lines that contain the marker token. Occurrences already in
/// the baseline are not reported.
pub struct MarkerCheck {
    marker: String,
}

impl MarkerCheck {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
        }
    }
}

impl FileCheck for MarkerCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ForbiddenMarker
    }

    fn check(&self, file: &FileContext) -> Vec<Violation> {
        file.new_lines
            .iter()
            .filter(|line| line.text.contains(&self.marker))
            .map(|line| Violation {
                path: file.path.to_string(),
                line: Some(line.number),
                check: CheckKind::ForbiddenMarker,
                message: format!("marker string (\"{}\") introduced", self.marker),
            })
            .collect()
    }
}
