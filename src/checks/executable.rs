use crate::checks::{CheckKind, FileCheck, FileContext, Violation};

/// Matching paths must never carry the executable bit, whether or not this
/// change touched the mode.
pub struct NoExecutableCheck;

impl FileCheck for NoExecutableCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::NoExecutable
    }

    fn check(&self, file: &FileContext) -> Vec<Violation> {
        if !file.executable {
            return Vec::new();
        }
        vec![Violation {
            path: file.path.to_string(),
            line: None,
            check: CheckKind::NoExecutable,
            message: "file must not be executable".into(),
        }]
    }
}
