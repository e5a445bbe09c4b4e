use globset::{GlobBuilder, GlobMatcher};

/// A path pattern from an attribute file, scoped to that file's directory.
///
/// - No `/` in the pattern: matches the basename at any depth below `base`.
/// - Otherwise anchored to `base` (a leading `/` is dropped).
/// - `*` never crosses `/`; `**` does.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    base: String,
    basename_only: bool,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compile `raw` as found in the attribute file in directory `base`
    /// (`""` for the root, otherwise ending in `/`).
    ///
    /// Returns `Ok(None)` for directory patterns (trailing `/`), which never
    /// match files.
    pub fn new(raw: &str, base: &str) -> Result<Option<Self>, globset::Error> {
        if raw.ends_with('/') {
            return Ok(None);
        }
        let basename_only = !raw.contains('/');
        let glob = raw.strip_prefix('/').unwrap_or(raw);
        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .backslash_escape(true)
            .build()?
            .compile_matcher();
        Ok(Some(Self {
            raw: raw.to_string(),
            base: base.to_string(),
            basename_only,
            matcher,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the repository-relative `path` matches.
    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix(self.base.as_str()) else {
            return false;
        };
        if self.basename_only {
            let name = rest.rsplit('/').next().unwrap_or(rest);
            self.matcher.is_match(name)
        } else {
            self.matcher.is_match(rest)
        }
    }
}
