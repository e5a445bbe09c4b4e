use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeNames;
use crate::checks::marker::MARKER;
use crate::checks::{CheckKind, CheckSet};
use crate::error::{Error, Result};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Environment variable naming an overlay file to use instead of the default.
pub const CONFIG_ENV: &str = "COMMITGATE_CONFIG";

const DEFAULT_OVERLAY_PATH: &str = "~/.config/commitgate/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub attributes: AttributesConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub message: MessageConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

/// How a push with several new commits is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushMode {
    /// Commit by commit in topological order, stopping at the first failure.
    #[default]
    PerCommit,
    /// All new commits as one change set; every violation is reported.
    Aggregate,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub log_file: String,
    #[serde(default)]
    pub log_level: String,
    #[serde(default)]
    pub outcome_log: String,
    #[serde(default)]
    pub push_mode: PushMode,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct AttributesConfig {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub use_info_file: bool,
}

/// Attribute names that enable each check.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ChecksConfig {
    #[serde(default)]
    pub trailing_whitespace: String,
    #[serde(default)]
    pub forbidden_marker: String,
    #[serde(default)]
    pub no_executable: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageConfig {
    #[serde(default = "default_comment_char")]
    pub comment_char: char,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            comment_char: default_comment_char(),
        }
    }
}

fn default_comment_char() -> char {
    '#'
}

/// Checks run by each entry point.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct HooksConfig {
    #[serde(default)]
    pub pre_commit: Vec<CheckKind>,
    #[serde(default)]
    pub pre_receive: Vec<CheckKind>,
    #[serde(default)]
    pub check: Vec<CheckKind>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    attributes: AttributesOverlay,
    #[serde(default)]
    checks: ChecksOverlay,
    #[serde(default)]
    message: MessageOverlay,
    #[serde(default)]
    hooks: HooksOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    log_file: Option<String>,
    log_level: Option<String>,
    outcome_log: Option<String>,
    push_mode: Option<PushMode>,
}

#[derive(Debug, Deserialize, Default)]
struct AttributesOverlay {
    file_name: Option<String>,
    use_info_file: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ChecksOverlay {
    trailing_whitespace: Option<String>,
    forbidden_marker: Option<String>,
    no_executable: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MessageOverlay {
    comment_char: Option<char>,
}

#[derive(Debug, Deserialize, Default)]
struct HooksOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    pre_commit: Vec<CheckKind>,
    #[serde(default)]
    pre_receive: Vec<CheckKind>,
    #[serde(default)]
    check: Vec<CheckKind>,
    #[serde(default)]
    remove_pre_commit: Vec<CheckKind>,
    #[serde(default)]
    remove_pre_receive: Vec<CheckKind>,
    #[serde(default)]
    remove_check: Vec<CheckKind>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list<T: PartialEq>(base: &mut Vec<T>, add: Vec<T>, remove: &[T], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `$COMMITGATE_CONFIG`, or
    ///    ~/.config/commitgate/config.toml (if it exists)
    ///
    /// User config merges with defaults: lists extend, scalars override.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        match Self::load_overlay() {
            Ok(Some(overlay)) => config.apply_overlay(overlay),
            Ok(None) => {}
            Err(e) => eprintln!("commitgate: {e}"),
        }
        config
    }

    fn overlay_path() -> PathBuf {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => expand(&path),
            _ => expand(DEFAULT_OVERLAY_PATH),
        }
    }

    fn load_overlay() -> Result<Option<ConfigOverlay>> {
        let path = Self::overlay_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        set_if(&mut self.settings.log_file, s.log_file);
        set_if(&mut self.settings.log_level, s.log_level);
        set_if(&mut self.settings.outcome_log, s.outcome_log);
        set_if(&mut self.settings.push_mode, s.push_mode);

        let a = overlay.attributes;
        set_if(&mut self.attributes.file_name, a.file_name);
        set_if(&mut self.attributes.use_info_file, a.use_info_file);

        let c = overlay.checks;
        set_if(&mut self.checks.trailing_whitespace, c.trailing_whitespace);
        set_if(&mut self.checks.forbidden_marker, c.forbidden_marker);
        set_if(&mut self.checks.no_executable, c.no_executable);

        set_if(&mut self.message.comment_char, overlay.message.comment_char);

        let h = overlay.hooks;
        merge_list(
            &mut self.hooks.pre_commit,
            h.pre_commit,
            &h.remove_pre_commit,
            h.replace,
        );
        merge_list(
            &mut self.hooks.pre_receive,
            h.pre_receive,
            &h.remove_pre_receive,
            h.replace,
        );
        merge_list(&mut self.hooks.check, h.check, &h.remove_check, h.replace);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }

    pub fn log_path(&self) -> PathBuf {
        expand(&self.settings.log_file)
    }

    pub fn outcome_log_path(&self) -> PathBuf {
        expand(&self.settings.outcome_log)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.settings.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// The value the check engine is constructed with.
    pub fn engine_config(&self) -> EngineConfig {
        let c = &self.checks;
        let names = [
            (&c.trailing_whitespace, CheckKind::TrailingWhitespace),
            (&c.forbidden_marker, CheckKind::ForbiddenMarker),
            (&c.no_executable, CheckKind::NoExecutable),
        ]
        .into_iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, kind)| (name.clone(), kind));

        EngineConfig {
            marker: MARKER.to_string(),
            attribute_names: AttributeNames::new(names),
            attribute_file: self.attributes.file_name.clone(),
            use_info_file: self.attributes.use_info_file,
            comment_char: self.message.comment_char,
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Explicit engine configuration: everything process-wide that the checks
/// depend on. Nothing is read from ambient state after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The forbidden token. Fixed to [`MARKER`] outside tests.
    pub marker: String,
    pub attribute_names: AttributeNames,
    /// Per-directory attribute file name.
    pub attribute_file: String,
    pub use_info_file: bool,
    /// Lines of a commit message starting with this are comments.
    pub comment_char: char,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Config::default_config().engine_config()
    }
}

impl HooksConfig {
    pub fn pre_commit_checks(&self) -> CheckSet {
        self.pre_commit.iter().copied().collect()
    }

    pub fn pre_receive_checks(&self) -> CheckSet {
        self.pre_receive.iter().copied().collect()
    }

    pub fn check_checks(&self) -> CheckSet {
        self.check.iter().copied().collect()
    }
}
