//! Attribute file parsing.
//!
//! One rule per line: `<pattern> <attr>...` where each attr is `name`
//! (set), `-name` (unset), `!name` (unspecified) or `name=value`.

use log::{debug, warn};

use crate::attributes::pattern::Pattern;
use crate::attributes::{AttrState, AttributeNames, AttributeRule};

/// Parse the attribute file found in directory `base` into rules, keeping
/// only attributes that name a check. `origin` is used in diagnostics.
pub fn parse_rules(text: &str, base: &str, origin: &str, names: &AttributeNames) -> Vec<AttributeRule> {
    let mut rules = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Macro definitions only matter for the built-in `binary` macro,
        // which sets no check attributes.
        if line.starts_with("[attr]") {
            continue;
        }

        let words = tokenize(line);
        let Some((pattern, attrs)) = words.split_first() else {
            continue;
        };

        let pattern = match Pattern::new(pattern, base) {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(e) => {
                warn!("{origin}:{}: skipping pattern {pattern:?}: {e}", idx + 1);
                continue;
            }
        };

        for attr in attrs {
            let (name, state) = if let Some(name) = attr.strip_prefix('-') {
                (name, AttrState::Unset)
            } else if let Some(name) = attr.strip_prefix('!') {
                (name, AttrState::Unspecified)
            } else if let Some((name, _value)) = attr.split_once('=') {
                debug!("{origin}:{}: ignoring value form of {name}", idx + 1);
                continue;
            } else {
                (attr.as_str(), AttrState::Set)
            };

            if let Some(check) = names.check_for(name) {
                rules.push(AttributeRule {
                    pattern: pattern.clone(),
                    check,
                    state,
                });
            }
        }
    }

    rules
}

/// Split a rule line into words, honouring double-quoted patterns.
fn tokenize(line: &str) -> Vec<String> {
    shlex::split(line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect())
}
