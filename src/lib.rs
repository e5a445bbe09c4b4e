//! commitgate: attribute-driven content checks for git hooks.
//!
//! Changes are gathered from the working tree, the index, a commit, or a
//! batch of pushed commits, and each changed file is checked by the
//! policies its attributes enable. Line checks only see lines the change
//! introduces. A commit that introduces the marker token can be kept
//! locally by acknowledging it in the commit message; the server rejects it
//! regardless.
//!
//! # Architecture
//!
//! - **[`store`]**: the object and ref data provider (`git2` or in-memory).
//! - **[`attributes`]**: `.gitattributes` rules that enable and disable checks.
//! - **[`changes`]**: change sources and the files they touch.
//! - **[`checks`]**: the checks, diff scoping, and the engine that runs them.
//! - **[`ack`]**: the marker acknowledgment state machine.
//! - **[`graph`]**: ref updates, new-commit discovery, topological order.
//! - **[`gate`]**: one entry point per hook, producing a [`gate::Report`].
//! - **[`config`]**: embedded defaults + user overlay merge.
//! - **[`logging`]**: `simplelog` setup and the outcome log.

/// Marker acknowledgment protocol.
pub mod ack;
/// Attribute files and the resolver built from them.
pub mod attributes;
/// Change sources.
pub mod changes;
/// Checks and the check engine.
pub mod checks;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
pub mod error;
/// Hook entry points and reports.
pub mod gate;
/// Push commit discovery and ordering.
pub mod graph;
/// Diagnostic and outcome logging.
pub mod logging;
pub mod store;

pub use error::{Error, Result};

use changes::ChangeSource;
use checks::{CheckEngine, Violation};
use store::ObjectStore;

/// Evaluate every check on `source` with the default configuration.
///
/// This is the main entry point for tests and simple usage. Hooks go
/// through [`gate::Gate`], which applies the per-hook check lists.
pub fn evaluate(store: &dyn ObjectStore, source: &ChangeSource) -> Result<Vec<Violation>> {
    let config = config::EngineConfig::default();
    CheckEngine::new(store, &config).evaluate(source)
}
