//! OP Policy Check - static gate over the workspace sources
//!
//! Rules:
//! - plugins are invoked only from the tool runner file
//! - the runner carries an `impl Drop` guard that records execution metrics
//! - only the approved lifecycle states are named anywhere
//!
//! Items marked `#[cfg(test)]` and comment lines are not scanned.

pub mod checker;
pub mod violation;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use checker::{PolicyChecker, PolicyConfig};
pub use violation::{Violation, ViolationKind};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to walk sources: {0}")]
    Walk(#[from] glob::GlobError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule pattern: {0}")]
    Rule(#[from] regex::Error),
}

/// Scan `root` with `config` and return every violation, ordered by path and line
pub fn check_workspace(root: &Path, config: &PolicyConfig) -> Result<Vec<Violation>, PolicyError> {
    PolicyChecker::new(config.clone())?.check(root)
}
