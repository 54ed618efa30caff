use std::path::PathBuf;

use thiserror::Error;

/// Failures localized to a single artifact. These are collected into the
/// parse report and never abort the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized size token \"{0}\"")]
    SizeToken(String),
    #[error("size token \"{0}\" does not scale to a whole byte count")]
    InexactSize(String),
    #[error("size token \"{0}\" overflows the byte counter")]
    SizeOverflow(String),
    #[error("concurrency \"{0}\" must be a positive integer")]
    Concurrency(String),
    #[error("unable to read artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-level failures. Fatal for the whole run, unlike [`ParseError`].
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("results directory not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("results path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("unable to read results directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "no matching result artifacts under {} (expected <op>_<size>_c<concurrency>.<ext>, scanned {scanned} files)",
        .path.display()
    )]
    NoArtifacts { path: PathBuf, scanned: usize },
}
