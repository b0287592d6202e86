//! Building and running the variant calling pipeline itself: per-stage
//! external tool commands and the graph builders that wire them into a DAG.
//!
//! Every wrapper here follows the same shape: assemble a shell command from
//! the run configuration, name a deterministic output artifact and log file,
//! and hand all three back as a [`StageCommand`] for a job node to execute
//! through [`invoke`](crate::invoke). The interesting behavior lives in the
//! graph builders ([`graph`]) and the scheduler, not in the wrappers.

pub mod align;
pub mod annotation;
pub mod callers;
pub mod command;
pub mod gatk;
pub mod graph;

use std::path::{Path, PathBuf};

/// One stage's fully assembled invocation: the shell command, the artifact
/// it produces, and where its stderr goes.
#[derive(Debug)]
pub struct StageCommand {
    /// The shell command to run.
    pub command: String,

    /// The artifact the command produces.
    pub output: PathBuf,

    /// The log file capturing the command line and stderr.
    pub logfile: PathBuf,
}

/// Names an artifact under the run's output directory.
pub(crate) fn artifact(out_dir: &Path, name: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!("{}.{}", name, suffix))
}

/// Joins path arguments for a command line.
pub(crate) fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
