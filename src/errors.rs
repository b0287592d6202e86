//! Error taxonomy shared across the pipeline.
//!
//! Errors are deliberately coarse: the scheduler only needs to distinguish
//! classes of failure well enough to report them, and a failure never crosses
//! a sample boundary — one sample's broken node skips its own successors and
//! nothing else.

use std::path::PathBuf;

/// All of the ways a pipeline node (or the code that builds one) can fail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required configuration section or key is missing or invalid. Fatal
    /// before any DAG executes.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A node's declared input path did not exist at dispatch time.
    #[error("missing input file: {0}")]
    MissingInput(PathBuf),

    /// An external tool exited nonzero (or could not be spawned). The
    /// captured stderr lives at the named log path.
    #[error("external tool failure: `{command}` (see log at {logfile})")]
    ToolFailure {
        /// The command line that was executed.
        command: String,
        /// Where the subprocess's stderr was captured.
        logfile: PathBuf,
    },

    /// A VCF record handed to the merge engine was missing required columns
    /// or referenced a contig absent from the reference dictionary.
    #[error("malformed record from caller `{caller}`: {reason}")]
    MalformedRecord {
        /// Which caller's output contained the record.
        caller: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A caller name was referenced that is not present in the merge
    /// engine's inputs.
    #[error("unknown caller: {0}")]
    UnknownCaller(String),

    /// The requested capability (e.g. a variant caller) has no wrapper in
    /// this build. Detected at graph-construction time, not at run time.
    #[error("capability not supported: {0}")]
    CapabilityNotSupported(String),

    /// An underlying I/O failure that is not better described above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`](std::result::Result) for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
