//! A single unit of work in the pipeline graph.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::errors::Result;

/// Unique node identifier within a [`Dag`](super::Dag). By convention,
/// `{sample}.{stage}`.
pub type NodeId = String;

/// The blocking work a node performs when dispatched to a worker thread.
pub type Work = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// The pipeline stage a node belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Read alignment (FASTQ pair in, sorted BAM out).
    Align,

    /// Read group assignment and BAM indexing.
    Readgroup,

    /// Realignment target interval discovery.
    RealignTarget,

    /// Indel realignment over the discovered targets.
    RealignIndels,

    /// Base quality score recalibration.
    Recalibrate,

    /// One independent variant caller in the fan-out. Carries the caller's
    /// name.
    VariantCall(String),

    /// The fan-in: consolidate all caller outputs into one call set.
    Merge,

    /// Variant annotation over the merged call set.
    Annotate,

    /// Variant filtration.
    Filter,

    /// Decomposition and left-normalization of the filtered call set.
    Normalize,

    /// Functional effect annotation (snpEff).
    SnpEff,

    /// Load the final call set into the query store.
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Align => write!(f, "align"),
            Stage::Readgroup => write!(f, "readgroup"),
            Stage::RealignTarget => write!(f, "realign-target"),
            Stage::RealignIndels => write!(f, "realign-indels"),
            Stage::Recalibrate => write!(f, "recalibrate"),
            Stage::VariantCall(caller) => write!(f, "{}", caller),
            Stage::Merge => write!(f, "merge"),
            Stage::Annotate => write!(f, "annotate"),
            Stage::Filter => write!(f, "filter"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::SnpEff => write!(f, "snpeff"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// A node's run state. Transitions are strictly
/// `Pending → Ready → Running → {Succeeded, Failed}`, except that a node
/// whose predecessor fails (or is itself skipped) moves directly to
/// `Skipped`, and a node whose declared output already exists resumes
/// directly to `Succeeded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Waiting on one or more predecessors.
    Pending,

    /// All predecessors succeeded; eligible for dispatch.
    Ready,

    /// Dispatched to a worker thread.
    Running,

    /// Terminal: the node's work completed (or its output already existed).
    Succeeded,

    /// Terminal: the node's work returned an error.
    Failed,

    /// Terminal: never dispatched because a transitive predecessor failed.
    Skipped,
}

impl RunState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed | RunState::Skipped)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Ready => write!(f, "ready"),
            RunState::Running => write!(f, "running"),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed => write!(f, "failed"),
            RunState::Skipped => write!(f, "skipped"),
        }
    }
}

/// A typed unit of work: declared resources, predecessor edges, declared
/// input/output artifacts, and the closure that does the work.
pub struct JobNode {
    /// Unique id within the graph.
    pub id: NodeId,

    /// Which stage this node implements.
    pub stage: Stage,

    /// Cores requested from the scheduler's budget.
    pub cores: usize,

    /// Memory (gigabytes) requested from the scheduler's budget.
    pub memory_gb: usize,

    /// Ids of the nodes that must succeed before this one starts.
    pub predecessors: Vec<NodeId>,

    /// Input artifacts checked for existence at dispatch time.
    pub inputs: Vec<PathBuf>,

    /// The artifact this node produces. Used both for the idempotent-resume
    /// check and for reporting.
    pub output: Option<PathBuf>,

    /// Where the node's subprocess stderr is captured, if it runs one.
    pub logfile: Option<PathBuf>,

    pub(crate) work: Option<Work>,
    pub(crate) state: RunState,
    pub(crate) error: Option<String>,
}

impl JobNode {
    /// Creates a node with no edges, no artifacts, and a default resource
    /// request of one core and one gigabyte.
    pub fn new<I>(id: I, stage: Stage) -> Self
    where
        I: Into<NodeId>,
    {
        JobNode {
            id: id.into(),
            stage,
            cores: 1,
            memory_gb: 1,
            predecessors: Vec::new(),
            inputs: Vec::new(),
            output: None,
            logfile: None,
            work: None,
            state: RunState::Pending,
            error: None,
        }
    }

    /// Sets the node's core request.
    pub fn cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    /// Sets the node's memory request, in gigabytes.
    pub fn memory_gb(mut self, memory_gb: usize) -> Self {
        self.memory_gb = memory_gb;
        self
    }

    /// Adds a predecessor edge.
    pub fn predecessor<I>(mut self, id: I) -> Self
    where
        I: Into<NodeId>,
    {
        self.predecessors.push(id.into());
        self
    }

    /// Declares an input artifact.
    pub fn input<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.inputs.push(path.into());
        self
    }

    /// Declares the node's output artifact.
    pub fn output<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.output = Some(path.into());
        self
    }

    /// Declares the node's log file.
    pub fn logfile<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.logfile = Some(path.into());
        self
    }

    /// Sets the node's work closure.
    pub fn work<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.work = Some(Box::new(f));
        self
    }

    /// The node's current run state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The captured error message, for a failed node.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl fmt::Debug for JobNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobNode")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("cores", &self.cores)
            .field("memory_gb", &self.memory_gb)
            .field("predecessors", &self.predecessors)
            .field("state", &self.state)
            .finish()
    }
}
