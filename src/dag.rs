//! The job graph: typed nodes, the directed acyclic graph that holds them,
//! and the scheduler that executes a graph with resource-bounded concurrency.
//!
//! The design deliberately owns the whole graph structure rather than
//! delegating to a workflow runtime: a [`Dag`](graph::Dag) is a plain
//! insertion-ordered table of [`JobNode`](node::JobNode)s with predecessor
//! edges, and [`execute`](schedule::execute) walks it in topological order on
//! worker threads. Nodes share no mutable state; all communication between a
//! node and its successors is through file paths declared at graph-build
//! time.

pub mod graph;
pub mod node;
pub mod report;
pub mod schedule;

pub use graph::Dag;
pub use node::{JobNode, NodeId, RunState, Stage};
pub use report::{NodeReport, RunReport};
pub use schedule::{execute, Budget};
