//! The run report: every node's terminal state, plus enough context to
//! inspect exactly one log file per failure.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use prettytable::{row, Table};
use serde::Serialize;

use super::graph::Dag;
use super::node::{NodeId, RunState};

/// One node's final disposition.
#[derive(Serialize)]
pub struct NodeReport {
    /// The node's id.
    pub id: NodeId,

    /// The stage the node implemented.
    pub stage: String,

    /// The node's terminal state.
    pub state: RunState,

    /// For failed nodes, the error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// For nodes that ran a subprocess, where its stderr was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logfile: Option<PathBuf>,
}

/// The result of executing one or more graphs.
#[derive(Default, Serialize)]
pub struct RunReport {
    /// Per-node dispositions, in graph insertion (topological) order.
    pub nodes: Vec<NodeReport>,
}

impl RunReport {
    /// Collects the terminal states of every node in `dag` into this report.
    pub fn absorb(&mut self, dag: &Dag) {
        for node in dag.iter() {
            self.nodes.push(NodeReport {
                id: node.id.clone(),
                stage: node.stage.to_string(),
                state: node.state(),
                error: node.error().map(String::from),
                logfile: node.logfile.clone(),
            });
        }
    }

    /// The number of nodes in a given terminal state.
    pub fn count(&self, state: RunState) -> usize {
        self.nodes.iter().filter(|n| n.state == state).count()
    }

    /// Whether every node succeeded.
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.state == RunState::Succeeded)
    }

    /// Renders the report as a table for human consumption.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Node", "Stage", "State", "Detail"]);

        for node in &self.nodes {
            let detail = match (&node.error, &node.logfile) {
                (Some(error), Some(log)) => format!("{} (log: {})", error, log.display()),
                (Some(error), None) => error.clone(),
                _ => String::new(),
            };
            table.add_row(row![node.id, node.stage, node.state.to_string(), detail]);
        }

        table
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write_json<P>(&self, path: P) -> anyhow::Result<()>
    where
        P: AsRef<Path>,
    {
        let mut file = File::create(path.as_ref())?;
        let output = serde_json::to_string_pretty(&self)?;
        file.write_all(output.as_bytes())?;
        Ok(())
    }
}
