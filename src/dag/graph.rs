//! The directed acyclic graph of job nodes.

use indexmap::IndexMap;

use crate::errors::{PipelineError, Result};

use super::node::{JobNode, NodeId};

/// An insertion-ordered set of [`JobNode`]s with predecessor edges.
///
/// Invariants, checked by [`Dag::validate`]: every predecessor id names a
/// node in the graph, and the edge relation is acyclic. Builders emit nodes
/// in topological order, so iteration order is also a valid dispatch order.
#[derive(Debug, Default)]
pub struct Dag {
    nodes: IndexMap<NodeId, JobNode>,
}

impl Dag {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Dag::default()
    }

    /// Adds a node. Node ids must be unique within the graph.
    pub fn add(&mut self, node: JobNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(PipelineError::Configuration(format!(
                "duplicate node id: {}",
                node.id
            )));
        }

        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Moves every node of `other` into this graph. Id uniqueness still
    /// applies across the combined graph.
    pub fn extend(&mut self, other: Dag) -> Result<()> {
        for (_, node) in other.nodes {
            self.add(node)?;
        }

        Ok(())
    }

    /// The number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by id.
    pub fn get(&self, id: &str) -> Option<&JobNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut JobNode> {
        self.nodes.get_mut(id)
    }

    /// Iterates nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &JobNode> {
        self.nodes.values()
    }

    /// The ids of all nodes, in insertion order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// The ids of the nodes that list `id` as a predecessor.
    pub fn successors(&self, id: &str) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|node| node.predecessors.iter().any(|p| p == id))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Checks the graph's invariants: every predecessor edge points at a
    /// node in the graph, and a topological order exists (no cycles).
    pub fn validate(&self) -> Result<()> {
        for node in self.nodes.values() {
            for pred in &node.predecessors {
                if !self.nodes.contains_key(pred) {
                    return Err(PipelineError::Configuration(format!(
                        "node `{}` references unknown predecessor `{}`",
                        node.id, pred
                    )));
                }
            }
        }

        // Kahn's algorithm; anything left with a nonzero in-degree sits on a
        // cycle.
        let mut in_degree: IndexMap<&NodeId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id, node.predecessors.len()))
            .collect();

        let mut queue: Vec<&NodeId> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut visited = 0;
        while let Some(id) = queue.pop() {
            visited += 1;
            for successor in self.successors(id) {
                if let Some(degree) = self
                    .nodes
                    .get_key_value(&successor)
                    .and_then(|(key, _)| in_degree.get_mut(key))
                {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some((key, _)) = self.nodes.get_key_value(&successor) {
                            queue.push(key);
                        }
                    }
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(PipelineError::Configuration(
                "job graph contains a cycle".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::dag::node::Stage;

    fn node(id: &str, preds: &[&str]) -> JobNode {
        let mut n = JobNode::new(id, Stage::Align);
        for p in preds {
            n = n.predecessor(*p);
        }
        n
    }

    #[test]
    pub fn test_valid_chain_with_fan_out() {
        let mut dag = Dag::new();
        dag.add(node("a", &[])).unwrap();
        dag.add(node("b", &["a"])).unwrap();
        dag.add(node("c1", &["b"])).unwrap();
        dag.add(node("c2", &["b"])).unwrap();
        dag.add(node("d", &["c1", "c2"])).unwrap();

        assert!(dag.validate().is_ok());
        assert_eq!(dag.successors("b"), vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    pub fn test_cycle_is_rejected() {
        let mut dag = Dag::new();
        dag.add(node("a", &["c"])).unwrap();
        dag.add(node("b", &["a"])).unwrap();
        dag.add(node("c", &["b"])).unwrap();

        assert!(dag.validate().is_err());
    }

    #[test]
    pub fn test_unknown_predecessor_is_rejected() {
        let mut dag = Dag::new();
        dag.add(node("a", &["ghost"])).unwrap();
        assert!(dag.validate().is_err());
    }

    #[test]
    pub fn test_duplicate_id_is_rejected() {
        let mut dag = Dag::new();
        dag.add(node("a", &[])).unwrap();
        assert!(dag.add(node("a", &[])).is_err());
    }
}
