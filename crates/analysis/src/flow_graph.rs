//! Command-level flow graphs.
//!
//! A [`FlowGraph`] is built once per body and never changes afterwards.
//! Transformations that alter control flow produce a new body and a new
//! graph rather than editing an existing one.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::ir::{Body, CommandKind, NodeId};

/// Structural errors found while building a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowGraphError {
    #[error("goto at command {node} targets undefined label `{label}`")]
    MissingLabel { label: String, node: NodeId },
    #[error("label `{label}` is defined more than once")]
    DuplicateLabel { label: String },
}

/// Accumulates edges, then freezes into a [`FlowGraph`].
#[derive(Debug, Clone)]
pub struct FlowGraphBuilder {
    succ: Vec<Vec<NodeId>>,
    entry: Option<NodeId>,
}

impl FlowGraphBuilder {
    pub fn new(nodes: usize) -> Self {
        Self {
            succ: vec![Vec::new(); nodes],
            entry: (nodes > 0).then_some(0),
        }
    }

    /// Add `from -> to`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let nodes = self.succ.len();
        if let Some(out) = self.succ.get_mut(from)
            && to < nodes
            && !out.contains(&to)
        {
            out.push(to);
        }
    }

    pub fn set_entry(&mut self, entry: Option<NodeId>) {
        self.entry = entry;
    }

    pub fn len(&self) -> usize {
        self.succ.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succ.is_empty()
    }

    pub fn freeze(self) -> FlowGraph {
        let mut pred = vec![Vec::new(); self.succ.len()];
        for (from, outs) in self.succ.iter().enumerate() {
            for &to in outs {
                pred[to].push(from);
            }
        }
        FlowGraph {
            succ: self.succ,
            pred,
            entry: self.entry,
        }
    }
}

/// Immutable successor/predecessor graph over the commands of one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGraph {
    succ: Vec<Vec<NodeId>>,
    pred: Vec<Vec<NodeId>>,
    entry: Option<NodeId>,
}

impl FlowGraph {
    /// Build the graph of a body: every command except a `goto` falls
    /// through to the next one, and a `goto` jumps to each labeled target.
    pub fn from_body(body: &Body) -> Result<Self, FlowGraphError> {
        let mut labels: HashMap<&str, NodeId> = HashMap::new();
        for (node, cmd) in body.iter().enumerate() {
            for label in &cmd.labels {
                if labels.insert(label.as_str(), node).is_some() {
                    return Err(FlowGraphError::DuplicateLabel {
                        label: label.clone(),
                    });
                }
            }
        }

        let mut builder = FlowGraphBuilder::new(body.len());
        for (node, cmd) in body.iter().enumerate() {
            match &cmd.kind {
                CommandKind::Goto(targets) => {
                    for target in targets {
                        let to = labels.get(target.as_str()).copied().ok_or_else(|| {
                            FlowGraphError::MissingLabel {
                                label: target.clone(),
                                node,
                            }
                        })?;
                        builder.add_edge(node, to);
                    }
                }
                _ if node + 1 < body.len() => builder.add_edge(node, node + 1),
                _ => {}
            }
        }
        Ok(builder.freeze())
    }

    pub fn len(&self) -> usize {
        self.succ.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succ.is_empty()
    }

    pub fn nodes(&self) -> std::ops::Range<NodeId> {
        0..self.succ.len()
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn successors(&self, node: NodeId) -> &[NodeId] {
        self.succ.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        self.pred.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.succ.iter().map(Vec::len).sum()
    }

    /// Which nodes can be reached from the entry.
    pub fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.len()];
        let Some(entry) = self.entry else {
            return seen;
        };
        let mut stack = vec![entry];
        seen[entry] = true;
        while let Some(node) = stack.pop() {
            for &s in self.successors(node) {
                if !seen[s] {
                    seen[s] = true;
                    stack.push(s);
                }
            }
        }
        seen
    }

    /// Nodes not reachable from the entry, in index order.
    pub fn unreachable(&self) -> Vec<NodeId> {
        self.reachable()
            .into_iter()
            .enumerate()
            .filter_map(|(n, r)| (!r).then_some(n))
            .collect()
    }

    /// Topological order of all nodes (Kahn's algorithm).
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: Vec<usize> = self.pred.iter().map(Vec::len).collect();
        let mut queue: VecDeque<NodeId> = self
            .nodes()
            .filter(|&n| in_degree[n] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &s in self.successors(node) {
                in_degree[s] -= 1;
                if in_degree[s] == 0 {
                    queue.push_back(s);
                }
            }
        }

        (order.len() == self.len()).then_some(order)
    }
}
