//! Back-edge removal.
//!
//! After loop havocs are in place the predicate transformer works on an
//! acyclic graph: every edge that closes a cycle in a DFS from the entry is
//! dropped, and so is every edge leaving an unreachable node.

use crate::flow_graph::{FlowGraph, FlowGraphBuilder};
use crate::ir::NodeId;

/// An acyclic version of a flow graph.
#[derive(Debug, Clone)]
pub struct LoopCut {
    pub graph: FlowGraph,
    /// Removed back edges, in discovery order.
    pub back_edges: Vec<(NodeId, NodeId)>,
}

/// Drop retreating edges found by a DFS from the entry.
pub fn cut_back_edges(graph: &FlowGraph) -> LoopCut {
    let n = graph.len();
    let mut builder = FlowGraphBuilder::new(n);
    builder.set_entry(graph.entry());
    let mut back_edges = Vec::new();

    let Some(entry) = graph.entry() else {
        return LoopCut {
            graph: builder.freeze(),
            back_edges,
        };
    };

    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<(NodeId, usize)> = vec![(entry, 0)];
    visited[entry] = true;
    on_stack[entry] = true;

    while let Some(top) = stack.last_mut() {
        let (node, next) = *top;
        match graph.successors(node).get(next) {
            Some(&succ) => {
                top.1 += 1;
                if on_stack[succ] {
                    back_edges.push((node, succ));
                    continue;
                }
                builder.add_edge(node, succ);
                if !visited[succ] {
                    visited[succ] = true;
                    on_stack[succ] = true;
                    stack.push((succ, 0));
                }
            }
            None => {
                on_stack[node] = false;
                stack.pop();
            }
        }
    }

    tracing::trace!(removed = back_edges.len(), "cut back edges");
    LoopCut {
        graph: builder.freeze(),
        back_edges,
    }
}
