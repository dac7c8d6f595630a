//! Loop abstraction by havocking.
//!
//! Loops are the non-trivial strongly connected components of the flow
//! graph. Right before each loop entry the analyzer inserts a `havoc` of
//! every variable the loop may write, so that once back edges are cut the
//! acyclic remainder over-approximates any number of iterations.
//!
//! A loop nested inside another shares the outer component, so its header
//! is no entry point. Every back-edge target that is not already a
//! havocked entry gets a havoc of its natural loop's writes instead.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::flow_graph::{FlowGraph, FlowGraphError};
use crate::ir::{Body, Command, CommandKind, NodeId};
use crate::loop_cut::cut_back_edges;
use crate::rw_sets::written_vars;
use crate::symbols::TypeInfo;

/// Strongly connected components of the reachable part of a flow graph.
#[derive(Debug, Clone)]
pub struct SccPartition {
    component: Vec<Option<usize>>,
    sizes: Vec<usize>,
    writes: Vec<BTreeSet<String>>,
    entry_points: BTreeSet<NodeId>,
    /// Back-edge targets and the writes of their natural loops.
    headers: BTreeMap<NodeId, BTreeSet<String>>,
    unreachable: Vec<NodeId>,
}

impl SccPartition {
    /// Two-pass Kosaraju from the graph's entry.
    ///
    /// Pass one records DFS finish order along successor edges. Pass two
    /// takes nodes in reverse finish order and labels everything it reaches
    /// along predecessor edges; while doing so it accumulates each
    /// component's write set and notes nodes entered from another component.
    pub fn compute(graph: &FlowGraph, body: &Body, info: &dyn TypeInfo) -> Self {
        let n = graph.len();
        let finish = finish_order(graph);
        let mut reachable = vec![false; n];
        for &node in &finish {
            reachable[node] = true;
        }

        let mut component: Vec<Option<usize>> = vec![None; n];
        let mut sizes = Vec::new();
        let mut writes: Vec<BTreeSet<String>> = Vec::new();
        let mut entry_points = BTreeSet::new();

        for &root in finish.iter().rev() {
            if component[root].is_some() {
                continue;
            }
            let id = sizes.len();
            sizes.push(0);
            writes.push(BTreeSet::new());
            component[root] = Some(id);

            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                sizes[id] += 1;
                if let Some(cmd) = body.get(node) {
                    writes[id].extend(written_vars(cmd, info));
                }
                for &pred in graph.predecessors(node) {
                    if !reachable[pred] {
                        continue;
                    }
                    match component[pred] {
                        None => {
                            component[pred] = Some(id);
                            stack.push(pred);
                        }
                        Some(other) if other != id => {
                            entry_points.insert(node);
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        let unreachable = (0..n).filter(|&node| !reachable[node]).collect();
        Self {
            component,
            sizes,
            writes,
            entry_points,
            headers: natural_loops(graph, body, info),
            unreachable,
        }
    }

    /// Number of components.
    pub fn count(&self) -> usize {
        self.sizes.len()
    }

    /// Component of a reachable node.
    pub fn component_of(&self, node: NodeId) -> Option<usize> {
        self.component.get(node).copied().flatten()
    }

    pub fn size(&self, component: usize) -> usize {
        self.sizes.get(component).copied().unwrap_or(0)
    }

    pub fn writes(&self, component: usize) -> Option<&BTreeSet<String>> {
        self.writes.get(component)
    }

    /// Nodes with an incoming edge from a different component.
    pub fn entry_points(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entry_points.iter().copied()
    }

    pub fn unreachable(&self) -> &[NodeId] {
        &self.unreachable
    }

    /// Targets of the back edges a DFS from the entry finds.
    pub fn loop_headers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.headers.keys().copied()
    }

    /// Variables to havoc before `node`: the whole component's writes at a
    /// loop entry, otherwise the natural loop's writes at a back-edge
    /// target. `None` if nothing needs forgetting.
    pub fn havoc_set(&self, node: NodeId) -> Option<&BTreeSet<String>> {
        self.entry_havoc(node)
            .or_else(|| self.headers.get(&node).filter(|w| !w.is_empty()))
    }

    fn entry_havoc(&self, node: NodeId) -> Option<&BTreeSet<String>> {
        if !self.entry_points.contains(&node) {
            return None;
        }
        let c = self.component_of(node)?;
        let writes = self.writes(c)?;
        (self.size(c) > 1 && !writes.is_empty()).then_some(writes)
    }
}

/// Writes of the natural loop of every back-edge target.
///
/// The loop of a back edge `u -> h` is `h` plus every node that reaches `u`
/// without passing through `h`. Back edges are the ones [`cut_back_edges`]
/// removes, so each edge it cuts lands on a havoc.
fn natural_loops(
    graph: &FlowGraph,
    body: &Body,
    info: &dyn TypeInfo,
) -> BTreeMap<NodeId, BTreeSet<String>> {
    let mut members: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
    for (latch, header) in cut_back_edges(graph).back_edges {
        let nodes = members.entry(header).or_insert_with(|| BTreeSet::from([header]));
        let mut stack = vec![latch];
        while let Some(node) = stack.pop() {
            if nodes.insert(node) {
                stack.extend(graph.predecessors(node).iter().copied());
            }
        }
    }
    members
        .into_iter()
        .map(|(header, nodes)| {
            let writes = nodes
                .iter()
                .filter_map(|&n| body.get(n))
                .flat_map(|cmd| written_vars(cmd, info))
                .collect();
            (header, writes)
        })
        .collect()
}

/// Post-order of an iterative DFS from the entry along successor edges.
fn finish_order(graph: &FlowGraph) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(graph.len());
    let Some(entry) = graph.entry() else {
        return order;
    };
    let mut visited = vec![false; graph.len()];
    visited[entry] = true;
    let mut stack: Vec<(NodeId, usize)> = vec![(entry, 0)];

    while let Some(top) = stack.last_mut() {
        let (node, next) = *top;
        match graph.successors(node).get(next) {
            Some(&succ) => {
                top.1 += 1;
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push((succ, 0));
                }
            }
            None => {
                stack.pop();
                order.push(node);
            }
        }
    }
    order
}

/// A body with loop havocs inserted, and its graph.
#[derive(Debug, Clone)]
pub struct HavocOutcome {
    pub body: Body,
    pub graph: FlowGraph,
    /// Number of synthetic havoc commands added.
    pub inserted: usize,
    /// Commands of the input body that the entry cannot reach.
    pub unreachable: Vec<NodeId>,
}

/// Insert `havoc W` before every loop entry and back-edge target whose
/// loop writes `W`.
///
/// The havoc takes over the entry's labels, so jumps into the loop now land
/// on it; the original command keeps none.
pub fn insert_loop_havocs(
    body: &Body,
    graph: &FlowGraph,
    info: &dyn TypeInfo,
) -> Result<HavocOutcome, FlowGraphError> {
    let sccs = SccPartition::compute(graph, body, info);
    let mut commands = Vec::with_capacity(body.len());
    let mut inserted = 0;

    for (node, cmd) in body.iter().enumerate() {
        match sccs.havoc_set(node) {
            Some(vars) => {
                commands.push(Command {
                    labels: cmd.labels.clone(),
                    kind: CommandKind::Havoc(vars.iter().cloned().collect()),
                });
                commands.push(Command {
                    labels: Vec::new(),
                    kind: cmd.kind.clone(),
                });
                inserted += 1;
            }
            None => commands.push(cmd.clone()),
        }
    }

    if !sccs.unreachable().is_empty() {
        tracing::warn!(nodes = ?sccs.unreachable(), "unreachable commands");
    }
    tracing::debug!(
        components = sccs.count(),
        loops = sccs.entry_points().filter(|&n| sccs.havoc_set(n).is_some()).count(),
        headers = sccs.loop_headers().count(),
        inserted,
        "loop havoc analysis"
    );

    let body = Body::new(commands);
    let graph = if inserted == 0 {
        graph.clone()
    } else {
        info.flow_graph(&body)?
    };
    Ok(HavocOutcome {
        body,
        graph,
        inserted,
        unreachable: sccs.unreachable().to_vec(),
    })
}

/// Whether every reachable node has exactly one component and no
/// unreachable node has one. Used by tests and debug assertions.
pub fn partition_is_consistent(sccs: &SccPartition, graph: &FlowGraph) -> bool {
    let reachable = graph.reachable();
    let unreachable: HashSet<NodeId> = sccs.unreachable().iter().copied().collect();
    graph.nodes().all(|n| {
        if reachable[n] {
            sccs.component_of(n).is_some() && !unreachable.contains(&n)
        } else {
            sccs.component_of(n).is_none() && unreachable.contains(&n)
        }
    })
}
