//! Property tests for the loop havoc analysis and loop cutting.

use std::collections::BTreeSet;

use ivl_vc_analysis::havoc::{SccPartition, insert_loop_havocs, partition_is_consistent};
use ivl_vc_analysis::ir::{Body, Command, CommandKind, Expr, Program, Type, VarDecl};
use ivl_vc_analysis::{FlowGraph, SymbolTable, cut_back_edges};
use proptest::prelude::*;

fn table() -> SymbolTable {
    SymbolTable::from_program(&Program {
        globals: vec![VarDecl::new("x", Type::Int)],
        ..Default::default()
    })
}

/// A body whose command `i` is labeled `n{i}` and either writes `x` or
/// jumps to the listed commands.
fn random_body(shape: &[(bool, Vec<usize>)]) -> Body {
    let n = shape.len();
    let commands = shape
        .iter()
        .enumerate()
        .map(|(i, (writes, targets))| {
            let kind = if *writes {
                CommandKind::Assign(vec![(
                    "x".to_string(),
                    Expr::add(Expr::var("x"), Expr::int(1)),
                )])
            } else {
                CommandKind::Goto(targets.iter().map(|t| format!("n{}", t % n)).collect())
            };
            Command {
                labels: vec![format!("n{i}")],
                kind,
            }
        })
        .collect();
    Body::new(commands)
}

fn shape_strategy() -> impl Strategy<Value = Vec<(bool, Vec<usize>)>> {
    prop::collection::vec(
        (any::<bool>(), prop::collection::vec(0usize..64, 0..3)),
        1..24,
    )
}

proptest! {
    #[test]
    fn every_reachable_node_has_one_component(shape in shape_strategy()) {
        let body = random_body(&shape);
        let graph = FlowGraph::from_body(&body).unwrap();
        let sccs = SccPartition::compute(&graph, &body, &table());
        prop_assert!(partition_is_consistent(&sccs, &graph));
    }

    #[test]
    fn havoc_then_cut_yields_acyclic_graph(shape in shape_strategy()) {
        let body = random_body(&shape);
        let graph = FlowGraph::from_body(&body).unwrap();
        let table = table();
        let outcome = insert_loop_havocs(&body, &graph, &table).unwrap();
        prop_assert_eq!(outcome.body.len(), body.len() + outcome.inserted);

        let cut = cut_back_edges(&outcome.graph);
        prop_assert!(cut.graph.topological_order().is_some());
        prop_assert!(cut.graph.edge_count() + cut.back_edges.len() <= outcome.graph.edge_count());
    }

    #[test]
    fn havocs_only_name_written_variables(shape in shape_strategy()) {
        let body = random_body(&shape);
        let graph = FlowGraph::from_body(&body).unwrap();
        let outcome = insert_loop_havocs(&body, &graph, &table()).unwrap();
        for cmd in outcome.body.iter() {
            if let CommandKind::Havoc(vars) = &cmd.kind {
                prop_assert_eq!(vars, &vec!["x".to_string()]);
            }
        }
    }

    #[test]
    fn every_cut_loop_that_writes_starts_with_a_havoc(shape in shape_strategy()) {
        let body = random_body(&shape);
        let graph = FlowGraph::from_body(&body).unwrap();
        let outcome = insert_loop_havocs(&body, &graph, &table()).unwrap();
        let cut = cut_back_edges(&outcome.graph);

        for (latch, header) in cut.back_edges {
            let mut nodes = BTreeSet::from([header]);
            let mut stack = vec![latch];
            while let Some(node) = stack.pop() {
                if nodes.insert(node) {
                    stack.extend(outcome.graph.predecessors(node).iter().copied());
                }
            }
            let writes = nodes.iter().any(|&n| {
                !matches!(outcome.body.commands[n].kind, CommandKind::Goto(_))
            });
            if writes {
                let lands_on_havoc =
                    matches!(outcome.body.commands[header].kind, CommandKind::Havoc(_));
                prop_assert!(lands_on_havoc, "edge {} -> {} skips the havoc", latch, header);
            }
        }
    }
}
