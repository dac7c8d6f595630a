//! Benchmarks for VC generation.
//!
//! Benchmark groups:
//! - `vcgen_*`: havoc insertion, loop cutting, and WP/SP over synthetic bodies
//! - `unshare_*`: sharing elimination of the resulting VCs

use criterion::{Criterion, criterion_group, criterion_main};
use ivl_vc_analysis::ir::{Body, Command, Expr, Program, Type, VarDecl};
use ivl_vc_analysis::{
    FlowGraph, PredicateTransformer, SymbolTable, VcMethod, cut_back_edges, insert_loop_havocs,
};
use ivl_vc_terms::{TermBuilder, eliminate_sharing};

// ---------------------------------------------------------------------------
// Body constructors
// ---------------------------------------------------------------------------

fn table() -> SymbolTable {
    SymbolTable::from_program(&Program {
        globals: vec![VarDecl::new("x", Type::Int), VarDecl::new("y", Type::Int)],
        ..Default::default()
    })
}

/// `n` increments of `x` followed by an assertion.
fn straight_line(n: usize) -> Body {
    let mut commands: Vec<Command> = (0..n)
        .map(|_| Command::assign("x", Expr::add(Expr::var("x"), Expr::int(1))))
        .collect();
    commands.push(Command::assert(Expr::le(Expr::int(0), Expr::var("x"))));
    Body::new(commands)
}

/// `n` sequential diamonds; each branch updates `x` differently. WP doubles
/// the uses of the join's precondition at every diamond, so the VC is a DAG
/// with heavy sharing.
fn diamonds(n: usize) -> Body {
    let mut commands = Vec::new();
    for k in 0..n {
        let (l, r, j) = (format!("l{k}"), format!("r{k}"), format!("j{k}"));
        commands.push(Command::goto(&[l.as_str(), r.as_str()]));
        commands.push(Command::assign("x", Expr::add(Expr::var("x"), Expr::var("y"))).labeled(&l));
        commands.push(Command::goto(&[j.as_str()]));
        commands.push(Command::assign("x", Expr::add(Expr::var("x"), Expr::int(1))).labeled(&r));
        commands.push(Command::noop().labeled(&j));
    }
    commands.push(Command::assert(Expr::le(Expr::var("y"), Expr::var("x"))));
    Body::new(commands)
}

/// `n` nested counting loops.
fn nested_loops(n: usize) -> Body {
    let mut commands = Vec::new();
    for k in 0..n {
        let (body, exit) = (format!("b{k}"), format!("e{k}"));
        commands.push(Command::goto(&[body.as_str(), exit.as_str()]).labeled(format!("h{k}")));
        commands.push(Command::assign("x", Expr::add(Expr::var("x"), Expr::int(1))).labeled(format!("b{k}")));
    }
    for k in (0..n).rev() {
        let head = format!("h{k}");
        commands.push(Command::goto(&[head.as_str()]));
        commands.push(Command::noop().labeled(format!("e{k}")));
    }
    commands.push(Command::assert(Expr::le(Expr::int(0), Expr::var("y"))));
    Body::new(commands)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_vc(c: &mut Criterion, name: &str, body: &Body, method: VcMethod) {
    let table = table();
    let graph = FlowGraph::from_body(body).unwrap();
    let outcome = insert_loop_havocs(body, &graph, &table).unwrap();
    let cut = cut_back_edges(&outcome.graph);
    c.bench_function(name, |b| {
        b.iter(|| {
            let builder = TermBuilder::with_standard_axioms();
            PredicateTransformer::new(&builder, method)
                .vc(name, &outcome.body, &cut.graph, &table)
                .unwrap()
        });
    });
}

fn bench_vcgen_straight_line(c: &mut Criterion) {
    let body = straight_line(500);
    bench_vc(c, "vcgen_straight_line_wp", &body, VcMethod::Wp);
    bench_vc(c, "vcgen_straight_line_sp", &body, VcMethod::Sp);
}

fn bench_vcgen_diamonds(c: &mut Criterion) {
    let body = diamonds(40);
    bench_vc(c, "vcgen_diamonds_wp", &body, VcMethod::Wp);
    bench_vc(c, "vcgen_diamonds_sp", &body, VcMethod::Sp);
}

fn bench_vcgen_nested_loops(c: &mut Criterion) {
    let body = nested_loops(30);
    let table = table();
    c.bench_function("vcgen_nested_loops_havoc_and_cut", |b| {
        b.iter(|| {
            let graph = FlowGraph::from_body(&body).unwrap();
            let outcome = insert_loop_havocs(&body, &graph, &table).unwrap();
            cut_back_edges(&outcome.graph)
        });
    });
}

fn bench_unshare_diamonds(c: &mut Criterion) {
    let body = diamonds(40);
    let table = table();
    let graph = FlowGraph::from_body(&body).unwrap();
    let builder = TermBuilder::with_standard_axioms();
    let vc = PredicateTransformer::new(&builder, VcMethod::Wp)
        .vc("diamonds", &body, &graph, &table)
        .unwrap();
    c.bench_function("unshare_diamonds_wp", |b| {
        b.iter(|| eliminate_sharing(&vc, &builder));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    vcgen_benches,
    bench_vcgen_straight_line,
    bench_vcgen_diamonds,
    bench_vcgen_nested_loops,
);

criterion_group!(unshare_benches, bench_unshare_diamonds);

criterion_main!(vcgen_benches, unshare_benches);
