//! # ivl-vc-analysis
//!
//! Program analyses and verification-condition generation for a small
//! intermediate verification language.
//!
//! A routine goes through these stages before it reaches the prover:
//!
//! 1. [`havoc::insert_loop_havocs`] forgets everything a loop writes at each
//!    loop entry.
//! 2. [`desugar::desugar_calls`] replaces calls by the callee's contract.
//! 3. [`spec_desugar::desugar_specification`] turns the routine's own
//!    contract into an entry assumption and exit assertions.
//! 4. [`loop_cut::cut_back_edges`] makes the flow graph acyclic.
//! 5. [`transformer::PredicateTransformer`] computes the WP or SP
//!    verification condition.
//!
//! ## Usage
//!
//! ```
//! use ivl_vc_analysis::ir::{Body, Command, Expr, Program, Type, VarDecl};
//! use ivl_vc_analysis::{FlowGraph, PredicateTransformer, SymbolTable, VcMethod};
//! use ivl_vc_terms::TermBuilder;
//!
//! let program = Program {
//!     globals: vec![VarDecl::new("x", Type::Int)],
//!     ..Default::default()
//! };
//! let table = SymbolTable::from_program(&program);
//! let body = Body::new(vec![
//!     Command::assign("x", Expr::int(2)),
//!     Command::assert(Expr::lt(Expr::int(1), Expr::var("x"))),
//! ]);
//! let graph = FlowGraph::from_body(&body).unwrap();
//!
//! let builder = TermBuilder::with_standard_axioms();
//! let vc = PredicateTransformer::new(&builder, VcMethod::Wp)
//!     .vc("example", &body, &graph, &table)
//!     .unwrap();
//! assert_eq!(vc.to_string(), "(< 1 2)");
//! ```

pub mod desugar;
pub mod encode;
pub mod flow_graph;
pub mod havoc;
pub mod ir;
pub mod loop_cut;
pub mod rw_sets;
pub mod spec_desugar;
pub mod symbols;
pub mod transformer;

pub use desugar::{DesugarError, desugar_calls};
pub use encode::ExprEncoder;
pub use flow_graph::{FlowGraph, FlowGraphError};
pub use havoc::{HavocOutcome, SccPartition, insert_loop_havocs};
pub use loop_cut::{LoopCut, cut_back_edges};
pub use spec_desugar::desugar_specification;
pub use symbols::{RoutineScope, SymbolTable, TypeInfo};
pub use transformer::{PredicateTransformer, VcError, VcMethod};
