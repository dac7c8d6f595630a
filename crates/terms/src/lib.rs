//! # ivl-vc-terms
//!
//! Logical terms for verification-condition generation.
//!
//! Terms are immutable DAG nodes behind reference-counted handles. Identity,
//! not structure, decides sharing: building the same expression twice gives
//! two nodes, cloning a handle gives the same node. Operators may carry
//! axiom schemas that the [`TermBuilder`] attaches to every node it builds.
//!
//! ## Usage
//!
//! ```
//! use ivl_vc_terms::{eliminate_sharing, Sort, TermBuilder};
//!
//! let b = TermBuilder::with_standard_axioms();
//! let x = b.var("term$$x", Sort::Int);
//! let sum = b.app("f", Sort::Int, vec![x]);
//! let query = b.lt(sum.clone(), sum);
//!
//! let out = eliminate_sharing(&query, &b);
//! assert_eq!(out.term.to_string(), "(< share$$0 share$$0)");
//! assert_eq!(out.definitions[0].to_string(), "(EQ share$$0 (f term$$x))");
//! ```

pub mod builder;
pub mod printer;
pub mod rewrite;
pub mod share;
pub mod sort;
pub mod term;

pub use builder::TermBuilder;
pub use share::{AxiomBag, Unshared, collect_axioms, eliminate_sharing, eliminate_sharing_all};
pub use sort::Sort;
pub use term::{Op, Payload, Term, TermId};
