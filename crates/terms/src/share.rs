//! Sharing elimination and axiom collection.
//!
//! Terms are DAGs; the prover only understands trees. Printing a DAG as a
//! tree can blow up exponentially, so every node reached through two or more
//! parent edges is named by a fresh variable and defined once.

use std::collections::{HashMap, HashSet};

use crate::builder::TermBuilder;
use crate::rewrite::rebuild_all;
use crate::term::{Op, Term, TermId};

/// Base name of variables introduced for shared nodes.
pub const SHARE_PREFIX: &str = "share";

/// Result of [`eliminate_sharing`].
#[derive(Debug, Clone)]
pub struct Unshared {
    /// The input with every shared node replaced by its variable.
    pub term: Term,
    /// `fresh == original` for every shared node, inner nodes first.
    pub definitions: Vec<Term>,
    /// The definitions followed by every axiom attached to the input.
    pub axioms: Vec<Term>,
}

/// Result of [`eliminate_sharing_all`].
#[derive(Debug, Clone)]
pub struct UnsharedBatch {
    pub terms: Vec<Term>,
    pub definitions: Vec<Term>,
    pub axioms: Vec<Term>,
}

/// Replace every node with two or more parent edges by a fresh variable.
///
/// Leaves and tuples are never named, and quantifier bodies are not
/// entered, so bound variables stay under their binder.
pub fn eliminate_sharing(term: &Term, builder: &TermBuilder) -> Unshared {
    let batch = eliminate_sharing_all(std::slice::from_ref(term), builder);
    Unshared {
        term: batch.terms.into_iter().next().unwrap_or_else(|| term.clone()),
        definitions: batch.definitions,
        axioms: batch.axioms,
    }
}

/// Eliminate sharing across a set of terms with one definition list.
pub fn eliminate_sharing_all(terms: &[Term], builder: &TermBuilder) -> UnsharedBatch {
    let counts = count_parent_edges(terms);
    let mut definitions = Vec::new();

    let rewritten = rebuild_all(
        terms,
        |n| *n.op() != Op::Forall,
        |n, children| {
            let rebuilt = n.with_children(children);
            if is_shareable(n) && counts.get(&n.id()).copied().unwrap_or(0) >= 2 {
                let var = builder.fresh_var(SHARE_PREFIX, n.sort());
                definitions.push(builder.define(var.clone(), rebuilt));
                var
            } else {
                rebuilt
            }
        },
    );

    let mut bag = AxiomBag::new();
    for t in terms {
        bag.collect_from(t);
    }
    let mut axioms = definitions.clone();
    axioms.extend(bag.into_vec());

    tracing::trace!(
        roots = terms.len(),
        shared = definitions.len(),
        axioms = axioms.len(),
        "eliminated sharing"
    );

    UnsharedBatch {
        terms: rewritten,
        definitions,
        axioms,
    }
}

fn is_shareable(node: &Term) -> bool {
    !node.is_leaf() && *node.op() != Op::Tuple
}

/// Number of parent edges reaching each node; every root counts as one.
fn count_parent_edges(roots: &[Term]) -> HashMap<TermId, usize> {
    let mut counts: HashMap<TermId, usize> = HashMap::new();
    let mut visited: HashSet<TermId> = HashSet::new();
    let mut stack: Vec<Term> = Vec::new();

    for root in roots {
        *counts.entry(root.id()).or_default() += 1;
        stack.push(root.clone());
    }
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id()) || *node.op() == Op::Forall {
            continue;
        }
        for child in node.children() {
            *counts.entry(child.id()).or_default() += 1;
            stack.push(child.clone());
        }
    }
    counts
}

/// Identity-deduplicated, insertion-ordered set of axioms.
#[derive(Debug, Clone, Default)]
pub struct AxiomBag {
    items: Vec<Term>,
    seen: HashSet<TermId>,
}

impl AxiomBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axiom; returns `false` if this very node is already present.
    pub fn insert(&mut self, axiom: Term) -> bool {
        if !self.seen.insert(axiom.id()) {
            return false;
        }
        self.items.push(axiom);
        true
    }

    /// Add every axiom transitively attached to nodes reachable from `term`,
    /// including axioms attached inside other axioms.
    pub fn collect_from(&mut self, term: &Term) {
        let mut visited: HashSet<TermId> = HashSet::new();
        let mut stack = vec![term.clone()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            for axiom in node.axioms() {
                if self.insert(axiom.clone()) {
                    stack.push(axiom.clone());
                }
            }
            stack.extend(node.children().iter().cloned());
        }
    }

    pub fn contains(&self, axiom: &Term) -> bool {
        self.seen.contains(&axiom.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Term> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Term> {
        self.items
    }
}

/// Every axiom attached anywhere in `term`, each node once.
pub fn collect_axioms(term: &Term) -> AxiomBag {
    let mut bag = AxiomBag::new();
    bag.collect_from(term);
    bag
}
