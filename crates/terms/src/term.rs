use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::sort::Sort;

/// Operator of a term node.
///
/// Leaves are `Var` and `Lit`; their data lives in the node's [`Payload`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    // === Formula connectives ===
    And,
    Or,
    Not,
    Implies,
    Iff,
    /// Children are the bound variables followed by the body.
    Forall,

    // === Atoms over terms ===
    Eq,
    Neq,
    Distinct,
    Lt,
    Le,

    // === Term-level boolean encoding ===
    /// Term-level `not (a and b)`; every boolean connective is derived from it.
    TNand,
    TLt,
    TEq,
    TEqInt,
    TEqBool,

    // === Arithmetic ===
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,

    // === Maps ===
    MapSelect,
    MapUpdate,
    Tuple,

    /// Uninterpreted function application.
    App(String),

    // === Leaves ===
    Var,
    Lit,
}

impl Op {
    /// Whether nodes with this operator never have children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Op::Var | Op::Lit)
    }
}

/// Leaf data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    Name(String),
    Int(i128),
    Bool(bool),
}

/// Identity of a term node.
///
/// Two terms are the same node iff their ids are equal. Ids are only
/// meaningful while a handle to the node is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(usize);

/// The data behind a [`Term`] handle.
#[derive(Debug)]
pub struct TermNode {
    op: Op,
    sort: Sort,
    children: Vec<Term>,
    payload: Option<Payload>,
    axioms: Vec<Term>,
}

impl TermNode {
    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn children(&self) -> &[Term] {
        &self.children
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Axioms that must hold whenever this node is used in a query.
    pub fn axioms(&self) -> &[Term] {
        &self.axioms
    }

    /// Variable name, for `Var` nodes.
    pub fn name(&self) -> Option<&str> {
        match (&self.op, &self.payload) {
            (Op::Var, Some(Payload::Name(name))) => Some(name),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.op.is_leaf()
    }

    /// Whether this is the formula literal `TRUE`.
    pub fn is_true(&self) -> bool {
        self.op == Op::Lit && self.sort == Sort::Formula && self.payload == Some(Payload::Bool(true))
    }

    /// Whether this is the formula literal `FALSE`.
    pub fn is_false(&self) -> bool {
        self.op == Op::Lit
            && self.sort == Sort::Formula
            && self.payload == Some(Payload::Bool(false))
    }

    /// Bound variable names of a `Forall` node.
    pub fn bound_names(&self) -> Vec<&str> {
        if self.op != Op::Forall {
            return Vec::new();
        }
        let n = self.children.len().saturating_sub(1);
        self.children[..n].iter().filter_map(|v| v.name()).collect()
    }
}

/// Immutable, shareable prover term.
///
/// Cloning a `Term` clones the handle, not the node: the clone is the same
/// node and shares identity with the original. Structural equality is
/// deliberately not provided; use [`Term::ptr_eq`] or the printed form.
#[derive(Clone)]
pub struct Term(Arc<TermNode>);

impl Term {
    /// Build a node without attaching any axioms.
    pub fn new(op: Op, sort: Sort, children: Vec<Term>, payload: Option<Payload>) -> Self {
        Self::with_axioms(op, sort, children, payload, Vec::new())
    }

    /// Build a node carrying the given axioms.
    pub fn with_axioms(
        op: Op,
        sort: Sort,
        children: Vec<Term>,
        payload: Option<Payload>,
        axioms: Vec<Term>,
    ) -> Self {
        Term(Arc::new(TermNode {
            op,
            sort,
            children,
            payload,
            axioms,
        }))
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        Self::new(Op::Var, sort, Vec::new(), Some(Payload::Name(name.into())))
    }

    pub fn int(value: i128) -> Self {
        Self::new(Op::Lit, Sort::Int, Vec::new(), Some(Payload::Int(value)))
    }

    /// Formula literal `TRUE` / `FALSE`.
    pub fn formula(value: bool) -> Self {
        Self::new(Op::Lit, Sort::Formula, Vec::new(), Some(Payload::Bool(value)))
    }

    /// Term-level boolean literal, printed `term$$TRUE` / `term$$FALSE`.
    pub fn bool_lit(value: bool) -> Self {
        Self::new(Op::Lit, Sort::Bool, Vec::new(), Some(Payload::Bool(value)))
    }

    pub fn id(&self) -> TermId {
        TermId(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(a: &Term, b: &Term) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Same node with its children replaced.
    ///
    /// Returns `self` unchanged when every new child is identical to the
    /// old one, so untouched subgraphs keep their sharing.
    pub fn with_children(&self, children: Vec<Term>) -> Term {
        let unchanged = children.len() == self.children.len()
            && children
                .iter()
                .zip(&self.children)
                .all(|(a, b)| Term::ptr_eq(a, b));
        if unchanged {
            return self.clone();
        }
        Term::with_axioms(
            self.op.clone(),
            self.sort,
            children,
            self.payload.clone(),
            self.axioms.clone(),
        )
    }
}

impl Deref for Term {
    type Target = TermNode;

    fn deref(&self) -> &TermNode {
        &self.0
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term({self})")
    }
}
