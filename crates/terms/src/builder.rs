//! Smart constructors with per-operator axiom schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::printer::index_arity;
use crate::sort::Sort;
use crate::term::{Op, Term};

/// Produces the axioms attached to a freshly built node from its children.
pub type AxiomSchema = Arc<dyn Fn(&[Term]) -> Vec<Term> + Send + Sync>;

/// Builds terms and attaches operator axioms.
///
/// Axioms produced by a schema are attached to every term built with the
/// schema's operator. Schemas that ignore their arguments should hand out
/// the same axiom nodes every time, so that collection deduplicates them.
pub struct TermBuilder {
    schemas: HashMap<Op, AxiomSchema>,
    bool_lit_axioms: Vec<Term>,
    fresh: AtomicU64,
}

impl fmt::Debug for TermBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermBuilder")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field("fresh", &self.fresh.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for TermBuilder {
    fn default() -> Self {
        Self::with_standard_axioms()
    }
}

impl TermBuilder {
    /// A builder with an empty schema registry.
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
            bool_lit_axioms: Vec::new(),
            fresh: AtomicU64::new(0),
        }
    }

    /// A builder that axiomatizes the term-level boolean operators, boolean
    /// literals, and map update.
    pub fn with_standard_axioms() -> Self {
        let mut builder = Self::new();
        for (op, atom) in [
            (Op::TLt, Op::Lt),
            (Op::TEq, Op::Eq),
            (Op::TEqInt, Op::Eq),
            (Op::TEqBool, Op::Eq),
        ] {
            let axiom = reflect_axiom(op.clone(), atom);
            builder.register_axioms(op, move |_| vec![axiom.clone()]);
        }
        let nand = nand_axiom();
        builder.register_axioms(Op::TNand, move |_| vec![nand.clone()]);

        let per_arity: Mutex<HashMap<usize, Vec<Term>>> = Mutex::new(HashMap::new());
        builder.register_axioms(Op::MapUpdate, move |children| {
            let arity = index_arity(children).max(1);
            let mut cache = match per_arity.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache
                .entry(arity)
                .or_insert_with(|| map_update_axioms(arity))
                .clone()
        });

        builder.bool_lit_axioms = vec![Term::new(
            Op::Neq,
            Sort::Formula,
            vec![Term::bool_lit(true), Term::bool_lit(false)],
            None,
        )];
        builder
    }

    /// Register (or replace) the axiom schema of `op`.
    pub fn register_axioms<F>(&mut self, op: Op, schema: F)
    where
        F: Fn(&[Term]) -> Vec<Term> + Send + Sync + 'static,
    {
        self.schemas.insert(op, Arc::new(schema));
    }

    pub fn has_axioms(&self, op: &Op) -> bool {
        self.schemas.contains_key(op)
    }

    /// Generic constructor; attaches the registered axioms of `op`, if any.
    pub fn mk(&self, op: Op, sort: Sort, children: Vec<Term>) -> Term {
        let axioms = match self.schemas.get(&op) {
            Some(schema) => schema(&children),
            None => Vec::new(),
        };
        Term::with_axioms(op, sort, children, None, axioms)
    }

    /// A name unique for the lifetime of this builder.
    pub fn fresh_name(&self, base: &str) -> String {
        let n = self.fresh.fetch_add(1, Ordering::Relaxed);
        format!("{base}$${n}")
    }

    pub fn fresh_var(&self, base: &str, sort: Sort) -> Term {
        Term::var(self.fresh_name(base), sort)
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    pub fn var(&self, name: impl Into<String>, sort: Sort) -> Term {
        Term::var(name, sort)
    }

    pub fn int(&self, value: i128) -> Term {
        Term::int(value)
    }

    pub fn formula(&self, value: bool) -> Term {
        Term::formula(value)
    }

    /// Term-level boolean literal carrying the `TRUE != FALSE` axiom.
    pub fn bool_lit(&self, value: bool) -> Term {
        Term::with_axioms(
            Op::Lit,
            Sort::Bool,
            Vec::new(),
            Some(crate::term::Payload::Bool(value)),
            self.bool_lit_axioms.clone(),
        )
    }

    // ------------------------------------------------------------------
    // Formulas
    // ------------------------------------------------------------------

    /// Conjunction; `TRUE` operands are dropped.
    pub fn and(&self, terms: Vec<Term>) -> Term {
        let mut terms: Vec<Term> = terms.into_iter().filter(|t| !t.is_true()).collect();
        match terms.len() {
            0 => self.formula(true),
            1 => terms.remove(0),
            _ => self.mk(Op::And, Sort::Formula, terms),
        }
    }

    /// Disjunction; `FALSE` operands are dropped.
    pub fn or(&self, terms: Vec<Term>) -> Term {
        let mut terms: Vec<Term> = terms.into_iter().filter(|t| !t.is_false()).collect();
        match terms.len() {
            0 => self.formula(false),
            1 => terms.remove(0),
            _ => self.mk(Op::Or, Sort::Formula, terms),
        }
    }

    pub fn not(&self, t: Term) -> Term {
        self.mk(Op::Not, Sort::Formula, vec![t])
    }

    pub fn implies(&self, lhs: Term, rhs: Term) -> Term {
        if lhs.is_true() || rhs.is_true() {
            return rhs;
        }
        self.mk(Op::Implies, Sort::Formula, vec![lhs, rhs])
    }

    pub fn iff(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::Iff, Sort::Formula, vec![lhs, rhs])
    }

    pub fn eq(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::Eq, Sort::Formula, vec![lhs, rhs])
    }

    pub fn neq(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::Neq, Sort::Formula, vec![lhs, rhs])
    }

    pub fn distinct(&self, terms: Vec<Term>) -> Term {
        self.mk(Op::Distinct, Sort::Formula, terms)
    }

    pub fn lt(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::Lt, Sort::Formula, vec![lhs, rhs])
    }

    pub fn le(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::Le, Sort::Formula, vec![lhs, rhs])
    }

    pub fn forall(&self, vars: Vec<Term>, body: Term) -> Term {
        if vars.is_empty() {
            return body;
        }
        let mut children = vars;
        children.push(body);
        self.mk(Op::Forall, Sort::Formula, children)
    }

    /// Definition `lhs == rhs`, using `IFF` for formulas.
    pub fn define(&self, lhs: Term, rhs: Term) -> Term {
        if rhs.sort().is_formula() {
            self.iff(lhs, rhs)
        } else {
            self.eq(lhs, rhs)
        }
    }

    // ------------------------------------------------------------------
    // Terms
    // ------------------------------------------------------------------

    pub fn app(&self, name: impl Into<String>, sort: Sort, args: Vec<Term>) -> Term {
        self.mk(Op::App(name.into()), sort, args)
    }

    pub fn tuple(&self, items: Vec<Term>) -> Term {
        self.mk(Op::Tuple, Sort::Value, items)
    }

    pub fn select(&self, map: Term, indices: Vec<Term>, sort: Sort) -> Term {
        let idx = self.tuple(indices);
        self.mk(Op::MapSelect, sort, vec![map, idx])
    }

    pub fn update(&self, map: Term, indices: Vec<Term>, value: Term) -> Term {
        let idx = self.tuple(indices);
        self.mk(Op::MapUpdate, Sort::Value, vec![map, idx, value])
    }

    /// Term-level `not (a and b)`.
    pub fn tnand(&self, lhs: Term, rhs: Term) -> Term {
        self.mk(Op::TNand, Sort::Bool, vec![lhs, rhs])
    }

    /// Term-level negation, `nand(a, a)`.
    pub fn tnot(&self, t: Term) -> Term {
        self.tnand(t.clone(), t)
    }

    pub fn tand(&self, lhs: Term, rhs: Term) -> Term {
        self.tnot(self.tnand(lhs, rhs))
    }

    pub fn tor(&self, lhs: Term, rhs: Term) -> Term {
        self.tnand(self.tnot(lhs), self.tnot(rhs))
    }

    pub fn timplies(&self, lhs: Term, rhs: Term) -> Term {
        self.tnand(lhs, self.tnot(rhs))
    }
}

/// `FORALL (a b) (IFF (EQ (op a b) TRUE) (atom a b))`
fn reflect_axiom(op: Op, atom: Op) -> Term {
    let a = Term::var("a", Sort::Value);
    let b = Term::var("b", Sort::Value);
    let lhs = term_true(Term::new(op, Sort::Bool, vec![a.clone(), b.clone()], None));
    let rhs = Term::new(atom, Sort::Formula, vec![a.clone(), b.clone()], None);
    forall_plain(
        vec![a, b],
        Term::new(Op::Iff, Sort::Formula, vec![lhs, rhs], None),
    )
}

/// `FORALL (a b) (IFF (EQ (TNAND a b) TRUE) (NOT (AND (EQ a TRUE) (EQ b TRUE))))`
fn nand_axiom() -> Term {
    let a = Term::var("a", Sort::Bool);
    let b = Term::var("b", Sort::Bool);
    let lhs = term_true(Term::new(
        Op::TNand,
        Sort::Bool,
        vec![a.clone(), b.clone()],
        None,
    ));
    let both = Term::new(
        Op::And,
        Sort::Formula,
        vec![term_true(a.clone()), term_true(b.clone())],
        None,
    );
    let rhs = Term::new(Op::Not, Sort::Formula, vec![both], None);
    forall_plain(
        vec![a, b],
        Term::new(Op::Iff, Sort::Formula, vec![lhs, rhs], None),
    )
}

/// Select-over-update axioms for maps with `arity` indices.
fn map_update_axioms(arity: usize) -> Vec<Term> {
    let m = Term::var("m", Sort::Value);
    let v = Term::var("v", Sort::Value);
    let is: Vec<Term> = (0..arity).map(|k| Term::var(format!("i{k}"), Sort::Value)).collect();
    let js: Vec<Term> = (0..arity).map(|k| Term::var(format!("j{k}"), Sort::Value)).collect();

    let tuple = |items: &[Term]| Term::new(Op::Tuple, Sort::Value, items.to_vec(), None);
    let updated = Term::new(
        Op::MapUpdate,
        Sort::Value,
        vec![m.clone(), tuple(&is), v.clone()],
        None,
    );
    let select = |map: &Term, idx: &[Term]| {
        Term::new(Op::MapSelect, Sort::Value, vec![map.clone(), tuple(idx)], None)
    };

    let mut vars = vec![m.clone(), v.clone()];
    vars.extend(is.iter().cloned());
    let same = forall_plain(
        vars.clone(),
        Term::new(Op::Eq, Sort::Formula, vec![select(&updated, &is), v.clone()], None),
    );

    vars.extend(js.iter().cloned());
    let differs = Term::new(
        Op::Or,
        Sort::Formula,
        is.iter()
            .zip(&js)
            .map(|(i, j)| Term::new(Op::Neq, Sort::Formula, vec![i.clone(), j.clone()], None))
            .collect(),
        None,
    );
    let other = forall_plain(
        vars,
        Term::new(
            Op::Implies,
            Sort::Formula,
            vec![
                differs,
                Term::new(
                    Op::Eq,
                    Sort::Formula,
                    vec![select(&updated, &js), select(&m, &js)],
                    None,
                ),
            ],
            None,
        ),
    );
    vec![same, other]
}

fn term_true(t: Term) -> Term {
    Term::new(Op::Eq, Sort::Formula, vec![t, Term::bool_lit(true)], None)
}

fn forall_plain(vars: Vec<Term>, body: Term) -> Term {
    let mut children = vars;
    children.push(body);
    Term::new(Op::Forall, Sort::Formula, children, None)
}
