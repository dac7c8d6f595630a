//! Weakest-precondition and strongest-postcondition VC generation.
//!
//! Both transformers work on an acyclic flow graph (loops cut after havoc
//! insertion) and evaluate every node once, in topological order for SP
//! and in reverse topological order for WP.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ivl_vc_terms::rewrite::substitute;
use ivl_vc_terms::{Term, TermBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::{ExprEncoder, rename_entries, term_name};
use crate::flow_graph::{FlowGraph, FlowGraphError};
use crate::ir::{Body, Command, CommandKind, Expr, NodeId, Type};
use crate::symbols::TypeInfo;

/// Errors raised while computing a verification condition.
///
/// All of them indicate a malformed routine or a bug upstream; none is
/// recoverable by retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcError {
    #[error("flow graph of `{0}` is cyclic")]
    CyclicFlowGraph(String),
    #[error("flow graph has {graph} nodes but the body has {body} commands")]
    GraphMismatch { graph: usize, body: usize },
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("ill-typed expression `{0}`")]
    IllTyped(String),
    #[error("call to `{0}` was not desugared")]
    UndesugaredCall(String),
    #[error("quantifier in term position: `{0}`")]
    QuantifierInTerm(String),
    #[error(transparent)]
    FlowGraph(#[from] FlowGraphError),
}

/// Direction of VC generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcMethod {
    /// Weakest precondition, computed backwards from the exits.
    #[default]
    Wp,
    /// Strongest postcondition, computed forwards from the entry.
    Sp,
}

impl fmt::Display for VcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcMethod::Wp => write!(f, "wp"),
            VcMethod::Sp => write!(f, "sp"),
        }
    }
}

impl FromStr for VcMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wp" => Ok(VcMethod::Wp),
            "sp" => Ok(VcMethod::Sp),
            _ => Err(format!("Unknown VC method: {s}. Valid options: wp, sp")),
        }
    }
}

/// Computes the verification condition of a routine body.
#[derive(Debug, Clone, Copy)]
pub struct PredicateTransformer<'a> {
    builder: &'a TermBuilder,
    method: VcMethod,
    assume_asserts: bool,
}

impl<'a> PredicateTransformer<'a> {
    pub fn new(builder: &'a TermBuilder, method: VcMethod) -> Self {
        Self {
            builder,
            method,
            assume_asserts: false,
        }
    }

    /// Let later commands assume the conditions of earlier asserts.
    pub fn with_assume_asserts(mut self, assume_asserts: bool) -> Self {
        self.assume_asserts = assume_asserts;
        self
    }

    pub fn method(&self) -> VcMethod {
        self.method
    }

    /// Verification condition of `body` over the acyclic `graph`.
    ///
    /// `name` only labels errors and log lines.
    pub fn vc(
        &self,
        name: &str,
        body: &Body,
        graph: &FlowGraph,
        info: &dyn TypeInfo,
    ) -> Result<Term, VcError> {
        if graph.len() != body.len() {
            return Err(VcError::GraphMismatch {
                graph: graph.len(),
                body: body.len(),
            });
        }
        let order = graph
            .topological_order()
            .ok_or_else(|| VcError::CyclicFlowGraph(name.to_string()))?;

        let mut ctx = VcContext::new(self, body, graph, info);
        let vc = match self.method {
            VcMethod::Wp => ctx.wp(&order)?,
            VcMethod::Sp => ctx.sp(&order)?,
        };
        tracing::debug!(routine = %name, method = %self.method, nodes = body.len(), "computed vc");
        Ok(vc)
    }
}

/// Per-call state: the memoized pre- and postconditions of every node.
struct VcContext<'a, 'b> {
    transformer: &'b PredicateTransformer<'a>,
    body: &'b Body,
    graph: &'b FlowGraph,
    encoder: ExprEncoder<'b>,
    pre: Vec<Option<Term>>,
    post: Vec<Option<Term>>,
}

impl<'a: 'b, 'b> VcContext<'a, 'b> {
    fn new(
        transformer: &'b PredicateTransformer<'a>,
        body: &'b Body,
        graph: &'b FlowGraph,
        info: &'b dyn TypeInfo,
    ) -> Self {
        Self {
            transformer,
            body,
            graph,
            encoder: ExprEncoder::new(transformer.builder, info),
            pre: vec![None; body.len()],
            post: vec![None; body.len()],
        }
    }

    fn builder(&self) -> &'b TermBuilder {
        self.encoder.builder()
    }

    fn command(&self, node: NodeId) -> &'b Command {
        &self.body.commands[node]
    }

    fn memo(table: &[Option<Term>], node: NodeId) -> Term {
        // Topological order guarantees the entry is filled before use.
        table[node].clone().unwrap_or_else(|| Term::formula(true))
    }

    // ------------------------------------------------------------------
    // Weakest precondition
    // ------------------------------------------------------------------

    fn wp(&mut self, order: &[NodeId]) -> Result<Term, VcError> {
        for &node in order.iter().rev() {
            let succs: Vec<Term> = self
                .graph
                .successors(node)
                .iter()
                .map(|&s| Self::memo(&self.pre, s))
                .collect();
            let post = self.builder().and(succs);
            let pre = self.wp_transfer(node, post.clone())?;
            self.post[node] = Some(post);
            self.pre[node] = Some(pre);
        }
        Ok(match self.graph.entry() {
            Some(entry) => Self::memo(&self.pre, entry),
            None => Term::formula(true),
        })
    }

    fn wp_transfer(&mut self, node: NodeId, post: Term) -> Result<Term, VcError> {
        let b = self.builder();
        let cmd = self.command(node);
        Ok(match &cmd.kind {
            CommandKind::Assert(cond) => {
                let cond = self.encoder.formula(cond)?;
                let rest = if self.transformer.assume_asserts {
                    b.implies(cond.clone(), post)
                } else {
                    post
                };
                b.and(vec![cond, rest])
            }
            CommandKind::Assume(cond) => b.implies(self.encoder.formula(cond)?, post),
            CommandKind::Assign(pairs) => {
                let mut map = HashMap::new();
                for (var, expr) in pairs {
                    map.extend(self.assignment_entries(var, expr)?);
                }
                substitute(&post, &map)
            }
            CommandKind::Havoc(vars) => {
                let map = self.havoc_map(vars)?;
                substitute(&post, &map)
            }
            CommandKind::Goto(_) | CommandKind::NoOp => post,
            CommandKind::Call(call) => return Err(VcError::UndesugaredCall(call.callee.clone())),
        })
    }

    /// `var := expr` as a substitution of both prover sides of `var`.
    fn assignment_entries(&mut self, var: &str, expr: &Expr) -> Result<Vec<(String, Term)>, VcError> {
        let ty = self.encoder.variable_type(var)?;
        let mut out = vec![(term_name(var), self.encoder.term(expr)?)];
        if ty == Type::Bool {
            out.push((var.to_string(), self.encoder.formula(expr)?));
        }
        Ok(out)
    }

    /// Rename each of `vars` to a fresh version.
    fn havoc_map(&mut self, vars: &[String]) -> Result<HashMap<String, Term>, VcError> {
        let mut map = HashMap::new();
        for var in vars {
            let ty = self.encoder.variable_type(var)?;
            let fresh = self.encoder.fresh_variable(var, &ty);
            map.extend(rename_entries(var, &fresh));
        }
        Ok(map)
    }

    // ------------------------------------------------------------------
    // Strongest postcondition
    // ------------------------------------------------------------------

    fn sp(&mut self, order: &[NodeId]) -> Result<Term, VcError> {
        let entry = self.graph.entry();
        let mut obligations = Vec::new();
        for &node in order {
            let pre = if Some(node) == entry {
                Term::formula(true)
            } else {
                let preds: Vec<Term> = self
                    .graph
                    .predecessors(node)
                    .iter()
                    .map(|&p| Self::memo(&self.post, p))
                    .collect();
                // No predecessors: unreachable, so FALSE.
                self.builder().or(preds)
            };
            if let CommandKind::Assert(cond) = &self.command(node).kind {
                let cond = self.encoder.formula(cond)?;
                obligations.push(self.builder().implies(pre.clone(), cond));
            }
            let post = self.sp_transfer(node, pre.clone())?;
            self.pre[node] = Some(pre);
            self.post[node] = Some(post);
        }
        Ok(self.builder().and(obligations))
    }

    fn sp_transfer(&mut self, node: NodeId, pre: Term) -> Result<Term, VcError> {
        let b = self.builder();
        let cmd = self.command(node);
        Ok(match &cmd.kind {
            CommandKind::Assert(cond) => {
                if self.transformer.assume_asserts {
                    b.and(vec![pre, self.encoder.formula(cond)?])
                } else {
                    pre
                }
            }
            CommandKind::Assume(cond) => b.and(vec![pre, self.encoder.formula(cond)?]),
            CommandKind::Assign(pairs) => {
                let vars: Vec<String> = pairs.iter().map(|(v, _)| v.clone()).collect();
                let old = self.havoc_map(&vars)?;
                let mut conjuncts = vec![substitute(&pre, &old)];
                for (var, expr) in pairs {
                    let ty = self.encoder.variable_type(var)?;
                    let current = self.encoder.variable(var, &ty);
                    let eq = match current.formula {
                        Some(f) => b.iff(f, self.encoder.formula(expr)?),
                        None => b.eq(current.term, self.encoder.term(expr)?),
                    };
                    conjuncts.push(substitute_rhs(&eq, &old, &current_names(var)));
                }
                b.and(conjuncts)
            }
            CommandKind::Havoc(vars) => {
                let map = self.havoc_map(vars)?;
                substitute(&pre, &map)
            }
            CommandKind::Goto(_) | CommandKind::NoOp => pre,
            CommandKind::Call(call) => return Err(VcError::UndesugaredCall(call.callee.clone())),
        })
    }
}

/// Prover names of the post-state side of `var` in an SP equation.
fn current_names(var: &str) -> [String; 2] {
    [term_name(var), var.to_string()]
}

/// Apply `old` to the right-hand side of the equation `eq`, leaving its
/// left-hand side (the new value of the assigned variable) alone.
fn substitute_rhs(eq: &Term, old: &HashMap<String, Term>, lhs_names: &[String; 2]) -> Term {
    let children = eq.children();
    let (Some(lhs), Some(rhs)) = (children.first(), children.get(1)) else {
        return eq.clone();
    };
    debug_assert!(lhs.name().is_some_and(|n| lhs_names.iter().any(|m| m == n)));
    eq.with_children(vec![lhs.clone(), substitute(rhs, old)])
}
