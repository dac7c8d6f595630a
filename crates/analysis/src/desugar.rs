//! Call desugaring.
//!
//! Calls are verified modularly against the callee's contract:
//!
//! ```text
//! call w := Callee(v)     ~~>     assert P(v);
//!                                 havoc H;
//!                                 assume Q(v, w);
//! ```
//!
//! where `Callee(a) returns (r)` requires `P(a)`, modifies `H`, and ensures
//! `Q(a, r)`.

use std::collections::HashMap;

use thiserror::Error;

use crate::ir::{Body, CallSite, Command, CommandKind, Expr, Procedure};
use crate::symbols::TypeInfo;

/// Structural errors in calls. These abort processing of the program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesugarError {
    #[error("call to undeclared procedure `{0}`")]
    UnknownCallee(String),
    #[error("`{callee}` declares {expected} {what} but {found} were supplied")]
    ArityMismatch {
        callee: String,
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Replace every call in `body` by its contract.
pub fn desugar_calls(body: &Body, info: &dyn TypeInfo) -> Result<Body, DesugarError> {
    let mut commands = Vec::with_capacity(body.len());
    let mut calls = 0usize;
    for cmd in body.iter() {
        match &cmd.kind {
            CommandKind::Call(call) => {
                let sig = info
                    .signature_of(&call.callee)
                    .ok_or_else(|| DesugarError::UnknownCallee(call.callee.clone()))?;
                commands.extend(desugar_call(&cmd.labels, call, sig)?);
                calls += 1;
            }
            _ => commands.push(cmd.clone()),
        }
    }
    tracing::trace!(calls, "desugared calls");
    Ok(Body::new(commands))
}

/// Expand one call. Only the first emitted command carries `labels`.
pub fn desugar_call(
    labels: &[String],
    call: &CallSite,
    sig: &Procedure,
) -> Result<Vec<Command>, DesugarError> {
    check_arity(&sig.name, "results", sig.results.len(), call.results.len())?;
    check_arity(&sig.name, "arguments", sig.args.len(), call.args.len())?;

    let mut subst: HashMap<String, Expr> = HashMap::new();
    for (formal, actual) in sig.results.iter().zip(&call.results) {
        subst.insert(formal.name.clone(), Expr::Var(actual.clone()));
    }
    for (formal, actual) in sig.args.iter().zip(&call.args) {
        subst.insert(formal.name.clone(), actual.clone());
    }

    let mut out = Vec::new();
    for pre in &sig.requires {
        out.push(Command::assert(pre.substitute(&subst)));
    }
    for clause in &sig.modifies {
        let vars = clause.iter().map(|v| rename(v, &subst)).collect();
        out.push(Command::havoc(vars));
    }
    for post in &sig.ensures {
        out.push(Command::assume(post.substitute(&subst)));
    }
    if out.is_empty() {
        out.push(Command::assume(Expr::Bool(true)));
    }
    out[0].labels = labels.to_vec();
    Ok(out)
}

fn check_arity(
    callee: &str,
    what: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), DesugarError> {
    if expected == found {
        return Ok(());
    }
    Err(DesugarError::ArityMismatch {
        callee: callee.to_string(),
        what,
        expected,
        found,
    })
}

fn rename(var: &str, subst: &HashMap<String, Expr>) -> String {
    match subst.get(var) {
        Some(Expr::Var(actual)) => actual.clone(),
        _ => var.to_string(),
    }
}
