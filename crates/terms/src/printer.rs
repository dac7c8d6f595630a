//! Prover wire syntax for terms.
//!
//! Implements `Display` for [`Term`], producing the prefix, uppercase
//! s-expression syntax spoken by Simplify-compatible provers. The output is
//! always a single line.

use std::fmt;

use crate::sort::Sort;
use crate::term::{Op, Payload, Term};

/// Prefix of term-level boolean literals on the wire.
pub const TERM_PREFIX: &str = "term$$";

impl Op {
    /// Wire keyword, for operators printed as `(KEYWORD args...)`.
    pub fn keyword(&self) -> &str {
        match self {
            Op::And => "AND",
            Op::Or => "OR",
            Op::Not => "NOT",
            Op::Implies => "IMPLIES",
            Op::Iff => "IFF",
            Op::Forall => "FORALL",
            Op::Eq => "EQ",
            Op::Neq => "NEQ",
            Op::Distinct => "DISTINCT",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::TNand => "TNAND",
            Op::TLt => "T<",
            Op::TEq => "TEQ",
            Op::TEqInt => "TEQ_INT",
            Op::TEqBool => "TEQ_BOOL",
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::MapSelect => "MAP_SELECT",
            Op::MapUpdate => "MAP_UPDATE",
            Op::Tuple => "",
            Op::App(name) => name,
            Op::Var | Op::Lit => "",
        }
    }
}

/// Write a space-separated list of terms.
fn fmt_term_list(terms: &[Term], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

fn fmt_literal(term: &Term, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (term.payload(), term.sort()) {
        (Some(Payload::Int(n)), _) if *n < 0 => write!(f, "(- 0 {})", n.unsigned_abs()),
        (Some(Payload::Int(n)), _) => write!(f, "{n}"),
        (Some(Payload::Bool(true)), Sort::Formula) => write!(f, "TRUE"),
        (Some(Payload::Bool(false)), Sort::Formula) => write!(f, "FALSE"),
        (Some(Payload::Bool(true)), _) => write!(f, "{TERM_PREFIX}TRUE"),
        (Some(Payload::Bool(false)), _) => write!(f, "{TERM_PREFIX}FALSE"),
        (Some(Payload::Name(name)), _) => write!(f, "{name}"),
        (None, _) => write!(f, "?"),
    }
}

/// Number of indices of a map operation: the width of its tuple argument.
pub fn index_arity(children: &[Term]) -> usize {
    match children.get(1) {
        Some(idx) if *idx.op() == Op::Tuple => idx.children().len(),
        Some(_) => 1,
        None => 0,
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children = self.children();
        match self.op() {
            Op::Var => write!(f, "{}", self.name().unwrap_or("?")),
            Op::Lit => fmt_literal(self, f),

            // Empty connectives collapse to their unit.
            Op::And if children.is_empty() => write!(f, "TRUE"),
            Op::Or if children.is_empty() => write!(f, "FALSE"),

            Op::Forall => {
                let (vars, body) = children.split_at(children.len().saturating_sub(1));
                write!(f, "(FORALL (")?;
                fmt_term_list(vars, f)?;
                write!(f, ") ")?;
                fmt_term_list(body, f)?;
                write!(f, ")")
            }

            Op::Neg => {
                write!(f, "(- 0 ")?;
                fmt_term_list(children, f)?;
                write!(f, ")")
            }

            // Tuples are spliced into the enclosing application, so map
            // operators carry their index arity in the symbol.
            Op::Tuple => fmt_term_list(children, f),
            Op::MapSelect | Op::MapUpdate => {
                write!(f, "({}{}", self.op().keyword(), index_arity(children))?;
                for child in children {
                    write!(f, " {child}")?;
                }
                write!(f, ")")
            }

            Op::App(name) if children.is_empty() => write!(f, "{name}"),

            op => {
                write!(f, "({}", op.keyword())?;
                for child in children {
                    write!(f, " {child}")?;
                }
                write!(f, ")")
            }
        }
    }
}
