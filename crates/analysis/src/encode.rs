//! Encode IVL expressions as prover terms.
//!
//! Every expression has two encodings. In formula position it becomes a
//! predicate the prover can assert; in term position it becomes a value
//! that can be passed to functions, stored in maps, or compared.
//!
//! Non-boolean variables exist only as terms, named `term$$x`. Boolean
//! variables exist on both sides: the formula `x` and the term `term$$x`,
//! linked by the axiom `(IFF x (EQ term$$x term$$TRUE))` that the term
//! side carries.
use std::collections::HashMap;

use ivl_vc_terms::printer::TERM_PREFIX;
use ivl_vc_terms::{Op, Payload, Sort, Term, TermBuilder};

use crate::ir::{BinOp, Expr, Type, UnOp, VarDecl};
use crate::symbols::{TypeInfo, infer};
use crate::transformer::VcError;

/// Prover sort of an IVL type.
pub fn sort_of(ty: &Type) -> Sort {
    match ty {
        Type::Int => Sort::Int,
        Type::Bool => Sort::Bool,
        Type::Map { .. } | Type::Named(_) => Sort::Value,
    }
}

/// Wire name of the term side of variable `name`.
pub fn term_name(name: &str) -> String {
    format!("{TERM_PREFIX}{name}")
}

/// Substitution entries mapping the prover variables of `name` to `to`.
pub fn rename_entries(name: &str, to: &VarTerms) -> Vec<(String, Term)> {
    let mut out = vec![(term_name(name), to.term.clone())];
    if let Some(formula) = &to.formula {
        out.push((name.to_string(), formula.clone()));
    }
    out
}

/// The prover variables standing for one IVL variable.
#[derive(Debug, Clone)]
pub struct VarTerms {
    pub term: Term,
    /// Formula side; only booleans have one.
    pub formula: Option<Term>,
}

/// Expression encoder for one routine (or the global scope).
pub struct ExprEncoder<'a> {
    builder: &'a TermBuilder,
    types: &'a dyn TypeInfo,
    bound: Vec<(String, Type)>,
    bool_vars: HashMap<String, VarTerms>,
}

impl<'a> ExprEncoder<'a> {
    pub fn new(builder: &'a TermBuilder, types: &'a dyn TypeInfo) -> Self {
        Self {
            builder,
            types,
            bound: Vec::new(),
            bool_vars: HashMap::new(),
        }
    }

    pub fn builder(&self) -> &'a TermBuilder {
        self.builder
    }

    pub fn types(&self) -> &'a dyn TypeInfo {
        self.types
    }

    /// Declared type of a program variable.
    pub fn variable_type(&self, name: &str) -> Result<Type, VcError> {
        self.types
            .variable_type(name)
            .ok_or_else(|| VcError::UnknownVariable(name.to_string()))
    }

    /// Prover variables for `name` of type `ty`.
    ///
    /// Boolean pairs are built once per encoder so that their linking
    /// axiom is a single node however often the variable occurs.
    pub fn variable(&mut self, name: &str, ty: &Type) -> VarTerms {
        if *ty != Type::Bool {
            return VarTerms {
                term: self.builder.var(term_name(name), sort_of(ty)),
                formula: None,
            };
        }
        if let Some(pair) = self.bool_vars.get(name) {
            return pair.clone();
        }
        let formula = self.builder.var(name, Sort::Formula);
        let plain = self.builder.var(term_name(name), Sort::Bool);
        let link = self.builder.iff(
            formula.clone(),
            self.builder.eq(plain, self.builder.bool_lit(true)),
        );
        let term = Term::with_axioms(
            Op::Var,
            Sort::Bool,
            Vec::new(),
            Some(Payload::Name(term_name(name))),
            vec![link],
        );
        let pair = VarTerms {
            term,
            formula: Some(formula),
        };
        self.bool_vars.insert(name.to_string(), pair.clone());
        pair
    }

    /// Fresh prover variables standing for a new version of `name`.
    pub fn fresh_variable(&mut self, name: &str, ty: &Type) -> VarTerms {
        let fresh = self.builder.fresh_name(name);
        self.variable(&fresh, ty)
    }

    /// Formula encoding of a boolean expression.
    pub fn formula(&mut self, expr: &Expr) -> Result<Term, VcError> {
        let b = self.builder;
        Ok(match expr {
            Expr::Bool(v) => b.formula(*v),
            Expr::Var(name) => {
                if self.is_bound(name) {
                    let t = self.term(expr)?;
                    return Ok(b.eq(t, b.bool_lit(true)));
                }
                let ty = self.variable_type(name)?;
                match self.variable(name, &ty).formula {
                    Some(f) => f,
                    None => b.eq(self.term(expr)?, b.bool_lit(true)),
                }
            }
            Expr::Unary(UnOp::Not, e) => b.not(self.formula(e)?),
            Expr::Binary(op, l, r) => self.binary_formula(*op, l, r)?,
            Expr::Forall(vars, body) => self.quantified(vars, body)?,
            Expr::Unary(UnOp::Neg, _) | Expr::Int(_) => {
                return Err(VcError::IllTyped(expr.to_string()));
            }
            Expr::App(..) | Expr::Select(..) | Expr::Update(..) => {
                b.eq(self.term(expr)?, b.bool_lit(true))
            }
        })
    }

    fn binary_formula(&mut self, op: BinOp, l: &Expr, r: &Expr) -> Result<Term, VcError> {
        let b = self.builder;
        Ok(match op {
            BinOp::And => b.and(vec![self.formula(l)?, self.formula(r)?]),
            BinOp::Or => b.or(vec![self.formula(l)?, self.formula(r)?]),
            BinOp::Implies => b.implies(self.formula(l)?, self.formula(r)?),
            BinOp::Iff => b.iff(self.formula(l)?, self.formula(r)?),
            BinOp::Eq | BinOp::Neq => {
                let atom = if self.operand_type(l, r) == Some(Type::Bool) {
                    b.iff(self.formula(l)?, self.formula(r)?)
                } else {
                    b.eq(self.term(l)?, self.term(r)?)
                };
                if op == BinOp::Neq { b.not(atom) } else { atom }
            }
            BinOp::Lt => b.lt(self.term(l)?, self.term(r)?),
            BinOp::Le => b.le(self.term(l)?, self.term(r)?),
            BinOp::Gt => b.lt(self.term(r)?, self.term(l)?),
            BinOp::Ge => b.le(self.term(r)?, self.term(l)?),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                return Err(VcError::IllTyped(Expr::binary(op, l.clone(), r.clone()).to_string()));
            }
        })
    }

    fn quantified(&mut self, vars: &[VarDecl], body: &Expr) -> Result<Term, VcError> {
        let bound: Vec<Term> = vars
            .iter()
            .map(|v| self.builder.var(term_name(&v.name), sort_of(&v.ty)))
            .collect();
        let depth = self.bound.len();
        self.bound
            .extend(vars.iter().map(|v| (v.name.clone(), v.ty.clone())));
        let encoded = self.formula(body);
        self.bound.truncate(depth);
        Ok(self.builder.forall(bound, encoded?))
    }

    /// Term encoding of an expression.
    pub fn term(&mut self, expr: &Expr) -> Result<Term, VcError> {
        let b = self.builder;
        Ok(match expr {
            Expr::Bool(v) => b.bool_lit(*v),
            Expr::Int(n) => b.int(i128::from(*n)),
            Expr::Var(name) => {
                if let Some(ty) = self.bound_type(name) {
                    return Ok(b.var(term_name(name), sort_of(&ty)));
                }
                let ty = self.variable_type(name)?;
                self.variable(name, &ty).term
            }
            Expr::Unary(UnOp::Neg, e) => b.mk(Op::Neg, Sort::Int, vec![self.term(e)?]),
            Expr::Unary(UnOp::Not, e) => b.tnot(self.term(e)?),
            Expr::Binary(op, l, r) => self.binary_term(*op, l, r)?,
            Expr::App(name, args) => {
                let sort = self.type_of(expr).map(|t| sort_of(&t)).unwrap_or(Sort::Value);
                let args = args.iter().map(|a| self.term(a)).collect::<Result<_, _>>()?;
                b.app(name.clone(), sort, args)
            }
            Expr::Select(map, indices) => {
                let sort = self.type_of(expr).map(|t| sort_of(&t)).unwrap_or(Sort::Value);
                let map = self.term(map)?;
                let indices = indices.iter().map(|i| self.term(i)).collect::<Result<_, _>>()?;
                b.select(map, indices, sort)
            }
            Expr::Update(map, indices, value) => {
                let map = self.term(map)?;
                let indices = indices.iter().map(|i| self.term(i)).collect::<Result<_, _>>()?;
                let value = self.term(value)?;
                b.update(map, indices, value)
            }
            Expr::Forall(..) => return Err(VcError::QuantifierInTerm(expr.to_string())),
        })
    }

    fn binary_term(&mut self, op: BinOp, l: &Expr, r: &Expr) -> Result<Term, VcError> {
        let b = self.builder;
        let arith = |op: Op, enc: &mut Self| -> Result<Term, VcError> {
            Ok(b.mk(op, Sort::Int, vec![enc.term(l)?, enc.term(r)?]))
        };
        Ok(match op {
            BinOp::Add => arith(Op::Add, self)?,
            BinOp::Sub => arith(Op::Sub, self)?,
            BinOp::Mul => arith(Op::Mul, self)?,
            BinOp::Div => arith(Op::Div, self)?,
            BinOp::Mod => arith(Op::Mod, self)?,
            BinOp::And => b.tand(self.term(l)?, self.term(r)?),
            BinOp::Or => b.tor(self.term(l)?, self.term(r)?),
            BinOp::Implies => b.timplies(self.term(l)?, self.term(r)?),
            BinOp::Iff => b.mk(Op::TEqBool, Sort::Bool, vec![self.term(l)?, self.term(r)?]),
            BinOp::Eq | BinOp::Neq => {
                let eq_op = match self.operand_type(l, r) {
                    Some(Type::Int) => Op::TEqInt,
                    Some(Type::Bool) => Op::TEqBool,
                    _ => Op::TEq,
                };
                let eq = b.mk(eq_op, Sort::Bool, vec![self.term(l)?, self.term(r)?]);
                if op == BinOp::Neq { b.tnot(eq) } else { eq }
            }
            BinOp::Lt => b.mk(Op::TLt, Sort::Bool, vec![self.term(l)?, self.term(r)?]),
            BinOp::Gt => b.mk(Op::TLt, Sort::Bool, vec![self.term(r)?, self.term(l)?]),
            BinOp::Le => {
                let gt = b.mk(Op::TLt, Sort::Bool, vec![self.term(r)?, self.term(l)?]);
                b.tnot(gt)
            }
            BinOp::Ge => {
                let lt = b.mk(Op::TLt, Sort::Bool, vec![self.term(l)?, self.term(r)?]);
                b.tnot(lt)
            }
        })
    }

    fn is_bound(&self, name: &str) -> bool {
        self.bound_type(name).is_some()
    }

    fn bound_type(&self, name: &str) -> Option<Type> {
        self.bound
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
    }

    fn type_of(&mut self, expr: &Expr) -> Option<Type> {
        infer(self.types, expr, &mut self.bound)
    }

    fn operand_type(&mut self, l: &Expr, r: &Expr) -> Option<Type> {
        self.type_of(l).or_else(|| self.type_of(r))
    }
}
