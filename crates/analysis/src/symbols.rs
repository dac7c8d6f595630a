//! Symbol and type lookup.
//!
//! The analyses only need a narrow view of the program's declarations:
//! the type of a variable or expression, the contract of a callee, and the
//! flow graph of a body. [`TypeInfo`] is that view; [`SymbolTable`] and
//! [`RoutineScope`] implement it for a whole [`Program`].

use std::collections::HashMap;

use crate::flow_graph::{FlowGraph, FlowGraphError};
use crate::ir::{BinOp, Body, Expr, FunctionDecl, Procedure, Program, Routine, Type, UnOp};

/// Typed queries the analyses make about a program.
pub trait TypeInfo {
    /// Declared type of a variable visible at this point.
    fn variable_type(&self, name: &str) -> Option<Type>;

    /// Declaration of a function symbol.
    fn function(&self, name: &str) -> Option<&FunctionDecl>;

    /// Signature and contract of a callee.
    fn signature_of(&self, callee: &str) -> Option<&Procedure>;

    /// Type of an expression, or `None` if it mentions unknown symbols.
    fn type_of(&self, expr: &Expr) -> Option<Type> {
        infer(self, expr, &mut Vec::new())
    }

    /// Flow graph of a body.
    fn flow_graph(&self, body: &Body) -> Result<FlowGraph, FlowGraphError> {
        FlowGraph::from_body(body)
    }
}

/// Type of `expr` with `bound` holding the quantified variables in scope.
pub fn infer<T: TypeInfo + ?Sized>(
    info: &T,
    expr: &Expr,
    bound: &mut Vec<(String, Type)>,
) -> Option<Type> {
    match expr {
        Expr::Bool(_) => Some(Type::Bool),
        Expr::Int(_) => Some(Type::Int),
        Expr::Var(name) => bound
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
            .or_else(|| info.variable_type(name)),
        Expr::Unary(UnOp::Neg, _) => Some(Type::Int),
        Expr::Unary(UnOp::Not, _) => Some(Type::Bool),
        Expr::Binary(op, _, _) if op.is_boolean() => Some(Type::Bool),
        Expr::Binary(..) => Some(Type::Int),
        Expr::App(name, _) => info.function(name).map(|f| f.result.clone()),
        Expr::Select(map, _) => match infer(info, map, bound)? {
            Type::Map { element, .. } => Some(*element),
            _ => None,
        },
        Expr::Update(map, _, _) => infer(info, map, bound),
        Expr::Forall(..) => Some(Type::Bool),
    }
}

/// Whether `op` compares its operands (as opposed to combining booleans).
pub fn is_comparison(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
    )
}

/// Program-wide declarations.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    globals: HashMap<String, Type>,
    functions: HashMap<String, FunctionDecl>,
    procedures: HashMap<String, Procedure>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_program(program: &Program) -> Self {
        let mut table = Self::new();
        for g in &program.globals {
            table.globals.insert(g.name.clone(), g.ty.clone());
        }
        for f in &program.functions {
            table.functions.insert(f.name.clone(), f.clone());
        }
        for p in &program.procedures {
            table.insert_procedure(p.clone());
        }
        table
    }

    pub fn insert_procedure(&mut self, procedure: Procedure) {
        self.procedures.insert(procedure.name.clone(), procedure);
    }

    pub fn contains_procedure(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// View of the table from inside `routine`: its formals and locals
    /// shadow globals.
    pub fn scope<'a>(&'a self, routine: &Routine) -> RoutineScope<'a> {
        let locals = routine
            .args
            .iter()
            .chain(&routine.results)
            .chain(&routine.locals)
            .map(|v| (v.name.clone(), v.ty.clone()))
            .collect();
        RoutineScope {
            table: self,
            locals,
        }
    }
}

impl TypeInfo for SymbolTable {
    fn variable_type(&self, name: &str) -> Option<Type> {
        self.globals.get(name).cloned()
    }

    fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    fn signature_of(&self, callee: &str) -> Option<&Procedure> {
        self.procedures.get(callee)
    }
}

/// Symbols visible inside one routine.
#[derive(Debug, Clone)]
pub struct RoutineScope<'a> {
    table: &'a SymbolTable,
    locals: HashMap<String, Type>,
}

impl RoutineScope<'_> {
    /// Declare an extra local, such as a fresh variable introduced by a
    /// transformation.
    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.locals.insert(name.into(), ty);
    }
}

impl TypeInfo for RoutineScope<'_> {
    fn variable_type(&self, name: &str) -> Option<Type> {
        self.locals
            .get(name)
            .cloned()
            .or_else(|| self.table.variable_type(name))
    }

    fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.table.function(name)
    }

    fn signature_of(&self, callee: &str) -> Option<&Procedure> {
        self.table.signature_of(callee)
    }
}
