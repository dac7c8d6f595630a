//! Intermediate verification language.
//!
//! A routine body is a flat list of labeled commands. Control flow is
//! explicit: a command falls through to its successor unless it is a
//! `goto`, which jumps to any of its target labels. A `goto` with no
//! targets leaves the routine.
//!
//! Everything here is serializable so programs can be handed over as JSON.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a command within its body.
pub type NodeId = usize;

/// Types of variables and expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Int,
    Bool,
    /// `[indices]element`
    Map {
        indices: Vec<Type>,
        element: Box<Type>,
    },
    /// User-declared or otherwise opaque type.
    Named(String),
}

impl Type {
    pub fn map(indices: Vec<Type>, element: Type) -> Self {
        Type::Map {
            indices,
            element: Box::new(element),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Map { indices, element } => {
                write!(f, "[")?;
                for (i, t) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]{element}")
            }
            Type::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A typed variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Implies,
    Iff,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Implies => "==>",
            BinOp::Iff => "<==>",
        }
    }

    /// Whether the operator yields a boolean.
    pub fn is_boolean(&self) -> bool {
        !matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Bool(bool),
    Int(i64),
    Var(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Application of a declared function.
    App(String, Vec<Expr>),
    /// `map[indices]`
    Select(Box<Expr>, Vec<Expr>),
    /// `map[indices := value]`
    Update(Box<Expr>, Vec<Expr>, Box<Expr>),
    Forall(Vec<VarDecl>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn not(e: Expr) -> Self {
        Expr::Unary(UnOp::Not, Box::new(e))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::And, lhs, rhs)
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Eq, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Le, lhs, rhs)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, lhs, rhs)
    }

    pub fn app(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::App(name.into(), args)
    }

    /// Replace free variables. Variables bound by `forall` are untouched.
    pub fn substitute(&self, map: &HashMap<String, Expr>) -> Expr {
        match self {
            Expr::Bool(_) | Expr::Int(_) => self.clone(),
            Expr::Var(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            Expr::Unary(op, e) => Expr::Unary(*op, Box::new(e.substitute(map))),
            Expr::Binary(op, l, r) => {
                Expr::Binary(*op, Box::new(l.substitute(map)), Box::new(r.substitute(map)))
            }
            Expr::App(f, args) => {
                Expr::App(f.clone(), args.iter().map(|a| a.substitute(map)).collect())
            }
            Expr::Select(m, idx) => Expr::Select(
                Box::new(m.substitute(map)),
                idx.iter().map(|i| i.substitute(map)).collect(),
            ),
            Expr::Update(m, idx, v) => Expr::Update(
                Box::new(m.substitute(map)),
                idx.iter().map(|i| i.substitute(map)).collect(),
                Box::new(v.substitute(map)),
            ),
            Expr::Forall(vars, body) => {
                let mut inner: HashMap<String, Expr> = map
                    .iter()
                    .filter(|(k, _)| !vars.iter().any(|v| &v.name == *k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let incoming: BTreeSet<String> =
                    inner.values().flat_map(Expr::free_vars).collect();
                if !vars.iter().any(|v| incoming.contains(&v.name)) {
                    return Expr::Forall(vars.clone(), Box::new(body.substitute(&inner)));
                }

                // Rename binders that would capture a replacement's variable.
                let mut taken = body.names();
                taken.extend(incoming.iter().cloned());
                taken.extend(map.keys().cloned());
                let mut renamed = vars.clone();
                for var in renamed.iter_mut().filter(|v| incoming.contains(&v.name)) {
                    let fresh = (0u64..)
                        .map(|k| format!("{}$q{k}", var.name))
                        .find(|candidate| !taken.contains(candidate))
                        .unwrap_or_else(|| format!("{}$q", var.name));
                    taken.insert(fresh.clone());
                    inner.insert(var.name.clone(), Expr::Var(fresh.clone()));
                    var.name = fresh;
                }
                Expr::Forall(renamed, Box::new(body.substitute(&inner)))
            }
        }
    }

    /// Every variable name in the expression, bound or free.
    fn names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            match e {
                Expr::Bool(_) | Expr::Int(_) => {}
                Expr::Var(name) => {
                    out.insert(name.clone());
                }
                Expr::Unary(_, e) => stack.push(e),
                Expr::Binary(_, l, r) => stack.extend([l.as_ref(), r.as_ref()]),
                Expr::App(_, args) => stack.extend(args),
                Expr::Select(m, idx) => {
                    stack.push(m);
                    stack.extend(idx);
                }
                Expr::Update(m, idx, v) => {
                    stack.extend([m.as_ref(), v.as_ref()]);
                    stack.extend(idx);
                }
                Expr::Forall(vars, body) => {
                    out.extend(vars.iter().map(|v| v.name.clone()));
                    stack.push(body);
                }
            }
        }
        out
    }

    /// Free variables of the expression.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free_vars<'a>(&'a self, bound: &mut Vec<&'a str>, out: &mut BTreeSet<String>) {
        match self {
            Expr::Bool(_) | Expr::Int(_) => {}
            Expr::Var(name) => {
                if !bound.contains(&name.as_str()) {
                    out.insert(name.clone());
                }
            }
            Expr::Unary(_, e) => e.collect_free_vars(bound, out),
            Expr::Binary(_, l, r) => {
                l.collect_free_vars(bound, out);
                r.collect_free_vars(bound, out);
            }
            Expr::App(_, args) => args.iter().for_each(|a| a.collect_free_vars(bound, out)),
            Expr::Select(m, idx) => {
                m.collect_free_vars(bound, out);
                idx.iter().for_each(|i| i.collect_free_vars(bound, out));
            }
            Expr::Update(m, idx, v) => {
                m.collect_free_vars(bound, out);
                idx.iter().for_each(|i| i.collect_free_vars(bound, out));
                v.collect_free_vars(bound, out);
            }
            Expr::Forall(vars, body) => {
                let mark = bound.len();
                bound.extend(vars.iter().map(|v| v.name.as_str()));
                body.collect_free_vars(bound, out);
                bound.truncate(mark);
            }
        }
    }
}

fn fmt_list(items: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Unary(UnOp::Neg, e) => write!(f, "-{e}"),
            Expr::Unary(UnOp::Not, e) => write!(f, "!{e}"),
            Expr::Binary(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Expr::App(name, args) => {
                write!(f, "{name}(")?;
                fmt_list(args, f)?;
                write!(f, ")")
            }
            Expr::Select(m, idx) => {
                write!(f, "{m}[")?;
                fmt_list(idx, f)?;
                write!(f, "]")
            }
            Expr::Update(m, idx, v) => {
                write!(f, "{m}[")?;
                fmt_list(idx, f)?;
                write!(f, " := {v}]")
            }
            Expr::Forall(vars, body) => {
                write!(f, "(forall ")?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", v.name, v.ty)?;
                }
                write!(f, " :: {body})")
            }
        }
    }
}

/// A call site: `call results := callee(args)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// What a command does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Assert(Expr),
    Assume(Expr),
    /// Simultaneous assignment.
    Assign(Vec<(String, Expr)>),
    Havoc(Vec<String>),
    Call(CallSite),
    /// Nondeterministic jump; no targets means return.
    Goto(Vec<String>),
    NoOp,
}

/// A labeled command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub labels: Vec<String>,
    pub kind: CommandKind,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            labels: Vec::new(),
            kind,
        }
    }

    pub fn assert(e: Expr) -> Self {
        Self::new(CommandKind::Assert(e))
    }

    pub fn assume(e: Expr) -> Self {
        Self::new(CommandKind::Assume(e))
    }

    pub fn assign(var: impl Into<String>, e: Expr) -> Self {
        Self::new(CommandKind::Assign(vec![(var.into(), e)]))
    }

    pub fn havoc(vars: Vec<String>) -> Self {
        Self::new(CommandKind::Havoc(vars))
    }

    pub fn call(callee: impl Into<String>, results: Vec<String>, args: Vec<Expr>) -> Self {
        Self::new(CommandKind::Call(CallSite {
            callee: callee.into(),
            results,
            args,
        }))
    }

    pub fn goto(targets: &[&str]) -> Self {
        Self::new(CommandKind::Goto(
            targets.iter().map(|t| t.to_string()).collect(),
        ))
    }

    pub fn noop() -> Self {
        Self::new(CommandKind::NoOp)
    }

    /// Builder-style label.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn is_goto(&self) -> bool {
        matches!(self.kind, CommandKind::Goto(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{label}: ")?;
        }
        match &self.kind {
            CommandKind::Assert(e) => write!(f, "assert {e};"),
            CommandKind::Assume(e) => write!(f, "assume {e};"),
            CommandKind::Assign(pairs) => {
                let lhs: Vec<&str> = pairs.iter().map(|(v, _)| v.as_str()).collect();
                let rhs: Vec<Expr> = pairs.iter().map(|(_, e)| e.clone()).collect();
                write!(f, "{} := ", lhs.join(", "))?;
                fmt_list(&rhs, f)?;
                write!(f, ";")
            }
            CommandKind::Havoc(vars) => write!(f, "havoc {};", vars.join(", ")),
            CommandKind::Call(call) => {
                write!(f, "call ")?;
                if !call.results.is_empty() {
                    write!(f, "{} := ", call.results.join(", "))?;
                }
                write!(f, "{}(", call.callee)?;
                fmt_list(&call.args, f)?;
                write!(f, ");")
            }
            CommandKind::Goto(targets) if targets.is_empty() => write!(f, "return;"),
            CommandKind::Goto(targets) => write!(f, "goto {};", targets.join(", ")),
            CommandKind::NoOp => write!(f, "skip;"),
        }
    }
}

/// The command list of one routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Body {
    pub commands: Vec<Command>,
}

impl Body {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, node: NodeId) -> Option<&Command> {
        self.commands.get(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cmd in &self.commands {
            writeln!(f, "{cmd}")?;
        }
        Ok(())
    }
}

/// A declared function symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Type>,
    pub result: Type,
}

/// A procedure signature with its contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub args: Vec<VarDecl>,
    #[serde(default)]
    pub results: Vec<VarDecl>,
    #[serde(default)]
    pub requires: Vec<Expr>,
    /// One entry per modifies clause.
    #[serde(default)]
    pub modifies: Vec<Vec<String>>,
    #[serde(default)]
    pub ensures: Vec<Expr>,
}

impl Procedure {
    /// Whether the procedure has any pre, frame, or post condition.
    pub fn has_contract(&self) -> bool {
        !(self.requires.is_empty() && self.modifies.is_empty() && self.ensures.is_empty())
    }
}

/// An implementation to verify.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    #[serde(default)]
    pub args: Vec<VarDecl>,
    #[serde(default)]
    pub results: Vec<VarDecl>,
    #[serde(default)]
    pub locals: Vec<VarDecl>,
    pub body: Body,
    /// Source position for reports.
    #[serde(default)]
    pub location: Option<String>,
}

/// A whole program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub globals: Vec<VarDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    #[serde(default)]
    pub axioms: Vec<Expr>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub routines: Vec<Routine>,
}

impl Program {
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_renames_capturing_binder() {
        let e = Expr::Forall(
            vec![VarDecl::new("i", Type::Int)],
            Box::new(Expr::eq(Expr::var("x"), Expr::var("i"))),
        );
        let map = HashMap::from([("x".to_string(), Expr::var("i"))]);
        let out = e.substitute(&map);
        assert_eq!(out.to_string(), "(forall i$q0: int :: (i == i$q0))");
        assert_eq!(out.free_vars(), BTreeSet::from(["i".to_string()]));
    }

    #[test]
    fn substitute_skips_bound_variables() {
        let e = Expr::and(
            Expr::lt(Expr::var("x"), Expr::var("y")),
            Expr::Forall(
                vec![VarDecl::new("x", Type::Int)],
                Box::new(Expr::lt(Expr::var("x"), Expr::var("y"))),
            ),
        );
        let map = HashMap::from([
            ("x".to_string(), Expr::int(1)),
            ("y".to_string(), Expr::int(2)),
        ]);
        assert_eq!(
            e.substitute(&map).to_string(),
            "((1 < 2) && (forall x: int :: (x < 2)))"
        );
    }

    #[test]
    fn free_vars_of_quantified_expression() {
        let e = Expr::Forall(
            vec![VarDecl::new("i", Type::Int)],
            Box::new(Expr::eq(
                Expr::Select(Box::new(Expr::var("a")), vec![Expr::var("i")]),
                Expr::var("v"),
            )),
        );
        let fv: Vec<String> = e.free_vars().into_iter().collect();
        assert_eq!(fv, vec!["a", "v"]);
    }

    #[test]
    fn command_display() {
        let c = Command::call("Callee", vec!["w".into()], vec![Expr::var("v")]).labeled("L");
        assert_eq!(c.to_string(), "L: call w := Callee(v);");
        assert_eq!(Command::goto(&[]).to_string(), "return;");
        assert_eq!(Command::goto(&["A", "B"]).to_string(), "goto A, B;");
    }

    #[test]
    fn type_display() {
        let t = Type::map(vec![Type::Int, Type::Int], Type::Bool);
        assert_eq!(t.to_string(), "[int, int]bool");
    }

    #[test]
    fn program_json_round_trip() {
        let json = r#"{
            "globals": [{"name": "g", "ty": "int"}],
            "routines": [{
                "name": "main",
                "body": [
                    {"labels": ["start"], "kind": {"assign": [["g", {"int": 1}]]}},
                    {"kind": {"assert": {"binary": ["lt", {"int": 0}, {"var": "g"}]}}}
                ]
            }]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.routines[0].body.len(), 2);
        assert_eq!(
            program.routines[0].body.commands[1].to_string(),
            "assert (0 < g);"
        );
        let back = serde_json::to_string(&program).unwrap();
        let again: Program = serde_json::from_str(&back).unwrap();
        assert_eq!(program, again);
    }

    #[test]
    fn contract_detection() {
        let mut p = Procedure {
            name: "p".into(),
            ..Default::default()
        };
        assert!(!p.has_contract());
        p.modifies.push(vec!["g".into()]);
        assert!(p.has_contract());
    }
}
