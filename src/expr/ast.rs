//! Expression AST (spec §3).
//!
//! Invariants enforced at construction time by the parser (never by this
//! module alone): every binary `Operator` node has both children; `Case` has
//! at least one when-clause; a `Function` node's argument count matches the
//! registered callable's arity (checked again at evaluate time, per spec
//! §4.2 "Arity validation at parse time AND execute time").

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone)]
pub struct WhenThen {
    pub when: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    String(String),
    /// The bare `NULL` literal, e.g. in `CASE ... ELSE NULL END`.
    Null,
    /// A field-path literal, e.g. `device.info.name`.
    Field(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    /// Parenthesized subexpression, kept for reconstruction/printing; its
    /// evaluation is identity (spec §4.2).
    Paren(Box<Expr>),
    Case {
        scrutinee: Option<Box<Expr>>,
        whens: Vec<WhenThen>,
        else_result: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Returns the set of top-level field names reachable in the AST, used
    /// by the stream runtime to prune work (spec §4.2 "Fields used").
    pub fn get_fields(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut HashSet<String>) {
        match self {
            Expr::Number(_) | Expr::String(_) | Expr::Null => {}
            Expr::Field(name) => {
                let top = name.split(['.', '[']).next().unwrap_or(name);
                out.insert(top.to_string());
            }
            Expr::Unary { expr, .. } => expr.collect_fields(out),
            Expr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Function { args, .. } => {
                for a in args {
                    a.collect_fields(out);
                }
            }
            Expr::Paren(e) => e.collect_fields(out),
            Expr::Case {
                scrutinee,
                whens,
                else_result,
            } => {
                if let Some(s) = scrutinee {
                    s.collect_fields(out);
                }
                for wt in whens {
                    wt.when.collect_fields(out);
                    wt.then.collect_fields(out);
                }
                if let Some(e) = else_result {
                    e.collect_fields(out);
                }
            }
        }
    }

    /// True if this node (or, for `Paren`, what it wraps) is a call to
    /// `name` (case-insensitive) — used by the two-phase rewrite to spot
    /// aggregate-function call sites.
    pub fn as_function(&self) -> Option<(&str, &[Expr])> {
        match self {
            Expr::Function { name, args } => Some((name.as_str(), args.as_slice())),
            Expr::Paren(inner) => inner.as_function(),
            _ => None,
        }
    }
}
