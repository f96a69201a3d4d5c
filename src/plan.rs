//! Two-phase projection rewrite (spec §4.7), grounded on the teacher's
//! expression-rewrite passes in
//! `datafusion/optimizer/src/eliminate_project.rs` and
//! `datafusion/optimizer/src/expr_rewriter/order_by.rs`: a single recursive
//! walk that finds the interesting sub-expressions (there: sort expressions
//! to splice into a projection; here: aggregate-function call sites) and
//! replaces them with synthetic references, the way `order_by.rs`
//! rewrites an order-by expression to point at an added projection column.

use crate::aggregate::AggKind;
use crate::error::{Result, StreamError};
use crate::expr::ast::{Expr, UnaryOp, WhenThen};
use crate::expr::parser;
use crate::expr::CompiledExpr;
use crate::functions::FunctionRegistry;

/// One pre-aggregation task: a synthetic aggregator id (`g_i`) plus the
/// kind of aggregate and the (optional — `COUNT(*)` has none) argument
/// expression evaluated per-record and fed to it.
#[derive(Debug, Clone)]
pub struct PreAggTask {
    pub id: String,
    pub kind: AggKind,
    pub arg: Option<CompiledExpr>,
}

/// One SELECT list output column: its name and the post-aggregation
/// expression (aggregate call sites already rewritten to `g_i` field refs).
#[derive(Debug, Clone)]
pub struct ProjectionColumn {
    pub name: String,
    pub post_agg: CompiledExpr,
}

/// The full result of rewriting a SELECT list: one column per output plus
/// every synthetic aggregate task discovered across all of them. Each
/// syntactic call site gets its own task even when textually identical to
/// another (`SUM(v)` appearing twice yields two independent accumulators),
/// since the spec models aggregator state per call site, not per distinct
/// expression.
pub struct ProjectionPlan {
    pub columns: Vec<ProjectionColumn>,
    pub tasks: Vec<PreAggTask>,
}

impl ProjectionPlan {
    pub fn is_aggregating(&self) -> bool {
        !self.tasks.is_empty()
    }
}

/// Builds a projection plan from `(output_name, expression_text)` pairs
/// (spec §6 "select list (name + expression text)").
pub fn build_projection_plan(
    columns: &[(String, String)],
    registry: &FunctionRegistry,
) -> Result<ProjectionPlan> {
    let mut tasks = Vec::new();
    let mut counter = 0usize;
    let mut out = Vec::with_capacity(columns.len());

    for (name, text) in columns {
        let ast = parser::parse(text)?;
        let rewritten = rewrite(&ast, registry, &mut tasks, &mut counter)?;
        out.push(ProjectionColumn {
            name: name.clone(),
            post_agg: CompiledExpr::from_ast(rewritten, text.clone()),
        });
    }

    Ok(ProjectionPlan {
        columns: out,
        tasks,
    })
}

fn rewrite(
    expr: &Expr,
    registry: &FunctionRegistry,
    tasks: &mut Vec<PreAggTask>,
    counter: &mut usize,
) -> Result<Expr> {
    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::Null | Expr::Field(_) => Ok(expr.clone()),
        Expr::Unary { op, expr: inner } => Ok(Expr::Unary {
            op: *op,
            expr: Box::new(rewrite(inner, registry, tasks, counter)?),
        }),
        Expr::Binary { op, left, right } => Ok(Expr::Binary {
            op: *op,
            left: Box::new(rewrite(left, registry, tasks, counter)?),
            right: Box::new(rewrite(right, registry, tasks, counter)?),
        }),
        Expr::Paren(inner) => Ok(Expr::Paren(Box::new(rewrite(
            inner, registry, tasks, counter,
        )?))),
        Expr::Case {
            scrutinee,
            whens,
            else_result,
        } => {
            let scrutinee = scrutinee
                .as_ref()
                .map(|s| rewrite(s, registry, tasks, counter))
                .transpose()?
                .map(Box::new);
            let whens = whens
                .iter()
                .map(|wt| {
                    Ok(WhenThen {
                        when: rewrite(&wt.when, registry, tasks, counter)?,
                        then: rewrite(&wt.then, registry, tasks, counter)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let else_result = else_result
                .as_ref()
                .map(|e| rewrite(e, registry, tasks, counter))
                .transpose()?
                .map(Box::new);
            Ok(Expr::Case {
                scrutinee,
                whens,
                else_result,
            })
        }
        Expr::Function { name, args } => {
            if registry.is_aggregate(name) {
                rewrite_aggregate(name, args, registry, tasks, counter)
            } else {
                let new_args = args
                    .iter()
                    .map(|a| rewrite(a, registry, tasks, counter))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::Function {
                    name: name.clone(),
                    args: new_args,
                })
            }
        }
    }
}

fn rewrite_aggregate(
    name: &str,
    args: &[Expr],
    registry: &FunctionRegistry,
    tasks: &mut Vec<PreAggTask>,
    counter: &mut usize,
) -> Result<Expr> {
    for a in args {
        if contains_aggregate(a, registry) {
            return Err(StreamError::parse(format!(
                "nested aggregates are not allowed: {name} received an aggregate argument"
            )));
        }
    }

    let is_count = name.eq_ignore_ascii_case("COUNT");
    let (kind, arg) = if is_count && args.is_empty() {
        (AggKind::CountStar, None)
    } else if is_count {
        if args.len() != 1 {
            return Err(StreamError::parse("COUNT(expr) takes exactly one argument"));
        }
        (AggKind::CountExpr, Some(args[0].clone()))
    } else if name.eq_ignore_ascii_case("NTH_VALUE") {
        if args.len() != 2 {
            return Err(StreamError::parse(
                "NTH_VALUE(expr, n) requires exactly two arguments",
            ));
        }
        let n = literal_int(&args[1])?;
        (AggKind::from_name(name, Some(n))?, Some(args[0].clone()))
    } else if name.eq_ignore_ascii_case("LEAD") {
        if args.is_empty() || args.len() > 2 {
            return Err(StreamError::parse(
                "LEAD(expr, [k]) requires one or two arguments",
            ));
        }
        let k = if args.len() == 2 {
            Some(literal_int(&args[1])?)
        } else {
            None
        };
        (AggKind::from_name(name, k)?, Some(args[0].clone()))
    } else {
        if args.len() != 1 {
            return Err(StreamError::parse(format!(
                "{name} takes exactly one argument"
            )));
        }
        (AggKind::from_name(name, None)?, Some(args[0].clone()))
    };

    let id = format!("g{}", *counter);
    *counter += 1;

    let compiled_arg = match arg {
        Some(e) => Some(CompiledExpr::from_ast(e, format!("{name}(...)"))),
        None => None,
    };

    tasks.push(PreAggTask {
        id: id.clone(),
        kind,
        arg: compiled_arg,
    });

    Ok(Expr::Field(id))
}

fn contains_aggregate(expr: &Expr, registry: &FunctionRegistry) -> bool {
    match expr {
        Expr::Number(_) | Expr::String(_) | Expr::Null | Expr::Field(_) => false,
        Expr::Unary { expr, .. } => contains_aggregate(expr, registry),
        Expr::Binary { left, right, .. } => {
            contains_aggregate(left, registry) || contains_aggregate(right, registry)
        }
        Expr::Paren(inner) => contains_aggregate(inner, registry),
        Expr::Case {
            scrutinee,
            whens,
            else_result,
        } => {
            scrutinee
                .as_deref()
                .map(|s| contains_aggregate(s, registry))
                .unwrap_or(false)
                || whens
                    .iter()
                    .any(|wt| contains_aggregate(&wt.when, registry) || contains_aggregate(&wt.then, registry))
                || else_result
                    .as_deref()
                    .map(|e| contains_aggregate(e, registry))
                    .unwrap_or(false)
        }
        Expr::Function { name, args } => {
            registry.is_aggregate(name) || args.iter().any(|a| contains_aggregate(a, registry))
        }
    }
}

fn literal_int(expr: &Expr) -> Result<i64> {
    match expr {
        Expr::Number(n) => Ok(*n as i64),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => Ok(-literal_int(expr)?),
        Expr::Paren(inner) => literal_int(inner),
        _ => Err(StreamError::parse(
            "expected a literal integer argument at plan time",
        )),
    }
}
