//! Expression evaluation (spec §4.2).
//!
//! Three modes: numeric (legacy, for arithmetic contexts), typed-with-NULL
//! (preserves original value types, signals NULL explicitly), and boolean
//! (for WHERE/HAVING/CASE-WHEN).

use std::cmp::Ordering;
use std::collections::HashSet;

use super::ast::{BinOp, Expr, UnaryOp};
use super::parser::parse;
use crate::error::{Result, StreamError};
use crate::functions::{FnContext, FunctionRegistry};
use crate::value::{case_eq, get_field, partial_cmp, Record, Value};

/// A parsed, reusable expression. Construction validates grammar; arity of
/// function calls is *not* re-validated here beyond what `evaluate` does
/// each call (spec §4.2: "Arity validation at parse time AND execute time").
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ast: Expr,
    fields: HashSet<String>,
    text: String,
}

impl CompiledExpr {
    pub fn parse(text: &str) -> Result<Self> {
        let ast = parse(text)?;
        let fields = ast.get_fields();
        Ok(CompiledExpr {
            ast,
            fields,
            text: text.to_string(),
        })
    }

    /// Builds a compiled expression directly from an already-parsed AST,
    /// used by the two-phase rewrite (spec §4.7) to wrap a post-aggregation
    /// expression whose synthetic `g_i` field references never went through
    /// the tokenizer.
    pub(crate) fn from_ast(ast: Expr, text: String) -> Self {
        let fields = ast.get_fields();
        CompiledExpr { ast, fields, text }
    }

    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn get_fields(&self) -> &HashSet<String> {
        &self.fields
    }

    /// Mode 1 (legacy numeric context). See spec §4.2 and
    /// `Value::as_numeric` for the string/bool coercion rules.
    pub fn evaluate_numeric(
        &self,
        record: &Record,
        registry: &FunctionRegistry,
        legacy_string_coercion: bool,
    ) -> Result<f64> {
        let (value, is_null) =
            eval_node(&self.ast, record, registry, legacy_string_coercion)?;
        if is_null {
            return Err(StreamError::eval("NULL has no numeric value"));
        }
        value.as_numeric(legacy_string_coercion)
    }

    /// Mode 2 (typed-with-NULL). Returns `(value, is_null)`.
    pub fn evaluate_value_with_null(
        &self,
        record: &Record,
        registry: &FunctionRegistry,
        legacy_string_coercion: bool,
    ) -> Result<(Value, bool)> {
        eval_node(&self.ast, record, registry, legacy_string_coercion)
    }

    /// Mode 3 (boolean, for WHERE/HAVING/CASE-WHEN).
    pub fn evaluate_bool(
        &self,
        record: &Record,
        registry: &FunctionRegistry,
        legacy_string_coercion: bool,
    ) -> Result<bool> {
        let (value, is_null) =
            eval_node(&self.ast, record, registry, legacy_string_coercion)?;
        if is_null {
            return Ok(false);
        }
        Ok(value.is_truthy())
    }
}

/// `(value, is_null)`. NULL is represented both as `Value::Null` and, for a
/// missing field path, as the bool flag set true with `Value::Null` — the
/// two are indistinguishable to callers by design (spec §4.1: "Missing at
/// any step -> overall result is NULL-missing").
fn eval_node(
    expr: &Expr,
    record: &Record,
    registry: &FunctionRegistry,
    legacy: bool,
) -> Result<(Value, bool)> {
    match expr {
        Expr::Number(n) => Ok((Value::Float(*n), false)),
        Expr::String(s) => Ok((Value::Str(s.clone()), false)),
        Expr::Null => Ok((Value::Null, true)),
        Expr::Field(name) => {
            let v = get_field(record, name);
            let is_null = v.is_null();
            Ok((v, is_null))
        }
        Expr::Paren(inner) => eval_node(inner, record, registry, legacy),
        Expr::Unary { op, expr } => eval_unary(*op, expr, record, registry, legacy),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, record, registry, legacy),
        Expr::Function { name, args } => eval_function(name, args, record, registry, legacy),
        Expr::Case {
            scrutinee,
            whens,
            else_result,
        } => eval_case(scrutinee, whens, else_result, record, registry, legacy),
    }
}

fn eval_unary(
    op: UnaryOp,
    inner: &Expr,
    record: &Record,
    registry: &FunctionRegistry,
    legacy: bool,
) -> Result<(Value, bool)> {
    match op {
        UnaryOp::Neg => {
            let (v, is_null) = eval_node(inner, record, registry, legacy)?;
            if is_null {
                return Ok((Value::Null, true));
            }
            Ok((Value::Float(-v.as_numeric(legacy)?), false))
        }
        UnaryOp::Not => {
            let (v, is_null) = eval_node(inner, record, registry, legacy)?;
            if is_null {
                return Ok((Value::Null, true));
            }
            Ok((Value::Bool(!v.is_truthy()), false))
        }
        UnaryOp::IsNull => {
            let (_, is_null) = eval_node(inner, record, registry, legacy)?;
            Ok((Value::Bool(is_null), false))
        }
        UnaryOp::IsNotNull => {
            let (_, is_null) = eval_node(inner, record, registry, legacy)?;
            Ok((Value::Bool(!is_null), false))
        }
    }
}

fn eval_binary(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    record: &Record,
    registry: &FunctionRegistry,
    legacy: bool,
) -> Result<(Value, bool)> {
    // AND/OR short-circuit and treat NULL as false, per spec §4.2 mode 3.
    if matches!(op, BinOp::And | BinOp::Or) {
        let (lv, lnull) = eval_node(left, record, registry, legacy)?;
        let l_truthy = !lnull && lv.is_truthy();
        if op == BinOp::And && !l_truthy {
            return Ok((Value::Bool(false), false));
        }
        if op == BinOp::Or && l_truthy {
            return Ok((Value::Bool(true), false));
        }
        let (rv, rnull) = eval_node(right, record, registry, legacy)?;
        let r_truthy = !rnull && rv.is_truthy();
        return Ok((Value::Bool(r_truthy), false));
    }

    let (lv, lnull) = eval_node(left, record, registry, legacy)?;
    let (rv, rnull) = eval_node(right, record, registry, legacy)?;
    let any_null = lnull || rnull;

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
            if any_null {
                return Ok((Value::Null, true));
            }
            let a = lv.as_numeric(legacy)?;
            let b = rv.as_numeric(legacy)?;
            let result = match op {
                BinOp::Add => Some(a + b),
                BinOp::Sub => Some(a - b),
                BinOp::Mul => Some(a * b),
                BinOp::Div => {
                    if b == 0.0 {
                        None
                    } else {
                        Some(a / b)
                    }
                }
                BinOp::Mod => {
                    if b == 0.0 {
                        None
                    } else {
                        Some(a % b)
                    }
                }
                BinOp::Pow => Some(a.powf(b)),
                _ => unreachable!(),
            };
            match result {
                Some(n) => Ok((Value::Float(n), false)),
                None => Ok((Value::Null, true)),
            }
        }
        BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            if any_null {
                return Ok((Value::Bool(false), false));
            }
            let result = compare(&lv, &rv, op)?;
            Ok((Value::Bool(result), false))
        }
        BinOp::Like => {
            if any_null {
                return Ok((Value::Bool(false), false));
            }
            let s = lv.as_compare_string();
            let pattern = rv.as_compare_string();
            Ok((Value::Bool(like_match(&s, &pattern)), false))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn compare(l: &Value, r: &Value, op: BinOp) -> Result<bool> {
    let both_numeric = matches!(l, Value::Int(_) | Value::Float(_))
        && matches!(r, Value::Int(_) | Value::Float(_));
    let both_string = matches!(l, Value::Str(_)) && matches!(r, Value::Str(_));

    if matches!(op, BinOp::Eq | BinOp::Neq) && !both_numeric && !both_string {
        // One numeric, one string (or other mixed types): coerce both to
        // string and compare (spec §4.2).
        let eq = l.as_compare_string() == r.as_compare_string();
        return Ok(if op == BinOp::Eq { eq } else { !eq });
    }

    if !both_numeric && !both_string {
        return Err(StreamError::eval(format!(
            "cannot order-compare {l} and {r} of differing types"
        )));
    }

    let ord = partial_cmp(l, r)
        .ok_or_else(|| StreamError::eval(format!("cannot compare {l} and {r}")))?;
    Ok(match op {
        BinOp::Eq => ord == Ordering::Equal,
        BinOp::Neq => ord != Ordering::Equal,
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Gt => ord == Ordering::Greater,
        BinOp::Le => ord != Ordering::Greater,
        BinOp::Ge => ord != Ordering::Less,
        _ => unreachable!(),
    })
}

/// `%` matches any sequence, `_` matches a single char; case-sensitive, no
/// escape character (spec §4.2).
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_rec(&t, &p)
}

fn like_rec(t: &[char], p: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('%') => like_rec(t, &p[1..]) || (!t.is_empty() && like_rec(&t[1..], p)),
        Some('_') => !t.is_empty() && like_rec(&t[1..], &p[1..]),
        Some(c) => !t.is_empty() && t[0] == *c && like_rec(&t[1..], &p[1..]),
    }
}

fn eval_function(
    name: &str,
    args: &[Expr],
    record: &Record,
    registry: &FunctionRegistry,
    legacy: bool,
) -> Result<(Value, bool)> {
    if registry.is_aggregate(name) {
        // Reaching here at evaluate time means the two-phase rewrite never
        // ran (e.g. a direct `evaluate_*` call on a raw expression outside
        // the projection pipeline); surface it clearly rather than silently
        // misbehaving.
        return Err(StreamError::eval(format!(
            "aggregate function {name} used outside an aggregation context"
        )));
    }
    let f = registry
        .get_scalar(name)
        .ok_or_else(|| StreamError::eval(format!("unknown function: {name}")))?;
    f.validate(args.len())?;
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        let (v, _) = eval_node(a, record, registry, legacy)?;
        values.push(v);
    }
    let ctx = FnContext { record };
    let result = f.execute(&ctx, &values)?;
    let is_null = result.is_null();
    Ok((result, is_null))
}

fn eval_case(
    scrutinee: &Option<Box<Expr>>,
    whens: &[super::ast::WhenThen],
    else_result: &Option<Box<Expr>>,
    record: &Record,
    registry: &FunctionRegistry,
    legacy: bool,
) -> Result<(Value, bool)> {
    if let Some(scrutinee) = scrutinee {
        // Simple form: evaluate scrutinee once, compare to each WHEN value.
        let (scrut_val, scrut_null) = eval_node(scrutinee, record, registry, legacy)?;
        for wt in whens {
            let (when_val, when_null) = eval_node(&wt.when, record, registry, legacy)?;
            let matches = if scrut_null || when_null {
                scrut_null && when_null
            } else {
                case_eq(&scrut_val, &when_val)
            };
            if matches {
                return eval_node(&wt.then, record, registry, legacy);
            }
        }
    } else {
        // Searched form: evaluate conditions in order, short-circuiting.
        for wt in whens {
            let (cond, is_null) = eval_node(&wt.when, record, registry, legacy)?;
            if !is_null && cond.is_truthy() {
                return eval_node(&wt.then, record, registry, legacy);
            }
        }
    }
    match else_result {
        Some(e) => eval_node(e, record, registry, legacy),
        None => Ok((Value::Null, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn rec(pairs: &[(&str, Value)]) -> Record {
        let mut m = Record::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        m
    }

    #[test]
    fn s1_complex_boolean_filter() {
        let reg = FunctionRegistry::with_builtins();
        let e =
            CompiledExpr::parse("(temperature > 20 AND humidity < 80) OR status == 'active'")
                .unwrap();
        let r = rec(&[
            ("temperature", Value::Int(15)),
            ("humidity", Value::Int(70)),
            ("status", Value::Str("active".into())),
        ]);
        assert!(e.evaluate_bool(&r, &reg, false).unwrap());
    }

    #[test]
    fn s4_nested_field_access() {
        let reg = FunctionRegistry::with_builtins();
        let mut sensor = Record::new();
        sensor.insert("temperature".into(), Value::Float(24.5));
        let mut info = Record::new();
        info.insert("name".into(), Value::Str("x".into()));
        let mut device = Record::new();
        device.insert("info".into(), Value::Record(info));
        let r = rec(&[
            ("device", Value::Record(device)),
            ("sensor", Value::Record(sensor)),
        ]);

        let name_expr = CompiledExpr::parse("device.info.name").unwrap();
        let (v, is_null) = name_expr
            .evaluate_value_with_null(&r, &reg, false)
            .unwrap();
        assert!(!is_null);
        assert_eq!(v.as_compare_string(), "x");

        let temp_expr = CompiledExpr::parse("sensor.temperature + 1").unwrap();
        let n = temp_expr.evaluate_numeric(&r, &reg, false).unwrap();
        assert_eq!(n, 25.5);
    }

    #[test]
    fn s5_is_null_with_missing_field() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("temperature", Value::Int(25))]);
        let is_null_expr = CompiledExpr::parse("description IS NULL").unwrap();
        assert!(is_null_expr.evaluate_bool(&r, &reg, false).unwrap());
        let is_not_null_expr = CompiledExpr::parse("description IS NOT NULL").unwrap();
        assert!(!is_not_null_expr.evaluate_bool(&r, &reg, false).unwrap());
    }

    #[test]
    fn null_propagation_in_arithmetic() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("a", Value::Int(1))]);
        let e = CompiledExpr::parse("a + missing").unwrap();
        let (v, is_null) = e.evaluate_value_with_null(&r, &reg, false).unwrap();
        assert!(is_null);
        assert!(v.is_null());
    }

    #[test]
    fn division_by_zero_is_null_not_error() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("a", Value::Int(1)), ("b", Value::Int(0))]);
        let e = CompiledExpr::parse("a / b").unwrap();
        let (v, is_null) = e.evaluate_value_with_null(&r, &reg, false).unwrap();
        assert!(is_null);
        assert!(v.is_null());
    }

    #[test]
    fn case_when_hot_warm_cold() {
        let reg = FunctionRegistry::with_builtins();
        let e = CompiledExpr::parse(
            "CASE WHEN t>30 THEN 'HOT' WHEN t>20 THEN 'WARM' ELSE 'COLD' END",
        )
        .unwrap();
        for (t, expected) in [(35, "HOT"), (25, "WARM"), (5, "COLD")] {
            let r = rec(&[("t", Value::Int(t))]);
            let (v, _) = e.evaluate_value_with_null(&r, &reg, false).unwrap();
            assert_eq!(v.as_compare_string(), expected);
        }
    }

    #[test]
    fn like_pattern_matching() {
        let reg = FunctionRegistry::with_builtins();
        let e = CompiledExpr::parse("name LIKE 'sensor%'").unwrap();
        let r = rec(&[("name", Value::Str("sensor-01".into()))]);
        assert!(e.evaluate_bool(&r, &reg, false).unwrap());
        let r2 = rec(&[("name", Value::Str("gateway-01".into()))]);
        assert!(!e.evaluate_bool(&r2, &reg, false).unwrap());
    }

    #[test]
    fn legacy_string_coercion_switch() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("s", Value::Str("abc".into()))]);
        let e = CompiledExpr::parse("s + 1").unwrap();
        assert!(e.evaluate_numeric(&r, &reg, false).is_err());
        // With the compatibility flag on, a non-numeric string falls back
        // to its length (spec §9 legacy quirk).
        let (v, is_null) = e.evaluate_value_with_null(&r, &reg, true).unwrap();
        assert!(!is_null);
        assert_eq!(v.as_numeric(true).unwrap(), 4.0); // 3 (len) + 1
    }

    #[test]
    fn cross_type_equality_coerces_to_string() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("a", Value::Int(5))]);
        let e = CompiledExpr::parse("a == '5'").unwrap();
        assert!(e.evaluate_bool(&r, &reg, false).unwrap());
    }

    #[test]
    fn cross_type_ordering_is_an_error() {
        let reg = FunctionRegistry::with_builtins();
        let r = rec(&[("a", Value::Int(5))]);
        let e = CompiledExpr::parse("a > 'z'").unwrap();
        assert!(e.evaluate_value_with_null(&r, &reg, false).is_err());
    }
}
