//! The scalar/aggregate function registry (spec §4.3).
//!
//! Out of scope per spec.md §1, only the registration *contract* is spec'd:
//! name -> invocable callable with arity/type validation. The concrete
//! bodies registered here (`ABS`, `ROUND`, `UPPER`, ...) are a representative
//! sample so the documented examples in spec.md §6 evaluate end to end in
//! tests; a host embedding this crate is expected to register its own
//! richer catalog the same way.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Result, StreamError};
use crate::value::{Record, Value};

/// Per-call context handed to a scalar function: the current record, so
/// functions that need raw field access (rare) can reach it.
pub struct FnContext<'a> {
    pub record: &'a Record,
}

/// A registered callable (spec §4.3: `validate(argc)`, `execute(context,
/// args) -> (value, error)`).
pub trait ScalarFn: Send + Sync {
    fn validate(&self, argc: usize) -> Result<()>;
    fn execute(&self, ctx: &FnContext, args: &[Value]) -> Result<Value>;
}

struct FixedArity<F> {
    arity: usize,
    name: &'static str,
    body: F,
}

impl<F> ScalarFn for FixedArity<F>
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn validate(&self, argc: usize) -> Result<()> {
        if argc == self.arity {
            Ok(())
        } else {
            Err(StreamError::parse(format!(
                "{} expects {} argument(s), got {}",
                self.name, self.arity, argc
            )))
        }
    }

    fn execute(&self, _ctx: &FnContext, args: &[Value]) -> Result<Value> {
        (self.body)(args)
    }
}

struct VarArity<F> {
    min: usize,
    name: &'static str,
    body: F,
}

impl<F> ScalarFn for VarArity<F>
where
    F: Fn(&[Value]) -> Result<Value> + Send + Sync,
{
    fn validate(&self, argc: usize) -> Result<()> {
        if argc >= self.min {
            Ok(())
        } else {
            Err(StreamError::parse(format!(
                "{} expects at least {} argument(s), got {}",
                self.name, self.min, argc
            )))
        }
    }

    fn execute(&self, _ctx: &FnContext, args: &[Value]) -> Result<Value> {
        (self.body)(args)
    }
}

/// Process-wide-shaped, but instance-owned: a stream runtime holds one
/// registry and shares it behind an `Arc` with its workers. Distinguishes
/// scalar functions (executable here) from aggregate function *names*
/// (recognized by the two-phase rewrite in [`crate::plan`] and replaced by
/// accumulator references — never executed through this trait).
pub struct FunctionRegistry {
    scalars: HashMap<String, Arc<dyn ScalarFn>>,
    aggregate_names: HashSet<String>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry {
            scalars: HashMap::new(),
            aggregate_names: HashSet::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        register_builtin_scalars(&mut reg);
        register_builtin_aggregates(&mut reg);
        reg
    }

    pub fn register_scalar(&mut self, name: &str, f: Arc<dyn ScalarFn>) {
        self.scalars.insert(name.to_ascii_uppercase(), f);
    }

    pub fn register_aggregate_name(&mut self, name: &str) {
        self.aggregate_names.insert(name.to_ascii_uppercase());
    }

    pub fn get_scalar(&self, name: &str) -> Option<Arc<dyn ScalarFn>> {
        self.scalars.get(&name.to_ascii_uppercase()).cloned()
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregate_names.contains(&name.to_ascii_uppercase())
    }
}

fn register_builtin_aggregates(reg: &mut FunctionRegistry) {
    for name in [
        "SUM",
        "AVG",
        "MIN",
        "MAX",
        "COUNT",
        "FIRST_VALUE",
        "LAST_VALUE",
        "LATEST",
        "NTH_VALUE",
        "LEAD",
    ] {
        reg.register_aggregate_name(name);
    }
}

fn numeric(args: &[Value], i: usize) -> Result<f64> {
    args[i].as_numeric(false)
}

fn register_builtin_scalars(reg: &mut FunctionRegistry) {
    reg.register_scalar(
        "ABS",
        Arc::new(FixedArity {
            arity: 1,
            name: "ABS",
            body: |args| Ok(Value::Float(numeric(args, 0)?.abs())),
        }),
    );
    reg.register_scalar(
        "SQRT",
        Arc::new(FixedArity {
            arity: 1,
            name: "SQRT",
            body: |args| Ok(Value::Float(numeric(args, 0)?.sqrt())),
        }),
    );
    reg.register_scalar(
        "ROUND",
        Arc::new(FixedArity {
            arity: 2,
            name: "ROUND",
            body: |args| {
                let v = numeric(args, 0)?;
                let places = numeric(args, 1)? as i32;
                let factor = 10f64.powi(places);
                Ok(Value::Float((v * factor).round() / factor))
            },
        }),
    );
    reg.register_scalar(
        "UPPER",
        Arc::new(FixedArity {
            arity: 1,
            name: "UPPER",
            body: |args| Ok(Value::Str(args[0].as_compare_string().to_uppercase())),
        }),
    );
    reg.register_scalar(
        "LOWER",
        Arc::new(FixedArity {
            arity: 1,
            name: "LOWER",
            body: |args| Ok(Value::Str(args[0].as_compare_string().to_lowercase())),
        }),
    );
    reg.register_scalar(
        "LENGTH",
        Arc::new(FixedArity {
            arity: 1,
            name: "LENGTH",
            body: |args| Ok(Value::Int(args[0].as_compare_string().len() as i64)),
        }),
    );
    reg.register_scalar(
        "CONCAT",
        Arc::new(VarArity {
            min: 1,
            name: "CONCAT",
            body: |args| {
                let mut out = String::new();
                for a in args {
                    out.push_str(&a.as_compare_string());
                }
                Ok(Value::Str(out))
            },
        }),
    );
    reg.register_scalar(
        "IF_NULL",
        Arc::new(FixedArity {
            arity: 2,
            name: "IF_NULL",
            body: |args| {
                if args[0].is_null() {
                    Ok(args[1].clone())
                } else {
                    Ok(args[0].clone())
                }
            },
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn round_matches_documented_example() {
        let reg = FunctionRegistry::with_builtins();
        let f = reg.get_scalar("ROUND").unwrap();
        let ctx = FnContext {
            record: &IndexMap::new(),
        };
        let v = f
            .execute(&ctx, &[Value::Float(1.2345), Value::Int(2)])
            .unwrap();
        assert!(matches!(v, Value::Float(n) if (n - 1.23).abs() < 1e-9));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let reg = FunctionRegistry::with_builtins();
        let f = reg.get_scalar("ABS").unwrap();
        assert!(f.validate(2).is_err());
        assert!(f.validate(1).is_ok());
    }

    #[test]
    fn aggregate_names_are_recognized() {
        let reg = FunctionRegistry::with_builtins();
        assert!(reg.is_aggregate("sum"));
        assert!(reg.is_aggregate("NTH_VALUE"));
        assert!(!reg.is_aggregate("ROUND"));
    }
}
