//! Group-by key computation (spec §3 "Group-key").

use crate::error::Result;
use crate::expr::CompiledExpr;
use crate::functions::FunctionRegistry;
use crate::value::{Record, Value};

/// An ordered tuple of GROUP BY expression results. Equality and hashing
/// come straight from `Value`'s own impls, where NULL != NULL — exactly the
/// routing semantics the spec requires ("two records yielding the same
/// tuple are routed to the same windows").
pub type GroupKey = Vec<Value>;

/// Evaluates the GROUP BY expressions against a record to produce its
/// routing key. A record with no GROUP BY clause has a single, constant
/// empty key so all records fall into one implicit group.
pub fn compute_group_key(
    exprs: &[CompiledExpr],
    record: &Record,
    registry: &FunctionRegistry,
    legacy_string_coercion: bool,
) -> Result<GroupKey> {
    exprs
        .iter()
        .map(|e| {
            e.evaluate_value_with_null(record, registry, legacy_string_coercion)
                .map(|(v, _is_null)| v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn empty_group_by_yields_one_constant_key() {
        let registry = FunctionRegistry::with_builtins();
        let record: Record = IndexMap::new();
        let key = compute_group_key(&[], &record, &registry, false).unwrap();
        assert!(key.is_empty());
    }

    #[test]
    fn distinct_field_values_yield_distinct_keys() {
        let registry = FunctionRegistry::with_builtins();
        let mut r1: Record = IndexMap::new();
        r1.insert("deviceId".into(), Value::Str("dev1".into()));
        let mut r2: Record = IndexMap::new();
        r2.insert("deviceId".into(), Value::Str("dev2".into()));
        let k1 = compute_group_key(
            &[CompiledExpr::parse("deviceId").unwrap()],
            &r1,
            &registry,
            false,
        )
        .unwrap();
        let k2 = compute_group_key(
            &[CompiledExpr::parse("deviceId").unwrap()],
            &r2,
            &registry,
            false,
        )
        .unwrap();
        assert_ne!(k1, k2);
    }
}
