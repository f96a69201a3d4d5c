//! `FIRST_VALUE`/`LAST_VALUE` (+ `LATEST` alias), grounded on the teacher's
//! `FirstValueAccumulator`/`LastValueAccumulator` pair in
//! `datafusion/physical-expr/src/aggregate/first_last.rs`: each just
//! remembers one slot and an "have I been set" flag, updated in arrival
//! order rather than by an explicit ORDER BY.
//!
//! `FIRST_VALUE` keeps the first non-null input (NULLs before the first
//! real value are skipped, matching the teacher's `ignore_nulls` default).
//! `LAST_VALUE` takes the spec's resolved reading (OQ-6) and records every
//! record including NULLs, so a trailing NULL input wins.

use crate::aggregate::Accumulator;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub(super) struct FirstValueAccumulator {
    first: Option<Value>,
}

impl FirstValueAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for FirstValueAccumulator {
    fn add(&mut self, value: &Value) {
        if self.first.is_none() {
            self.first = Some(value.clone());
        }
    }

    fn add_null(&mut self) {}

    fn finalize(&self) -> Value {
        self.first.clone().unwrap_or(Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct LastValueAccumulator {
    last: Option<Value>,
}

impl LastValueAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for LastValueAccumulator {
    fn add(&mut self, value: &Value) {
        self.last = Some(value.clone());
    }

    fn add_null(&mut self) {
        self.last = Some(Value::Null);
    }

    fn finalize(&self) -> Value {
        self.last.clone().unwrap_or(Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_skips_leading_nulls() {
        let mut acc = FirstValueAccumulator::new();
        acc.add_null();
        acc.add(&Value::Int(7));
        acc.add(&Value::Int(9));
        assert_eq!(acc.finalize(), Value::Int(7));
    }

    #[test]
    fn last_value_observes_trailing_null() {
        let mut acc = LastValueAccumulator::new();
        acc.add(&Value::Int(7));
        acc.add_null();
        assert_eq!(acc.finalize(), Value::Null);
    }
}
