use std::cmp::Ordering;

use crate::aggregate::Accumulator;
use crate::value::{self, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Min,
    Max,
}

/// MIN/MAX share an implementation: both keep the best-seen value under
/// `value::partial_cmp`, differing only in which side of the ordering wins.
/// Non-comparable pairs (e.g. numeric vs. string ordering) are skipped rather
/// than erroring, matching the aggregate contract's "never propagate an
/// evaluation error out of `add`" shape.
#[derive(Debug, Clone)]
pub(super) struct MinMaxAccumulator {
    kind: Kind,
    best: Option<Value>,
}

impl MinMaxAccumulator {
    pub fn new_min() -> Self {
        MinMaxAccumulator {
            kind: Kind::Min,
            best: None,
        }
    }

    pub fn new_max() -> Self {
        MinMaxAccumulator {
            kind: Kind::Max,
            best: None,
        }
    }
}

impl Accumulator for MinMaxAccumulator {
    fn add(&mut self, value: &Value) {
        let Some(current) = &self.best else {
            self.best = Some(value.clone());
            return;
        };
        let Some(ord) = value::partial_cmp(value, current) else {
            return;
        };
        let replace = match self.kind {
            Kind::Min => ord == Ordering::Less,
            Kind::Max => ord == Ordering::Greater,
        };
        if replace {
            self.best = Some(value.clone());
        }
    }

    fn add_null(&mut self) {}

    fn finalize(&self) -> Value {
        self.best.clone().unwrap_or(Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_tracks_smallest_numeric() {
        let mut acc = MinMaxAccumulator::new_min();
        acc.add(&Value::Int(5));
        acc.add(&Value::Int(2));
        acc.add(&Value::Int(9));
        assert_eq!(acc.finalize(), Value::Int(2));
    }

    #[test]
    fn max_tracks_largest_and_ignores_incomparable() {
        let mut acc = MinMaxAccumulator::new_max();
        acc.add(&Value::Int(5));
        acc.add(&Value::Bool(true));
        acc.add(&Value::Int(9));
        assert_eq!(acc.finalize(), Value::Int(9));
    }
}
