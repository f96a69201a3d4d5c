use crate::aggregate::Accumulator;
use crate::value::Value;

/// `LEAD(expr, k)` (spec §4.4 aggregate table): "Deferred; emits NULL at
/// window close unless a future extension fills it." Accepts records like
/// any other accumulator so the parser/plan/window pipeline exercises it
/// end to end, but never produces a real value — `k` is kept only so a
/// future incremental implementation has it on hand without replumbing the
/// plan-time literal extraction in `plan::rewrite_aggregate`.
#[derive(Debug, Clone)]
pub(super) struct LeadAccumulator {
    #[allow(dead_code)]
    k: u32,
}

impl LeadAccumulator {
    pub fn new(k: u32) -> Self {
        LeadAccumulator { k }
    }
}

impl Accumulator for LeadAccumulator {
    fn add(&mut self, _value: &Value) {}

    fn add_null(&mut self) {}

    fn finalize(&self) -> Value {
        Value::Null
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_is_deferred_and_always_finalizes_to_null() {
        let mut acc = LeadAccumulator::new(2);
        acc.add(&Value::Int(1));
        acc.add(&Value::Int(2));
        acc.add(&Value::Int(3));
        acc.add(&Value::Int(4));
        assert_eq!(acc.finalize(), Value::Null);
    }

    #[test]
    fn lead_ignores_nulls_too_still_deferred() {
        let mut acc = LeadAccumulator::new(1);
        acc.add_null();
        acc.add(&Value::Int(9));
        assert_eq!(acc.finalize(), Value::Null);
    }
}
