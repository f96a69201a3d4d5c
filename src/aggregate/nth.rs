use crate::aggregate::Accumulator;
use crate::value::Value;

/// `NTH_VALUE(expr, n)`: returns the `n`-th non-null value seen, 1-indexed,
/// or NULL if fewer than `n` non-null values arrived before the window
/// closed (spec §4.4 scenario S6).
#[derive(Debug, Clone)]
pub(super) struct NthValueAccumulator {
    n: u32,
    seen: u32,
    result: Option<Value>,
}

impl NthValueAccumulator {
    pub fn new(n: u32) -> Self {
        NthValueAccumulator {
            n,
            seen: 0,
            result: None,
        }
    }
}

impl Accumulator for NthValueAccumulator {
    fn add(&mut self, value: &Value) {
        self.seen += 1;
        if self.seen == self.n && self.result.is_none() {
            self.result = Some(value.clone());
        }
    }

    fn add_null(&mut self) {}

    fn finalize(&self) -> Value {
        self.result.clone().unwrap_or(Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}
