use crate::aggregate::Accumulator;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// `COUNT(*)`: every record counts, NULL included.
    Star,
    /// `COUNT(expr)`: only non-null evaluations of `expr` count.
    Expr,
}

#[derive(Debug, Clone)]
pub(super) struct CountAccumulator {
    kind: Kind,
    count: i64,
}

impl CountAccumulator {
    pub fn new_star() -> Self {
        CountAccumulator {
            kind: Kind::Star,
            count: 0,
        }
    }

    pub fn new_expr() -> Self {
        CountAccumulator {
            kind: Kind::Expr,
            count: 0,
        }
    }
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, _value: &Value) {
        self.count += 1;
    }

    fn add_null(&mut self) {
        if self.kind == Kind::Star {
            self.count += 1;
        }
    }

    fn finalize(&self) -> Value {
        Value::Int(self.count)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_star_never_returns_null() {
        let acc = CountAccumulator::new_star();
        assert_eq!(acc.finalize(), Value::Int(0));
    }
}
