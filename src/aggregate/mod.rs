//! Aggregator state (spec §4.4).
//!
//! One accumulator implementation per aggregate kind, the way the teacher
//! keeps `FirstValueAccumulator`/`LastValueAccumulator` as separate structs
//! in `datafusion/physical-expr/src/aggregate/first_last.rs` behind a shared
//! `Accumulator` trait — adapted here from Arrow-batch-at-a-time
//! (`update_batch(&[ArrayRef])`) to single-value-at-a-time (`add(&Value)`),
//! since StreamSQL accumulates row by row as records arrive.

mod count;
mod first_last;
mod lead;
mod minmax;
mod nth;
mod sum_avg;

use std::fmt::Debug;

use crate::error::{Result, StreamError};
use crate::value::Value;

/// Per (window, group, field) running accumulator (spec §3 Aggregator state).
/// Created on first record of a (window, group), mutated by the aggregation
/// pipeline, destroyed when the containing window is emitted.
pub trait Accumulator: Debug + Send {
    /// Feed a non-null value.
    fn add(&mut self, value: &Value);

    /// Feed a NULL input. `SUM`/`AVG`/`MIN`/`MAX`/`COUNT(expr)` ignore it;
    /// `COUNT(*)` and `LAST_VALUE` still observe the record happened.
    fn add_null(&mut self);

    /// Produce the final value, or NULL if no (relevant) input was seen.
    fn finalize(&self) -> Value;

    fn clone_box(&self) -> Box<dyn Accumulator>;
}

impl Clone for Box<dyn Accumulator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The aggregate kinds required by spec §4.4, parameterized where the SQL
/// call carries extra arguments (`NTH_VALUE(expr, n)`, `LEAD(expr, k)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Sum,
    Avg,
    Min,
    Max,
    CountStar,
    CountExpr,
    FirstValue,
    /// `LAST_VALUE` and `LATEST` share this kind (spec §4.4: "Same as
    /// `LAST_VALUE` semantically").
    LastValue,
    NthValue(u32),
    Lead(u32),
}

impl AggKind {
    /// Resolves a registered aggregate function name (+ its literal extra
    /// argument, if any) to a kind. `extra` is the constant `n`/`k` argument
    /// for `NTH_VALUE`/`LEAD`, already evaluated at plan time since it must
    /// be a literal.
    pub fn from_name(name: &str, extra: Option<i64>) -> Result<Self> {
        Ok(match name.to_ascii_uppercase().as_str() {
            "SUM" => AggKind::Sum,
            "AVG" => AggKind::Avg,
            "MIN" => AggKind::Min,
            "MAX" => AggKind::Max,
            "COUNT" => {
                // Caller distinguishes COUNT(*) vs COUNT(expr) by whether an
                // argument expression was supplied; see `plan::rewrite`.
                AggKind::CountExpr
            }
            "FIRST_VALUE" => AggKind::FirstValue,
            "LAST_VALUE" | "LATEST" => AggKind::LastValue,
            "NTH_VALUE" => {
                let n = extra.ok_or_else(|| {
                    StreamError::parse("NTH_VALUE requires a literal index argument")
                })?;
                if n < 1 {
                    return Err(StreamError::parse("NTH_VALUE index must be >= 1"));
                }
                AggKind::NthValue(n as u32)
            }
            "LEAD" => AggKind::Lead(extra.unwrap_or(1).max(1) as u32),
            other => return Err(StreamError::parse(format!("unknown aggregate: {other}"))),
        })
    }

    pub fn create(self) -> Box<dyn Accumulator> {
        match self {
            AggKind::Sum => Box::new(sum_avg::SumAccumulator::new()),
            AggKind::Avg => Box::new(sum_avg::AvgAccumulator::new()),
            AggKind::Min => Box::new(minmax::MinMaxAccumulator::new_min()),
            AggKind::Max => Box::new(minmax::MinMaxAccumulator::new_max()),
            AggKind::CountStar => Box::new(count::CountAccumulator::new_star()),
            AggKind::CountExpr => Box::new(count::CountAccumulator::new_expr()),
            AggKind::FirstValue => Box::new(first_last::FirstValueAccumulator::new()),
            AggKind::LastValue => Box::new(first_last::LastValueAccumulator::new()),
            AggKind::NthValue(n) => Box::new(nth::NthValueAccumulator::new(n)),
            AggKind::Lead(k) => Box::new(lead::LeadAccumulator::new(k)),
        }
    }
}
