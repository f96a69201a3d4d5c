//! One window instance: (group-key, window-id) plus its per-field
//! accumulators (spec §3 "Window instance").

use indexmap::IndexMap;

use crate::aggregate::{AggKind, Accumulator};
use crate::value::Value;
use crate::window::groupkey::GroupKey;
use crate::window::kind::WindowId;

pub struct WindowInstance {
    pub group_key: GroupKey,
    pub window_id: WindowId,
    aggregators: IndexMap<String, Box<dyn Accumulator>>,
    /// Count of records that ever reached this window; zero-record windows
    /// are never emitted (spec §4.5 "No emission for a window with zero
    /// records").
    received: u64,
}

impl WindowInstance {
    pub fn new(group_key: GroupKey, window_id: WindowId, agg_specs: &[(String, AggKind)]) -> Self {
        let aggregators = agg_specs
            .iter()
            .map(|(id, kind)| (id.clone(), kind.create()))
            .collect();
        WindowInstance {
            group_key,
            window_id,
            aggregators,
            received: 0,
        }
    }

    /// Feeds one record's pre-aggregated values, keyed by synthetic
    /// aggregator id (`g_i`), into every aggregator this window tracks.
    /// A field absent from `values` (pre-agg expression evaluated to NULL)
    /// is fed as NULL.
    pub fn add(&mut self, values: &IndexMap<String, Value>) {
        self.received += 1;
        for (id, acc) in self.aggregators.iter_mut() {
            match values.get(id) {
                Some(v) if !v.is_null() => acc.add(v),
                _ => acc.add_null(),
            }
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Snapshot of every aggregator's final value, keyed by synthetic id,
    /// the input to post-aggregation projection evaluation (spec §4.6).
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.aggregators
            .iter()
            .map(|(id, acc)| (id.clone(), acc.finalize()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_record_window_has_zero_received() {
        let inst = WindowInstance::new(vec![], (0, 1000), &[("g0".into(), AggKind::Sum)]);
        assert_eq!(inst.received(), 0);
    }

    #[test]
    fn feeding_a_missing_field_counts_as_null() {
        let mut inst = WindowInstance::new(vec![], (0, 1000), &[("g0".into(), AggKind::Sum)]);
        inst.add(&IndexMap::new());
        assert_eq!(inst.received(), 1);
        assert_eq!(inst.snapshot().get("g0"), Some(&Value::Null));
    }
}
