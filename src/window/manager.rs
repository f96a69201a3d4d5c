//! Window manager (spec §4.5): owns every window instance across all
//! groups behind one mutex, the way the teacher's `BoundedWindowAggExec`
//! keeps `PartitionWindowAggStates` (an `IndexMap<PartitionKey, WindowState>`)
//! and mutates it under a single lock per
//! `datafusion/physical-expr/src/window/window_expr.rs`, adapted here from
//! Arrow-batch replay to one-mutex-per-manager streaming state per
//! `datafusion/core/src/execution/memory_pool/pool.rs`'s
//! `parking_lot::Mutex` usage (Open Question OQ-3: a single non-sharded
//! mutex, sharding by group-key is a documented-but-unimplemented
//! optimization).

use ahash::AHashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::aggregate::AggKind;
use crate::value::Value;
use crate::window::groupkey::GroupKey;
use crate::window::instance::WindowInstance;
use crate::window::kind::{WindowId, WindowKind};

/// One fired (window, group): the result of a window whose closing
/// condition was met, ready for post-aggregation projection.
pub struct FiredWindow {
    pub group_key: GroupKey,
    pub window_id: WindowId,
    pub values: IndexMap<String, Value>,
}

struct ManagerState {
    windows: IndexMap<(GroupKey, WindowId), WindowInstance>,
    /// Per-group currently-open session window, tracked separately from
    /// `windows` since session assignment depends on the group's last
    /// activity rather than the timestamp alone.
    session_open: AHashMap<GroupKey, WindowId>,
}

pub struct WindowManager {
    kind: WindowKind,
    agg_specs: Vec<(String, AggKind)>,
    state: Mutex<ManagerState>,
}

impl WindowManager {
    pub fn new(kind: WindowKind, agg_specs: Vec<(String, AggKind)>) -> Self {
        WindowManager {
            kind,
            agg_specs,
            state: Mutex::new(ManagerState {
                windows: IndexMap::new(),
                session_open: AHashMap::new(),
            }),
        }
    }

    /// Routes one record's pre-aggregated values into every window instance
    /// it belongs to, creating instances on first touch (spec §4.5 "Adding a
    /// record").
    pub fn add(&self, group_key: GroupKey, ts_ms: i64, values: &IndexMap<String, Value>) {
        let mut state = self.state.lock();
        match self.kind {
            WindowKind::Tumbling { .. } | WindowKind::Sliding { .. } => {
                for window_id in self.kind.assign(ts_ms) {
                    let agg_specs = &self.agg_specs;
                    let entry = state
                        .windows
                        .entry((group_key.clone(), window_id))
                        .or_insert_with(|| {
                            WindowInstance::new(group_key.clone(), window_id, agg_specs)
                        });
                    entry.add(values);
                }
            }
            WindowKind::Session { gap_ms } => {
                let existing = state.session_open.get(&group_key).copied();
                let window_id = match existing {
                    Some((start, end)) if ts_ms <= end => {
                        let extended = (start, ts_ms + gap_ms);
                        if extended != (start, end) {
                            if let Some(inst) =
                                state.windows.shift_remove(&(group_key.clone(), (start, end)))
                            {
                                state.windows.insert((group_key.clone(), extended), inst);
                            }
                        }
                        extended
                    }
                    _ => (ts_ms, ts_ms + gap_ms),
                };
                state.session_open.insert(group_key.clone(), window_id);
                let agg_specs = &self.agg_specs;
                let entry = state
                    .windows
                    .entry((group_key.clone(), window_id))
                    .or_insert_with(|| WindowInstance::new(group_key, window_id, agg_specs));
                entry.add(values);
            }
        }
    }

    /// Fires (and removes) every window whose end has passed `now_ms` and
    /// that received at least one record. Called by the runtime's
    /// background tick task.
    pub fn fire_ready(&self, now_ms: i64) -> Vec<FiredWindow> {
        let mut state = self.state.lock();
        let expired: Vec<(GroupKey, WindowId)> = state
            .windows
            .iter()
            .filter(|(_, inst)| inst.window_id.1 <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();

        let mut fired = Vec::with_capacity(expired.len());
        for key in expired {
            if let Some(inst) = state.windows.shift_remove(&key) {
                if inst.received() > 0 {
                    let values = inst.snapshot();
                    fired.push(FiredWindow {
                        group_key: inst.group_key,
                        window_id: inst.window_id,
                        values,
                    });
                }
                if let Some(open) = state.session_open.get(&key.0) {
                    if *open == key.1 {
                        state.session_open.remove(&key.0);
                    }
                }
            }
        }
        fired
    }

    /// Force-fires every open window regardless of time, used for `stop()`
    /// and synchronous testing (spec §4.5 "`Trigger()` force-fires all open
    /// windows").
    pub fn trigger_all(&self) -> Vec<FiredWindow> {
        let mut state = self.state.lock();
        let all: Vec<(GroupKey, WindowId)> = state.windows.keys().cloned().collect();
        let mut fired = Vec::with_capacity(all.len());
        for key in all {
            if let Some(inst) = state.windows.shift_remove(&key) {
                if inst.received() > 0 {
                    let values = inst.snapshot();
                    fired.push(FiredWindow {
                        group_key: inst.group_key,
                        window_id: inst.window_id,
                        values,
                    });
                }
            }
        }
        state.session_open.clear();
        fired
    }

    pub fn open_window_count(&self) -> usize {
        self.state.lock().windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg_specs() -> Vec<(String, AggKind)> {
        vec![("g0".into(), AggKind::Sum)]
    }

    fn values(n: i64) -> IndexMap<String, Value> {
        let mut m = IndexMap::new();
        m.insert("g0".to_string(), Value::Int(n));
        m
    }

    #[test]
    fn tumbling_window_fires_after_its_end_and_not_before() {
        let mgr = WindowManager::new(WindowKind::Tumbling { duration_ms: 1000 }, agg_specs());
        mgr.add(vec![Value::Str("dev1".into())], 100, &values(10));
        mgr.add(vec![Value::Str("dev1".into())], 900, &values(20));
        assert!(mgr.fire_ready(500).is_empty());
        let fired = mgr.fire_ready(1000);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].values.get("g0"), Some(&Value::Float(30.0)));
    }

    #[test]
    fn zero_record_window_never_fires() {
        let mgr = WindowManager::new(WindowKind::Tumbling { duration_ms: 1000 }, agg_specs());
        assert!(mgr.fire_ready(10_000).is_empty());
    }

    #[test]
    fn session_window_extends_on_activity_within_gap() {
        let mgr = WindowManager::new(WindowKind::Session { gap_ms: 1000 }, agg_specs());
        mgr.add(vec![Value::Str("dev1".into())], 0, &values(1));
        mgr.add(vec![Value::Str("dev1".into())], 500, &values(2));
        assert_eq!(mgr.open_window_count(), 1);
        let fired = mgr.fire_ready(1400);
        assert!(fired.is_empty(), "gap not yet elapsed from the latest record");
        let fired = mgr.fire_ready(1600);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].values.get("g0"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn trigger_all_force_fires_regardless_of_time() {
        let mgr = WindowManager::new(WindowKind::Tumbling { duration_ms: 1_000_000 }, agg_specs());
        mgr.add(vec![Value::Str("dev1".into())], 0, &values(5));
        assert!(mgr.fire_ready(1).is_empty());
        let fired = mgr.trigger_all();
        assert_eq!(fired.len(), 1);
        assert_eq!(mgr.open_window_count(), 0);
    }
}
