//! The three window shapes (spec §4.5). All durations are milliseconds
//! since epoch; the runtime is responsible for converting a record's raw
//! timestamp field (honoring `TIMEUNIT`) into this unit before calling
//! [`crate::window::manager::WindowManager::add`].

/// `(start_ms, end_ms)`, open-left / closed-right per spec §3 "Window
/// instance": a record with timestamp `end_ms` belongs to this window, not
/// to the one that starts at `end_ms`.
pub type WindowId = (i64, i64);

#[derive(Debug, Clone, Copy)]
pub enum WindowKind {
    /// Contiguous, non-overlapping windows of fixed length; a record lands
    /// in exactly one.
    Tumbling { duration_ms: i64 },
    /// Overlapping windows of length `size_ms` started every `step_ms`; a
    /// record lands in `ceil(size/step)` concurrent windows.
    Sliding { size_ms: i64, step_ms: i64 },
    /// Per-group: stays open until `gap_ms` elapses with no record for that
    /// group. Handled specially by [`crate::window::manager::WindowManager`]
    /// since assignment depends on the group's prior activity, not just the
    /// current timestamp — `assign` is not called for this kind.
    Session { gap_ms: i64 },
}

impl WindowKind {
    /// Window ids a record at `ts_ms` is assigned to. Only meaningful for
    /// `Tumbling`/`Sliding`; returns an empty vec for `Session`.
    ///
    /// Boundaries are open-left / closed-right (`start < ts_ms <= end`): a
    /// timestamp landing exactly on a boundary belongs to the window that
    /// *ends* there, not the one that starts there. Shifting `ts_ms` back by
    /// one before the floor division turns that into the equivalent
    /// half-open `[start, end)` computation the div_euclid arithmetic
    /// naturally does.
    pub fn assign(&self, ts_ms: i64) -> Vec<WindowId> {
        match *self {
            WindowKind::Tumbling { duration_ms } => {
                let start = (ts_ms - 1).div_euclid(duration_ms) * duration_ms;
                vec![(start, start + duration_ms)]
            }
            WindowKind::Sliding { size_ms, step_ms } => {
                let count = (size_ms + step_ms - 1) / step_ms;
                let k_max = (ts_ms - 1).div_euclid(step_ms);
                let mut out = Vec::with_capacity(count as usize);
                for k in (k_max - count + 1)..=k_max {
                    let start = k * step_ms;
                    if start < ts_ms && ts_ms <= start + size_ms {
                        out.push((start, start + size_ms));
                    }
                }
                out
            }
            WindowKind::Session { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tumbling_assigns_one_window_aligned_to_duration() {
        let kind = WindowKind::Tumbling { duration_ms: 1000 };
        assert_eq!(kind.assign(2500), vec![(2000, 3000)]);
        // A timestamp on a boundary belongs to the window that ends there,
        // not the one that starts there (open-left / closed-right).
        assert_eq!(kind.assign(2000), vec![(1000, 2000)]);
        assert_eq!(kind.assign(3000), vec![(2000, 3000)]);
    }

    #[test]
    fn sliding_assigns_ceil_size_over_step_windows() {
        let kind = WindowKind::Sliding {
            size_ms: 3000,
            step_ms: 1000,
        };
        let windows = kind.assign(4500);
        assert_eq!(windows.len(), 3);
        for (start, end) in &windows {
            assert!(*start < 4500 && 4500 <= *end);
        }
    }

    #[test]
    fn sliding_boundary_timestamp_belongs_to_the_closing_windows() {
        let kind = WindowKind::Sliding {
            size_ms: 3000,
            step_ms: 1000,
        };
        let windows = kind.assign(3000);
        assert_eq!(windows, vec![(0, 3000), (1000, 4000), (2000, 5000)]);
    }
}
