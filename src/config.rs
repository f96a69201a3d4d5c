//! Runtime configuration (spec §5, §9 Design Notes).

use std::time::Duration;

/// How `Stream::emit` behaves when the input queue is full (spec §4.6:
/// "a full queue returns a 'backpressure' error or blocks, at host
/// choice").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitPolicy {
    /// `emit` waits for room on the queue.
    Blocking,
    /// `emit` returns `StreamError::Runtime` immediately if the queue is
    /// full.
    NonBlocking,
}

/// Source-field timestamp unit (spec §6 "`WITH` options ... `TIMEUNIT`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
}

impl TimeUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ns" => Some(TimeUnit::Nanos),
            "us" => Some(TimeUnit::Micros),
            "ms" => Some(TimeUnit::Millis),
            "ss" => Some(TimeUnit::Seconds),
            _ => None,
        }
    }

    /// Converts a raw timestamp value in this unit to milliseconds since
    /// epoch, the internal unit the window manager operates in.
    pub fn to_millis(self, raw: i64) -> i64 {
        match self {
            TimeUnit::Nanos => raw / 1_000_000,
            TimeUnit::Micros => raw / 1_000,
            TimeUnit::Millis => raw,
            TimeUnit::Seconds => raw * 1_000,
        }
    }
}

/// Process-wide tunables for one compiled [`crate::runtime::Stream`].
/// Defaults follow the teacher's own configuration-object style
/// (`datafusion::execution::context::SessionConfig`): a struct of plain
/// fields with a `Default` impl rather than a builder, since StreamSQL's
/// configuration surface is small.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Bounded input queue capacity.
    pub channel_capacity: usize,
    /// Worker tasks dequeuing concurrently. Default 1: the spec's own
    /// design notes call determinism of `FIRST_VALUE`/`LAST_VALUE`/
    /// `NTH_VALUE` under concurrent workers "recommended but optional" to
    /// restore via group-key sharding; sticking to one worker sidesteps
    /// needing that sharding while still allowing a host to opt into more
    /// throughput at the cost of that determinism.
    pub worker_count: usize,
    pub emit_policy: EmitPolicy,
    /// Legacy numeric-coercion quirk: an unparseable string converts to
    /// its length instead of failing (spec §9, resolved behind this flag).
    pub legacy_string_coercion: bool,
    /// How often the background task checks for windows past their end
    /// time.
    pub tick_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            channel_capacity: 1024,
            worker_count: 1,
            emit_policy: EmitPolicy::Blocking,
            legacy_string_coercion: false,
            tick_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_unit_conversion_to_millis() {
        assert_eq!(TimeUnit::Seconds.to_millis(5), 5000);
        assert_eq!(TimeUnit::Nanos.to_millis(5_000_000), 5);
    }

    #[test]
    fn unknown_time_unit_string_is_none() {
        assert!(TimeUnit::parse("minutes").is_none());
    }
}
