//! Sinks (spec §4.6, §6: "register a sink `(batch_of_records) -> void`").

use crate::error::StreamError;
use crate::value::Record;

/// Receives one batch per window fire (windowed queries) or one batch of a
/// single record per emission (non-aggregating queries). Any `Fn(&[Record])`
/// closure implements this via the blanket impl below.
pub trait Sink: Send + Sync {
    fn handle(&self, batch: &[Record]);
}

impl<F> Sink for F
where
    F: Fn(&[Record]) + Send + Sync,
{
    fn handle(&self, batch: &[Record]) {
        self(batch)
    }
}

/// Receives a record that failed evaluation somewhere in the pipeline, and
/// the error that dropped it (spec §7 "routed to an error sink if one is
/// registered"). A supplemental sink kind beyond the spec's host-facing
/// surface, since a production embedding needs *some* way to observe
/// dropped records rather than only losing them silently.
pub trait ErrorSink: Send + Sync {
    fn handle(&self, record: &Record, error: &StreamError);
}

impl<F> ErrorSink for F
where
    F: Fn(&Record, &StreamError) + Send + Sync,
{
    fn handle(&self, record: &Record, error: &StreamError) {
        self(record, error)
    }
}
