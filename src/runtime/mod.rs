//! Stream dataflow runtime (spec §4.6): bounded queues, worker tasks,
//! filter/project stages, sink fan-out, lifecycle.

pub mod sink;
pub mod stream;

pub use sink::{ErrorSink, Sink};
pub use stream::{QueryPlan, Stream};
