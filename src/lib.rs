//! StreamSQL: an embedded streaming-SQL engine. Callers push records into a
//! compiled query at runtime and receive either synchronous per-record
//! results (non-aggregating queries) or asynchronous windowed aggregate
//! batches (aggregating queries) via registered sinks.
//!
//! This crate covers the engine's core: the expression evaluator
//! ([`expr`]), the function registry ([`functions`]), aggregator state
//! ([`aggregate`]), the window manager ([`window`]), the two-phase
//! aggregation rewrite ([`plan`]), and the stream runtime ([`runtime`]).
//! SQL text parsing, the logical-plan builder, and a public facade wiring
//! these pieces together are external collaborators and are out of scope.

pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod expr;
pub mod functions;
pub mod plan;
pub mod runtime;
pub mod value;
pub mod window;

pub use config::{EmitPolicy, StreamConfig, TimeUnit};
pub use error::{Result, StreamError};
pub use functions::FunctionRegistry;
pub use runtime::{QueryPlan, Stream};
pub use value::{Record, Value};
pub use window::WindowKind;
