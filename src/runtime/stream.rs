//! Stream runtime (spec §4.6): input ingestion → filter → window →
//! aggregate → projection → sink fan-out, grounded on the worker-pool /
//! bounded-channel / idempotent-stop shape of the teacher's `EventLoop` in
//! `ballista/rust/core/src/event_loop.rs`, generalized from one queue with
//! one background task to N worker tasks sharing a receiver plus a
//! dedicated window-firing tick task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, error, warn};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::collector::RecordContext;
use crate::config::{EmitPolicy, StreamConfig, TimeUnit};
use crate::error::{Result, StreamError};
use crate::expr::CompiledExpr;
use crate::functions::FunctionRegistry;
use crate::plan::{build_projection_plan, ProjectionPlan};
use crate::runtime::sink::{ErrorSink, Sink};
use crate::value::{Record, Value};
use crate::window::{compute_group_key, WindowKind, WindowManager};

/// The external, pre-built logical plan a compiled query executes (spec §6
/// "Logical-plan input ... external to the core"): select list, optional
/// filter/group-by/window spec, and the `WITH` options the SQL layer
/// parsed out.
pub struct QueryPlan {
    pub select: Vec<(String, String)>,
    pub where_clause: Option<String>,
    pub group_by: Vec<String>,
    pub window: Option<WindowKind>,
    pub timestamp_field: Option<String>,
    pub time_unit: TimeUnit,
}

impl QueryPlan {
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

struct StreamInner {
    config: StreamConfig,
    registry: FunctionRegistry,
    filter: Option<CompiledExpr>,
    group_by: Vec<CompiledExpr>,
    projection: ProjectionPlan,
    window: Option<Arc<WindowManager>>,
    timestamp_field: Option<String>,
    time_unit: TimeUnit,
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    error_sinks: RwLock<Vec<Arc<dyn ErrorSink>>>,
    stopped: Arc<AtomicBool>,
    input_tx: mpsc::Sender<Record>,
}

/// A single compiled query's running dataflow (spec §4.6 "a single `Stream`
/// object per compiled query").
pub struct Stream {
    inner: Arc<StreamInner>,
    worker_handles: AsyncMutex<Vec<JoinHandle<()>>>,
    tick_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Stream {
    /// Builds and starts the runtime for a compiled query (spec §4.6
    /// `execute(plan)`).
    pub fn execute(plan: QueryPlan, config: StreamConfig, registry: FunctionRegistry) -> Result<Arc<Self>> {
        let projection = build_projection_plan(&plan.select, &registry)?;

        if projection.is_aggregating() && plan.window.is_none() {
            return Err(StreamError::config(
                "query has aggregate columns but no window spec",
            ));
        }
        if !projection.is_aggregating() && plan.window.is_some() {
            return Err(StreamError::config(
                "query has a window spec but no aggregate columns",
            ));
        }

        let filter = plan.where_clause.as_deref().map(CompiledExpr::parse).transpose()?;
        let group_by = plan
            .group_by
            .iter()
            .map(|t| CompiledExpr::parse(t))
            .collect::<Result<Vec<_>>>()?;

        let window = plan.window.map(|kind| {
            let agg_specs = projection
                .tasks
                .iter()
                .map(|t| (t.id.clone(), t.kind))
                .collect();
            Arc::new(WindowManager::new(kind, agg_specs))
        });

        let (input_tx, input_rx) = mpsc::channel(config.channel_capacity.max(1));

        let inner = Arc::new(StreamInner {
            stopped: Arc::new(AtomicBool::new(false)),
            timestamp_field: plan.timestamp_field,
            time_unit: plan.time_unit,
            sinks: RwLock::new(Vec::new()),
            error_sinks: RwLock::new(Vec::new()),
            input_tx,
            window,
            filter,
            group_by,
            projection,
            registry,
            config,
        });

        let shared_rx = Arc::new(AsyncMutex::new(input_rx));
        let mut worker_handles = Vec::with_capacity(inner.config.worker_count.max(1));
        for id in 0..inner.config.worker_count.max(1) {
            worker_handles.push(spawn_worker(id, inner.clone(), shared_rx.clone()));
        }

        let tick_handle = inner
            .window
            .is_some()
            .then(|| spawn_tick(inner.clone()));

        Ok(Arc::new(Stream {
            inner,
            worker_handles: AsyncMutex::new(worker_handles),
            tick_handle: AsyncMutex::new(tick_handle),
        }))
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.inner.sinks.write().push(sink);
    }

    pub fn add_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        self.inner.error_sinks.write().push(sink);
    }

    /// Enqueues a record for asynchronous processing (spec §4.6 `emit`).
    pub async fn emit(&self, record: Record) -> Result<()> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(StreamError::runtime("emit after stop"));
        }
        match self.inner.config.emit_policy {
            EmitPolicy::Blocking => self
                .inner
                .input_tx
                .send(record)
                .await
                .map_err(|_| StreamError::runtime("input queue closed")),
            EmitPolicy::NonBlocking => self
                .inner
                .input_tx
                .try_send(record)
                .map_err(|_| StreamError::runtime("backpressure: input queue is full")),
        }
    }

    /// Synchronous single-record path for non-aggregating queries (spec
    /// §4.6 `emit_sync`): bypasses the worker pool entirely.
    pub fn emit_sync(&self, record: Record) -> Result<Option<Record>> {
        if self.inner.projection.is_aggregating() {
            return Err(StreamError::runtime(
                "emit_sync is only valid for non-aggregating queries",
            ));
        }
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(StreamError::runtime("emit_sync after stop"));
        }
        if !passes_filter(&self.inner, &record)? {
            return Ok(None);
        }
        Ok(Some(project_plain(&self.inner, &record)?))
    }

    /// Flushes and shuts the runtime down: fires all open windows once,
    /// stops workers, and is idempotent (spec §4.6, §8 invariant 6).
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tick) = self.tick_handle.lock().await.take() {
            tick.abort();
        }
        if let Some(window) = &self.inner.window {
            let fired = window.trigger_all();
            emit_fired_batch(&self.inner, fired);
        }
        let handles = std::mem::take(&mut *self.worker_handles.lock().await);
        for h in handles {
            h.abort();
        }
        debug!("stream stopped");
    }

    /// Force-fires every open window immediately, without waiting for the
    /// background tick (spec §4.5 `Trigger()`, §6 "`Window.Trigger` in
    /// tests"). A no-op for non-windowed queries.
    pub fn trigger(&self) {
        if let Some(window) = &self.inner.window {
            let fired = window.trigger_all();
            emit_fired_batch(&self.inner, fired);
        }
    }
}

fn spawn_worker(
    id: usize,
    inner: Arc<StreamInner>,
    rx: Arc<AsyncMutex<mpsc::Receiver<Record>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if inner.stopped.load(Ordering::SeqCst) {
                break;
            }
            let record = {
                let mut guard = rx.lock().await;
                guard.recv().await
            };
            let Some(record) = record else {
                break;
            };
            if let Err(e) = process_record(&inner, &record) {
                warn!("worker {id} dropping record after error: {e}");
                for sink in inner.error_sinks.read().iter() {
                    let sink = sink.clone();
                    let _ = catch_unwind(AssertUnwindSafe(|| sink.handle(&record, &e)));
                }
            }
        }
    })
}

fn spawn_tick(inner: Arc<StreamInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(inner.config.tick_interval);
        loop {
            interval.tick().await;
            if inner.stopped.load(Ordering::SeqCst) {
                break;
            }
            if let Some(window) = &inner.window {
                let fired = window.fire_ready(now_ms());
                emit_fired_batch(&inner, fired);
            }
        }
    })
}

fn passes_filter(inner: &StreamInner, record: &Record) -> Result<bool> {
    match &inner.filter {
        Some(f) => f.evaluate_bool(record, &inner.registry, inner.config.legacy_string_coercion),
        None => Ok(true),
    }
}

/// Non-aggregating projection: evaluates every select column directly
/// against the raw input record.
fn project_plain(inner: &StreamInner, record: &Record) -> Result<Record> {
    let mut out = Record::new();
    for col in &inner.projection.columns {
        let (value, _is_null) =
            col.post_agg
                .evaluate_value_with_null(record, &inner.registry, inner.config.legacy_string_coercion)?;
        out.insert(col.name.clone(), value);
    }
    Ok(out)
}

fn record_timestamp_ms(inner: &StreamInner, ctx: &RecordContext) -> i64 {
    let Some(field) = &inner.timestamp_field else {
        return now_ms();
    };
    match ctx.field(field) {
        Value::Int(raw) => inner.time_unit.to_millis(raw),
        Value::Float(raw) => inner.time_unit.to_millis(raw as i64),
        _ => now_ms(),
    }
}

/// Runs one record through filter -> group -> aggregate, bound for its
/// whole traversal to a single [`RecordContext`] exclusively owned by the
/// calling worker (spec §4.8 ownership).
fn process_record(inner: &StreamInner, record: &Record) -> Result<()> {
    let mut ctx = RecordContext::new(record);

    if !passes_filter(inner, ctx.record())? {
        return Ok(());
    }

    if !inner.projection.is_aggregating() {
        let projected = project_plain(inner, ctx.record())?;
        dispatch_batch(inner, vec![projected]);
        return Ok(());
    }

    let window = inner
        .window
        .as_ref()
        .expect("aggregating query always has a window manager");
    let group_key = compute_group_key(
        &inner.group_by,
        ctx.record(),
        &inner.registry,
        inner.config.legacy_string_coercion,
    )?;
    ctx.set_group_key(group_key.clone());

    let mut values: IndexMap<String, Value> = IndexMap::new();
    for task in &inner.projection.tasks {
        let value = match &task.arg {
            Some(arg) => {
                arg.evaluate_value_with_null(
                    ctx.record(),
                    &inner.registry,
                    inner.config.legacy_string_coercion,
                )?
                .0
            }
            None => Value::Int(1), // COUNT(*): any non-null placeholder, the star ignores nullness anyway
        };
        values.insert(task.id.clone(), value);
    }

    let ts_ms = record_timestamp_ms(inner, &ctx);
    let group_key = ctx
        .group_key()
        .cloned()
        .expect("set above for every aggregating record");
    window.add(group_key, ts_ms, &values);
    Ok(())
}

fn emit_fired_batch(inner: &StreamInner, fired: Vec<crate::window::FiredWindow>) {
    if fired.is_empty() {
        return;
    }
    let mut batch = Vec::with_capacity(fired.len());
    for window in fired {
        match project_fired_window(inner, &window) {
            Ok(record) => batch.push(record),
            Err(e) => {
                error!("dropping fired window after post-aggregation error: {e}");
            }
        }
    }
    dispatch_batch(inner, batch);
}

fn project_fired_window(inner: &StreamInner, fired: &crate::window::FiredWindow) -> Result<Record> {
    let mut synthetic: Record = fired.values.clone();
    for (expr, value) in inner.group_by.iter().zip(fired.group_key.iter()) {
        synthetic.insert(expr.source().to_string(), value.clone());
    }

    let mut out = Record::new();
    out.insert(
        "window_start".to_string(),
        Value::Int(fired.window_id.0 / 1000),
    );
    out.insert(
        "window_end".to_string(),
        Value::Int(fired.window_id.1 / 1000),
    );
    for col in &inner.projection.columns {
        let (value, _is_null) = col.post_agg.evaluate_value_with_null(
            &synthetic,
            &inner.registry,
            inner.config.legacy_string_coercion,
        )?;
        out.insert(col.name.clone(), value);
    }
    Ok(out)
}

fn dispatch_batch(inner: &StreamInner, batch: Vec<Record>) {
    if batch.is_empty() {
        return;
    }
    for sink in inner.sinks.read().iter() {
        let sink = sink.clone();
        let batch_ref = &batch;
        if catch_unwind(AssertUnwindSafe(|| sink.handle(batch_ref))).is_err() {
            error!("sink panicked; isolated, runtime continues");
        }
    }
}
