// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Row processing publisher: the per-stream orchestrator.
//!
//! Responsibilities:
//! - Owns one stream's consumer lifecycle (init → process → close) and
//!   drives row iteration: pulled from a scoped datastore connection for
//!   source tables, pushed by the parent's consumers for nested streams.
//! - Builds the stream's query plan lazily (and off the critical path), and
//!   joins all dispatched row tasks before declaring the stream done.
//!
//! Key exported interfaces:
//! - Types: `PublisherState`, `ActiveOutputStream`, `RowProcessingPublisher`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::common::error::{JobError, JobErrorKind};
use crate::common::ids::{RowId, RowIdGenerator};
use crate::common::memo::MemoCell;
use crate::engine::chain::ConsumeRowHandler;
use crate::engine::consumer::Consumer;
use crate::engine::context::RunContext;
use crate::engine::metrics::StreamMetrics;
use crate::engine::optimizer::{
    NoopQueryOptimizer, OptimizedQueryPlan, QueryOptimizer, RowProcessingQueryOptimizer,
};
use crate::engine::sorter::sort_consumers;
use crate::model::column::ColumnRef;
use crate::model::component::{ComponentJob, OutputStreamSink};
use crate::model::job::StreamKey;
use crate::model::row::Row;
use crate::model::value::Value;
use crate::runtime::background::background_executor;
use crate::runtime::join::TaskJoin;
use crate::runtime::task_runner::{TaskListener, TaskRunner};
use crate::scrubjay_logging::{debug, error, info, warn};
use crate::source::datastore::Datastore;
use crate::source::query::RowQuery;

/// Lifecycle of one stream's publisher. `Errored` absorbs from any step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublisherState {
    Created,
    ConsumersRegistered,
    Initializing,
    Processing,
    Closing,
    Done,
    Errored,
}

/// Buffer and one-shot production latch of one nested output stream.
///
/// The parent's consumers push derived records in; the child publisher
/// blocks on `await_production` until the parent closes the stream, then
/// drains the buffer.
pub struct ActiveOutputStream {
    key: StreamKey,
    buffer: Mutex<Vec<(RowId, Vec<Value>)>>,
    closed: Mutex<bool>,
    cv: Condvar,
}

impl ActiveOutputStream {
    pub fn new(key: StreamKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            buffer: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// One-shot: release every production waiter. Idempotent.
    pub fn close(&self) {
        let mut closed = self.closed.lock().expect("output stream latch lock");
        if !*closed {
            *closed = true;
            self.cv.notify_all();
        }
    }

    /// Block until the producing side closed the stream.
    pub fn await_production(&self) {
        let mut closed = self.closed.lock().expect("output stream latch lock");
        while !*closed {
            closed = self.cv.wait(closed).expect("output stream latch wait");
        }
    }

    pub fn drain(&self) -> Vec<(RowId, Vec<Value>)> {
        std::mem::take(&mut *self.buffer.lock().expect("output stream buffer lock"))
    }
}

impl OutputStreamSink for ActiveOutputStream {
    fn push(&self, source_row: RowId, values: Vec<Value>) {
        let closed = *self.closed.lock().expect("output stream latch lock");
        if closed {
            warn!(
                "Dropping late record for closed output stream {} (source row {})",
                self.key, source_row
            );
            return;
        }
        self.buffer
            .lock()
            .expect("output stream buffer lock")
            .push((source_row, values));
    }
}

enum StreamOrigin {
    SourceTable {
        datastore: Arc<dyn Datastore>,
        table: String,
    },
    Nested {
        name: String,
        columns: Vec<ColumnRef>,
        active: Arc<ActiveOutputStream>,
    },
}

/// Per-stream orchestrator: registers consumers, plans the query, runs the
/// lifecycle and reports into the run context.
pub struct RowProcessingPublisher {
    key: StreamKey,
    origin: StreamOrigin,
    consumers: Mutex<Vec<Arc<Consumer>>>,
    required_columns: Mutex<Vec<ColumnRef>>,
    state: Mutex<PublisherState>,
    plan: MemoCell<OptimizedQueryPlan>,
    id_generator: Arc<RowIdGenerator>,
    metrics: Arc<StreamMetrics>,
    children: Mutex<Vec<Arc<RowProcessingPublisher>>>,
    begin_fired: AtomicBool,
    closed: AtomicBool,
}

impl RowProcessingPublisher {
    pub fn new_source(
        key: StreamKey,
        datastore: Arc<dyn Datastore>,
        table: impl Into<String>,
    ) -> Arc<Self> {
        let metrics = StreamMetrics::new(key.clone());
        Arc::new(Self {
            key,
            origin: StreamOrigin::SourceTable {
                datastore,
                table: table.into(),
            },
            consumers: Mutex::new(Vec::new()),
            required_columns: Mutex::new(Vec::new()),
            state: Mutex::new(PublisherState::Created),
            plan: MemoCell::new(),
            id_generator: Arc::new(RowIdGenerator::new()),
            metrics,
            children: Mutex::new(Vec::new()),
            begin_fired: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn new_nested(
        key: StreamKey,
        name: impl Into<String>,
        columns: Vec<ColumnRef>,
        active: Arc<ActiveOutputStream>,
    ) -> Arc<Self> {
        let metrics = StreamMetrics::new(key.clone());
        Arc::new(Self {
            key,
            origin: StreamOrigin::Nested {
                name: name.into(),
                columns,
                active,
            },
            consumers: Mutex::new(Vec::new()),
            required_columns: Mutex::new(Vec::new()),
            state: Mutex::new(PublisherState::Created),
            plan: MemoCell::new(),
            id_generator: Arc::new(RowIdGenerator::new()),
            metrics,
            children: Mutex::new(Vec::new()),
            begin_fired: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    pub fn state(&self) -> PublisherState {
        *self.state.lock().expect("publisher state lock")
    }

    pub fn is_source_stream(&self) -> bool {
        matches!(self.origin, StreamOrigin::SourceTable { .. })
    }

    /// The nested stream's production latch; `None` for source streams.
    pub fn active_stream(&self) -> Option<Arc<ActiveOutputStream>> {
        match &self.origin {
            StreamOrigin::Nested { active, .. } => Some(Arc::clone(active)),
            StreamOrigin::SourceTable { .. } => None,
        }
    }

    pub fn register_consumer(&self, consumer: Arc<Consumer>) {
        // Source streams project exactly the physical columns their
        // consumers need, accumulated in registration order.
        if self.is_source_stream() {
            let mut required = self.required_columns.lock().expect("required columns lock");
            for column in consumer.required_columns() {
                if column.is_physical() && !required.iter().any(|c| c.id() == column.id()) {
                    required.push(column.clone());
                }
            }
        }
        self.consumers
            .lock()
            .expect("publisher consumers lock")
            .push(consumer);
    }

    pub fn consumers(&self) -> Vec<Arc<Consumer>> {
        self.consumers.lock().expect("publisher consumers lock").clone()
    }

    pub fn add_child(&self, child: Arc<RowProcessingPublisher>) {
        self.children.lock().expect("publisher children lock").push(child);
    }

    pub fn children(&self) -> Vec<Arc<RowProcessingPublisher>> {
        self.children.lock().expect("publisher children lock").clone()
    }

    /// Called by the registry when the whole job has been walked. The query
    /// plan may involve schema/connectivity calls, so it is warmed on the
    /// background executor rather than built inline.
    pub fn on_all_consumers_registered(self: &Arc<Self>) {
        self.set_state(PublisherState::ConsumersRegistered);
        let this = Arc::clone(self);
        let _ = background_executor().submit(move |_ctx| {
            if let Err(err) = this.plan() {
                debug!("Background plan build failed for {}: {}", this.key, err);
            }
        });
    }

    /// The stream's sorted, optimized execution plan (memoized, including a
    /// captured failure).
    pub fn plan(&self) -> Result<OptimizedQueryPlan, String> {
        self.plan.get_or_init(|| {
            let consumers = self.consumers();
            let sorted = sort_consumers(consumers)?;
            match &self.origin {
                StreamOrigin::SourceTable { table, .. } => {
                    let columns = self.required_columns.lock().expect("required columns lock");
                    let query = RowQuery::new(table.clone(), columns.clone());
                    drop(columns);
                    Ok(RowProcessingQueryOptimizer.optimize(query, sorted))
                }
                StreamOrigin::Nested { name, columns, .. } => {
                    let query = RowQuery::new(name.clone(), columns.clone());
                    Ok(NoopQueryOptimizer.optimize(query, sorted))
                }
            }
        })
    }

    fn set_state(&self, next: PublisherState) {
        let mut state = self.state.lock().expect("publisher state lock");
        // Errored is absorbing.
        if *state != PublisherState::Errored {
            *state = next;
        }
    }

    /// Fire `row_processing_begin` for this stream and, transitively, every
    /// nested stream hanging off its consumers. Idempotent.
    pub fn fire_row_processing_begin(&self, ctx: &RunContext) {
        if self.begin_fired.swap(true, Ordering::AcqRel) {
            return;
        }
        ctx.listener()
            .row_processing_begin(ctx.job(), &self.key, &self.metrics);
        if let StreamOrigin::SourceTable { datastore, table } = &self.origin {
            // Warm the best-effort count probe off the critical path.
            let metrics = Arc::clone(&self.metrics);
            let datastore = Arc::clone(datastore);
            let table = table.clone();
            let _ = background_executor().submit(move |_ctx| {
                let count = metrics.expected_row_count(|| {
                    let mut conn = datastore.open_connection()?;
                    conn.approximate_row_count(&table)
                });
                debug!("Expected row count for table {}: {}", table, count);
            });
        }
        for child in self.children() {
            child.fire_row_processing_begin(ctx);
        }
    }

    /// Initialize every consumer in parallel and join-wait for the slowest.
    pub fn initialize_consumers(self: &Arc<Self>, ctx: &Arc<RunContext>) -> Result<(), String> {
        self.set_state(PublisherState::Initializing);
        let consumers = self.consumers();
        let join = Arc::new(TaskJoin::new());
        for consumer in &consumers {
            join.register();

            ctx.listener()
                .component_begin(ctx.job(), consumer.component_job());
            let listener = Arc::new(InitTaskListener {
                join: Arc::clone(&join),
                ctx: Arc::clone(ctx),
                component: Arc::clone(consumer.component_job()),
            });
            let task_consumer = Arc::clone(consumer);
            ctx.row_tasks().run(
                Box::new(move || task_consumer.initialize()),
                Some(listener as Arc<dyn TaskListener>),
            );
        }
        join.seal();
        self.await_join(&join, ctx);
        match join.first_error() {
            Some(err) => Err(err.message),
            None => Ok(()),
        }
    }

    /// Iterate the stream's records and dispatch one row task per record.
    pub fn run_row_processing(self: &Arc<Self>, ctx: &Arc<RunContext>) -> Result<(), String> {
        self.fire_row_processing_begin(ctx);
        self.set_state(PublisherState::Processing);
        let plan = self.plan()?;
        let chain = Arc::new(ConsumeRowHandler::new(
            plan.consumers.clone(),
            Arc::clone(ctx.job()),
            Arc::clone(ctx.listener()),
            Arc::clone(&self.id_generator),
            plan.preloaded_outcomes.clone(),
        ));
        let join = Arc::new(TaskJoin::new());

        let iteration: Result<(), String> = match &self.origin {
            StreamOrigin::SourceTable { datastore, .. } => {
                // Scoped connection: released when `conn` drops, independent
                // of the one the count probe used.
                let mut conn = datastore.open_connection()?;
                let row_set = conn.execute(&plan.query)?;
                let mut result = Ok(());
                for record in row_set {
                    match record {
                        Ok(values) => {
                            let row = self.build_row(
                                self.id_generator.next_id(),
                                plan.query.columns(),
                                values,
                            );
                            self.dispatch_row(ctx, &chain, &join, row);
                        }
                        Err(message) => {
                            result = Err(message);
                            break;
                        }
                    }
                }
                result
            }
            StreamOrigin::Nested { columns, active, .. } => {
                // Push-driven: wait for the parent to finish producing.
                active.await_production();
                let mut last_source: Option<RowId> = None;
                for (source_row, values) in active.drain() {
                    // The first derived record of each source row keeps the
                    // parent's id; later ones mint fresh ids.
                    let id = if last_source == Some(source_row) {
                        self.id_generator.next_id()
                    } else {
                        last_source = Some(source_row);
                        self.id_generator.reserve_past(source_row);
                        source_row
                    };
                    let row = self.build_row(id, columns, values);
                    self.dispatch_row(ctx, &chain, &join, row);
                }
                Ok(())
            }
        };

        join.seal();
        self.await_join(&join, ctx);

        // The parent's production is over: release every child latch before
        // reporting, so nested publishers can never hang on this stream.
        self.close_children_production();

        iteration?;
        ctx.listener()
            .row_processing_success(ctx.job(), &self.key, &self.metrics);
        Ok(())
    }

    fn build_row(&self, id: RowId, columns: &[ColumnRef], values: Vec<Value>) -> Row {
        let bindings = columns
            .iter()
            .map(|column| column.id())
            .zip(values)
            .collect();
        Row::from_values(id, bindings)
    }

    fn dispatch_row(
        &self,
        ctx: &Arc<RunContext>,
        chain: &Arc<ConsumeRowHandler>,
        join: &Arc<TaskJoin>,
        row: Row,
    ) {
        join.register();
        let listener = Arc::new(RowTaskListener {
            join: Arc::clone(join),
            ctx: Arc::clone(ctx),
        });
        let task_chain = Arc::clone(chain);
        let task_ctx = Arc::clone(ctx);
        let metrics = Arc::clone(&self.metrics);
        let key = self.key.clone();
        ctx.row_tasks().run(
            Box::new(move || {
                let snapshot = row.clone();
                task_chain.consume_row(row);
                let current = metrics.record_processed_row();
                task_ctx
                    .listener()
                    .row_processing_progress(task_ctx.job(), &key, &snapshot, current);
                Ok(())
            }),
            Some(listener as Arc<dyn TaskListener>),
        );
        // Dispatch-side backpressure: never run unboundedly ahead of the
        // workers.
        if join.pending() > ctx.row_task_queue_limit() {
            ctx.row_tasks().assist_execution();
        }
    }

    fn await_join(&self, join: &Arc<TaskJoin>, ctx: &Arc<RunContext>) {
        // Help drain the pool while waiting; a saturated pool must not
        // deadlock against the joining thread.
        while !join.wait_timeout(Duration::from_millis(10)) {
            ctx.row_tasks().assist_execution();
        }
    }

    fn close_children_production(&self) {
        for child in self.children() {
            if let Some(active) = child.active_stream() {
                active.close();
            }
        }
    }

    /// Fire every consumer's close hook. Runs exactly once per publisher,
    /// also after failures, to release resources deterministically.
    pub fn close_consumers(&self, ctx: &RunContext) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.set_state(PublisherState::Closing);
        for consumer in self.consumers() {
            if let Err(message) = consumer.close() {
                error!(
                    "Consumer close failed: component={} error={}",
                    consumer.component_job(),
                    message
                );
                let err = JobError::component_setup(consumer.id(), message);
                ctx.listener()
                    .error_in_component(ctx.job(), consumer.component_job(), None, &err);
            }
        }
    }

    /// The complete lifecycle of this publisher as one control task:
    /// initialize → process → close, then schedule the nested publishers and
    /// report into the job-level completion join.
    pub fn run(self: Arc<Self>, ctx: Arc<RunContext>) {
        let mut failed = ctx.errors().is_short_circuited();
        if failed {
            debug!("Skipping row processing for {}: previous error", self.key);
        } else {
            match self.initialize_consumers(&ctx) {
                Ok(()) => {
                    if let Err(message) = self.run_row_processing(&ctx) {
                        let err = JobError::unknown(message);
                        ctx.listener().error_unknown(ctx.job(), &err);
                        failed = true;
                    }
                }
                Err(message) => {
                    info!("Consumer initialization failed for {}: {}", self.key, message);
                    failed = true;
                }
            }
        }

        // Even on the failure paths: children must never hang on their
        // production latch, and close hooks must fire.
        self.close_children_production();
        self.close_consumers(&ctx);
        self.set_state(if failed || ctx.errors().is_short_circuited() {
            PublisherState::Errored
        } else {
            PublisherState::Done
        });

        for child in self.children() {
            let child_ctx = Arc::clone(&ctx);
            ctx.control_tasks().run(
                Box::new(move || {
                    child.run(child_ctx);
                    Ok(())
                }),
                None,
            );
        }

        ctx.completion().on_complete();
    }

    /// Schedule this publisher's lifecycle on the control task runner.
    pub fn spawn(self: Arc<Self>, ctx: Arc<RunContext>) {
        let run_ctx = Arc::clone(&ctx);
        ctx.control_tasks().run(
            Box::new(move || {
                self.run(run_ctx);
                Ok(())
            }),
            None,
        );
    }
}

/// Join adapter for consumer-init tasks: failures are component-scoped.
struct InitTaskListener {
    join: Arc<TaskJoin>,
    ctx: Arc<RunContext>,
    component: Arc<ComponentJob>,
}

impl TaskListener for InitTaskListener {
    fn on_complete(&self) {
        self.join.on_complete();
    }

    fn on_error(&self, err: &JobError) {
        if err.kind != JobErrorKind::Previous {
            let scoped = JobError::component_setup(self.component.id(), err.message.clone());
            self.ctx.listener().error_in_component(
                self.ctx.job(),
                &self.component,
                None,
                &scoped,
            );
        }
        self.join.on_error(err);
    }
}

/// Join adapter for row tasks: the chain reports component errors itself, so
/// anything surfacing here is job-level (a panic) or the refusal sentinel.
struct RowTaskListener {
    join: Arc<TaskJoin>,
    ctx: Arc<RunContext>,
}

impl TaskListener for RowTaskListener {
    fn on_complete(&self) {
        self.join.on_complete();
    }

    fn on_error(&self, err: &JobError) {
        if err.kind == JobErrorKind::Unknown {
            self.ctx.listener().error_unknown(self.ctx.job(), err);
        }
        self.join.on_error(err);
    }
}
