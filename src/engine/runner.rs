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
//! Job execution delegate.
//!
//! Responsibilities:
//! - Validates the job, builds the publisher registry, kicks off every
//!   source-table publisher concurrently and returns the future handle.
//! - Setup failures are reported and rethrown synchronously; they are never
//!   deferred into the future.
//!
//! Key exported interfaces:
//! - Types: `AnalysisRunner`.

use std::sync::Arc;

use crate::common::app_config;
use crate::common::error::{ErrorState, JobError};
use crate::engine::context::RunContext;
use crate::engine::listener::{
    AnalysisJobListener, CompositeAnalysisJobListener, ErrorAwareAnalysisListener,
};
use crate::engine::metrics::RunMetrics;
use crate::engine::registry::PublisherRegistry;
use crate::engine::result::AnalysisResultFuture;
use crate::model::component::ComponentKind;
use crate::model::job::AnalysisJob;
use crate::runtime::join::TaskJoin;
use crate::runtime::task_runner::{ErrorAwareTaskRunner, MultiThreadedTaskRunner, TaskRunner};
use crate::scrubjay_logging::{debug, info};

/// Top-level orchestrator: `run(job)` returns a future-like handle
/// immediately; completion fires exactly once when every publisher
/// (transitively including nested streams) has finished.
pub struct AnalysisRunner {
    task_runner: Arc<dyn TaskRunner>,
    listeners: Vec<Arc<dyn AnalysisJobListener>>,
}

impl AnalysisRunner {
    /// Runner on a worker pool sized from the application config.
    pub fn new() -> Self {
        let threads = app_config::config()
            .ok()
            .map(|c| c.runtime.actual_exec_threads())
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });
        Self::with_task_runner(Arc::new(MultiThreadedTaskRunner::new(threads)))
    }

    /// Runner on a caller-provided scheduler (e.g. single-threaded for jobs
    /// carrying components that are not concurrency-safe).
    pub fn with_task_runner(task_runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            task_runner,
            listeners: Vec::new(),
        }
    }

    /// Register an observer. The observer set is fixed once `run` is called.
    pub fn add_listener(&mut self, listener: Arc<dyn AnalysisJobListener>) -> &mut Self {
        self.listeners.push(listener);
        self
    }

    /// Execute `job`. Validation errors surface synchronously; everything
    /// after setup is reported through the listener facade and the returned
    /// future.
    pub fn run(&self, job: AnalysisJob) -> Result<AnalysisResultFuture, JobError> {
        let job = Arc::new(job);
        let errors = ErrorState::new();

        let mut all_listeners = self.listeners.clone();
        all_listeners.push(Arc::new(ErrorAwareAnalysisListener::new(Arc::clone(&errors))));
        let listener: Arc<dyn AnalysisJobListener> =
            Arc::new(CompositeAnalysisJobListener::new(all_listeners));

        let registry = match PublisherRegistry::build(&job) {
            Ok(registry) => registry,
            Err(message) => {
                let err = JobError::unknown(message);
                listener.error_unknown(&job, &err);
                return Err(err);
            }
        };
        info!(
            "Starting job '{}' with {} publisher(s)",
            job.label(),
            registry.len()
        );

        let metrics = RunMetrics::new();
        for publisher in registry.publishers() {
            metrics.register_stream(Arc::clone(publisher.metrics()));
        }

        // Join keyed to the exact publisher count; the completing arrival
        // fires the job-level success exactly once.
        let completion = Arc::new(TaskJoin::new());
        for _ in 0..registry.len() {
            completion.register();
        }

        let row_tasks = Arc::new(ErrorAwareTaskRunner::new(
            Arc::clone(&self.task_runner),
            Arc::clone(&errors),
        ));
        let queue_limit = app_config::config()
            .ok()
            .map(|c| c.runtime.row_task_queue_limit)
            .unwrap_or(1024);
        let ctx = RunContext::new(
            Arc::clone(&job),
            Arc::clone(&listener),
            Arc::clone(&errors),
            Arc::clone(&self.task_runner),
            row_tasks,
            Arc::clone(&completion),
            Arc::clone(&metrics),
            queue_limit,
        );

        {
            let done_ctx = Arc::clone(&ctx);
            completion.set_on_done(Box::new(move || {
                finish_job(&done_ctx);
            }));
        }

        listener.job_begin(&job, &metrics);

        let sources = registry.source_publishers();
        debug!("Kicking off {} source publisher(s)", sources.len());
        for publisher in sources {
            publisher.spawn(Arc::clone(&ctx));
        }
        // Nested publishers are scheduled by their parents; a job with no
        // publishers at all completes right here.
        completion.seal();

        Ok(AnalysisResultFuture::new(job, completion, errors))
    }
}

impl Default for AnalysisRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Fired by the completing publisher arrival. Reports analyzer results and
/// the job-level success, or nothing but a log line for an errornous run
/// whose errors were all reported where they occurred.
fn finish_job(ctx: &RunContext) {
    if ctx.errors().is_errored() {
        info!(
            "Job '{}' finished with {} error(s)",
            ctx.job().label(),
            ctx.errors().errors().len()
        );
        return;
    }
    for analyzer in ctx.job().all_analyzers() {
        if let ComponentKind::Analyzer(instance) = analyzer.kind() {
            let result = instance.result();
            ctx.listener()
                .component_success(ctx.job(), &analyzer, Some(&result));
        }
    }
    ctx.listener().job_success(ctx.job(), ctx.metrics());
}
