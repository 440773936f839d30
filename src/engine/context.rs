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
//! Shared per-run execution context.
//!
//! Responsibilities:
//! - Bundles the run-wide collaborators every publisher needs: the job, the
//!   composite listener, the error record, both task runners and the
//!   job-level completion join.
//!
//! Key exported interfaces:
//! - Types: `RunContext`.

use std::sync::Arc;

use crate::common::error::ErrorState;
use crate::engine::listener::AnalysisJobListener;
use crate::engine::metrics::RunMetrics;
use crate::model::job::AnalysisJob;
use crate::runtime::join::TaskJoin;
use crate::runtime::task_runner::{ErrorAwareTaskRunner, TaskRunner};

/// One run's shared execution context.
///
/// Control tasks (publisher lifecycles) go through `control_tasks` and always
/// run, so lifecycle close hooks and the completion countdown cannot be
/// starved by the error short-circuit. Row tasks go through `row_tasks`,
/// which refuses work after the first recorded error.
pub struct RunContext {
    job: Arc<AnalysisJob>,
    listener: Arc<dyn AnalysisJobListener>,
    errors: Arc<ErrorState>,
    control_tasks: Arc<dyn TaskRunner>,
    row_tasks: Arc<ErrorAwareTaskRunner>,
    completion: Arc<TaskJoin>,
    metrics: Arc<RunMetrics>,
    row_task_queue_limit: usize,
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job: Arc<AnalysisJob>,
        listener: Arc<dyn AnalysisJobListener>,
        errors: Arc<ErrorState>,
        control_tasks: Arc<dyn TaskRunner>,
        row_tasks: Arc<ErrorAwareTaskRunner>,
        completion: Arc<TaskJoin>,
        metrics: Arc<RunMetrics>,
        row_task_queue_limit: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            job,
            listener,
            errors,
            control_tasks,
            row_tasks,
            completion,
            metrics,
            row_task_queue_limit: row_task_queue_limit.max(1),
        })
    }

    pub fn job(&self) -> &Arc<AnalysisJob> {
        &self.job
    }

    pub fn listener(&self) -> &Arc<dyn AnalysisJobListener> {
        &self.listener
    }

    pub fn errors(&self) -> &Arc<ErrorState> {
        &self.errors
    }

    pub fn control_tasks(&self) -> &Arc<dyn TaskRunner> {
        &self.control_tasks
    }

    pub fn row_tasks(&self) -> &Arc<ErrorAwareTaskRunner> {
        &self.row_tasks
    }

    pub fn completion(&self) -> &Arc<TaskJoin> {
        &self.completion
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Dispatch-side backpressure bound: when more than this many row tasks
    /// are pending, the dispatching thread assists execution instead of
    /// queueing further ahead.
    pub fn row_task_queue_limit(&self) -> usize {
        self.row_task_queue_limit
    }
}
