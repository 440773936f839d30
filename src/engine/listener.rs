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
//! Listener facade for job progress, errors and completion.
//!
//! Responsibilities:
//! - Declares the observer contract the engine reports through; fans one
//!   event stream out to every registered observer.
//! - Hosts the error-aware observer whose recorded-error flag short-circuits
//!   the scheduler.
//!
//! Key exported interfaces:
//! - Types: `AnalysisJobListener`, `CompositeAnalysisJobListener`,
//!   `ErrorAwareAnalysisListener`, `InfoLoggingAnalysisListener`.

use std::sync::Arc;

use crate::common::error::{ErrorState, JobError};
use crate::engine::metrics::{RunMetrics, StreamMetrics};
use crate::model::component::{AnalyzerResult, ComponentJob};
use crate::model::job::{AnalysisJob, StreamKey};
use crate::model::row::Row;
use crate::scrubjay_logging::{debug, error, info};

/// The engine's only progress/result channel. All callbacks default to
/// no-ops so observers implement just what they need. The observer list is
/// fixed at run start; no ordering guarantee exists between observers beyond
/// "all registered observers see every event".
pub trait AnalysisJobListener: Send + Sync {
    fn job_begin(&self, job: &AnalysisJob, metrics: &RunMetrics) {
        let _ = (job, metrics);
    }

    fn job_success(&self, job: &AnalysisJob, metrics: &RunMetrics) {
        let _ = (job, metrics);
    }

    fn row_processing_begin(&self, job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        let _ = (job, stream, metrics);
    }

    fn row_processing_progress(&self, job: &AnalysisJob, stream: &StreamKey, row: &Row, current: u64) {
        let _ = (job, stream, row, current);
    }

    fn row_processing_success(&self, job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        let _ = (job, stream, metrics);
    }

    fn component_begin(&self, job: &AnalysisJob, component: &ComponentJob) {
        let _ = (job, component);
    }

    fn component_success(
        &self,
        job: &AnalysisJob,
        component: &ComponentJob,
        result: Option<&AnalyzerResult>,
    ) {
        let _ = (job, component, result);
    }

    fn error_in_component(
        &self,
        job: &AnalysisJob,
        component: &ComponentJob,
        row: Option<&Row>,
        err: &JobError,
    ) {
        let _ = (job, component, row, err);
    }

    fn error_unknown(&self, job: &AnalysisJob, err: &JobError) {
        let _ = (job, err);
    }
}

/// Fan-out over a fixed observer list, invoked in registration order.
pub struct CompositeAnalysisJobListener {
    listeners: Vec<Arc<dyn AnalysisJobListener>>,
}

impl CompositeAnalysisJobListener {
    pub fn new(listeners: Vec<Arc<dyn AnalysisJobListener>>) -> Self {
        Self { listeners }
    }
}

impl AnalysisJobListener for CompositeAnalysisJobListener {
    fn job_begin(&self, job: &AnalysisJob, metrics: &RunMetrics) {
        for listener in &self.listeners {
            listener.job_begin(job, metrics);
        }
    }

    fn job_success(&self, job: &AnalysisJob, metrics: &RunMetrics) {
        for listener in &self.listeners {
            listener.job_success(job, metrics);
        }
    }

    fn row_processing_begin(&self, job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        for listener in &self.listeners {
            listener.row_processing_begin(job, stream, metrics);
        }
    }

    fn row_processing_progress(
        &self,
        job: &AnalysisJob,
        stream: &StreamKey,
        row: &Row,
        current: u64,
    ) {
        for listener in &self.listeners {
            listener.row_processing_progress(job, stream, row, current);
        }
    }

    fn row_processing_success(&self, job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        for listener in &self.listeners {
            listener.row_processing_success(job, stream, metrics);
        }
    }

    fn component_begin(&self, job: &AnalysisJob, component: &ComponentJob) {
        for listener in &self.listeners {
            listener.component_begin(job, component);
        }
    }

    fn component_success(
        &self,
        job: &AnalysisJob,
        component: &ComponentJob,
        result: Option<&AnalyzerResult>,
    ) {
        for listener in &self.listeners {
            listener.component_success(job, component, result);
        }
    }

    fn error_in_component(
        &self,
        job: &AnalysisJob,
        component: &ComponentJob,
        row: Option<&Row>,
        err: &JobError,
    ) {
        for listener in &self.listeners {
            listener.error_in_component(job, component, row, err);
        }
    }

    fn error_unknown(&self, job: &AnalysisJob, err: &JobError) {
        for listener in &self.listeners {
            listener.error_unknown(job, err);
        }
    }
}

/// Accumulates every reported error into the shared error state whose flag
/// the error-aware task runner consults to refuse further work.
pub struct ErrorAwareAnalysisListener {
    state: Arc<ErrorState>,
}

impl ErrorAwareAnalysisListener {
    pub fn new(state: Arc<ErrorState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ErrorState> {
        &self.state
    }
}

impl AnalysisJobListener for ErrorAwareAnalysisListener {
    fn error_in_component(
        &self,
        _job: &AnalysisJob,
        _component: &ComponentJob,
        _row: Option<&Row>,
        err: &JobError,
    ) {
        self.state.record(err.clone());
    }

    fn error_unknown(&self, _job: &AnalysisJob, err: &JobError) {
        self.state.record(err.clone());
    }
}

/// Logs lifecycle events through the crate's logging facade. Opt-in.
#[derive(Default)]
pub struct InfoLoggingAnalysisListener;

impl InfoLoggingAnalysisListener {
    pub fn new() -> Self {
        Self
    }
}

impl AnalysisJobListener for InfoLoggingAnalysisListener {
    fn job_begin(&self, job: &AnalysisJob, _metrics: &RunMetrics) {
        info!("Job begin: {}", job.label());
    }

    fn job_success(&self, job: &AnalysisJob, metrics: &RunMetrics) {
        info!(
            "Job success: {} rows_processed={}",
            job.label(),
            metrics.total_processed_rows()
        );
    }

    fn row_processing_begin(&self, _job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        info!(
            "Row processing begin: stream={} expected_rows={:?}",
            stream,
            metrics.expected_row_count_if_known()
        );
    }

    fn row_processing_progress(
        &self,
        _job: &AnalysisJob,
        stream: &StreamKey,
        row: &Row,
        current: u64,
    ) {
        debug!("Row processed: stream={} row={} current={}", stream, row.id(), current);
    }

    fn row_processing_success(&self, _job: &AnalysisJob, stream: &StreamKey, metrics: &StreamMetrics) {
        info!(
            "Row processing success: stream={} rows={}",
            stream,
            metrics.processed_rows()
        );
    }

    fn component_begin(&self, _job: &AnalysisJob, component: &ComponentJob) {
        debug!("Component begin: {}", component);
    }

    fn component_success(
        &self,
        _job: &AnalysisJob,
        component: &ComponentJob,
        result: Option<&AnalyzerResult>,
    ) {
        match result {
            Some(result) => info!("Component success: {} result={}", component, result),
            None => info!("Component success: {}", component),
        }
    }

    fn error_in_component(
        &self,
        _job: &AnalysisJob,
        component: &ComponentJob,
        row: Option<&Row>,
        err: &JobError,
    ) {
        match row {
            Some(row) => error!("Error in component {} on {}: {}", component, row, err.message),
            None => error!("Error in component {}: {}", component, err.message),
        }
    }

    fn error_unknown(&self, job: &AnalysisJob, err: &JobError) {
        error!("Unknown error in job {}: {}", job.label(), err.message);
    }
}
