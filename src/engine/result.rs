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
//! Future-like result handle of one job run.
//!
//! Responsibilities:
//! - Exposes completion, status, cancellation and the blocking result
//!   accessors; an unsuccessful job surfaces one aggregating failure
//!   wrapping every collected error.
//!
//! Key exported interfaces:
//! - Types: `JobStatus`, `AnalysisResultFuture`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::common::error::{ErrorState, JobError, JobFailedError};
use crate::common::ids::ComponentId;
use crate::model::component::{AnalyzerResult, ComponentJob, ComponentKind};
use crate::model::job::AnalysisJob;
use crate::runtime::join::TaskJoin;

/// Aggregate status of one run.
///
/// The spelling of the error state follows the system's historical status
/// name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    NotFinished,
    Successful,
    Errornous,
}

/// Handle returned by `run()`. Completion is join-counted over every
/// publisher (nested streams included); the blocking accessors lazily
/// `await` and then either yield analyzer results or throw the aggregate
/// job-failed error.
pub struct AnalysisResultFuture {
    job: Arc<AnalysisJob>,
    completion: Arc<TaskJoin>,
    errors: Arc<ErrorState>,
    analyzers: Vec<Arc<ComponentJob>>,
}

impl AnalysisResultFuture {
    pub fn new(
        job: Arc<AnalysisJob>,
        completion: Arc<TaskJoin>,
        errors: Arc<ErrorState>,
    ) -> Self {
        let analyzers = job.all_analyzers();
        Self {
            job,
            completion,
            errors,
            analyzers,
        }
    }

    pub fn job(&self) -> &Arc<AnalysisJob> {
        &self.job
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    /// Block until every publisher reported completion.
    pub fn await_done(&self) {
        let _ = self.completion.wait();
    }

    /// Bounded wait. Returns whether the job finished within the timeout;
    /// an elapsed timeout does not stop the background job.
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        self.completion.wait_timeout(timeout)
    }

    /// Inject the cancellation error. Already-running tasks are not
    /// interrupted; not-yet-started work is refused from here on.
    pub fn cancel(&self) {
        if !self.is_done() {
            self.errors.record(JobError::cancelled());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.errors.is_cancelled()
    }

    pub fn status(&self) -> JobStatus {
        if !self.is_done() {
            // A recorded error makes the eventual outcome unambiguous.
            if self.errors.is_errored() {
                return JobStatus::Errornous;
            }
            return JobStatus::NotFinished;
        }
        if self.errors.is_errored() {
            JobStatus::Errornous
        } else {
            JobStatus::Successful
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status() == JobStatus::Successful
    }

    pub fn errors(&self) -> Vec<JobError> {
        self.errors.errors()
    }

    fn ensure_successful(&self) -> Result<(), JobFailedError> {
        self.await_done();
        if self.errors.is_errored() {
            return Err(JobFailedError::new(self.errors.errors()));
        }
        Ok(())
    }

    /// Every analyzer's result, in job order. Blocks until done; fails with
    /// the aggregating error when the job was not successful.
    pub fn results(&self) -> Result<Vec<AnalyzerResult>, JobFailedError> {
        self.ensure_successful()?;
        Ok(self
            .analyzers
            .iter()
            .map(|analyzer| analyzer_result(analyzer))
            .collect())
    }

    /// One analyzer's result. Blocks until done.
    pub fn result_for(&self, component: ComponentId) -> Result<AnalyzerResult, JobFailedError> {
        self.ensure_successful()?;
        self.analyzers
            .iter()
            .find(|analyzer| analyzer.id() == component)
            .map(|analyzer| analyzer_result(analyzer))
            .ok_or_else(|| {
                JobFailedError::new(vec![JobError::unknown(format!(
                    "component {} is not an analyzer of this job",
                    component
                ))])
            })
    }

    /// All results keyed by component id. Blocks until done.
    pub fn result_map(&self) -> Result<HashMap<ComponentId, AnalyzerResult>, JobFailedError> {
        self.ensure_successful()?;
        Ok(self
            .analyzers
            .iter()
            .map(|analyzer| (analyzer.id(), analyzer_result(analyzer)))
            .collect())
    }
}

fn analyzer_result(component: &ComponentJob) -> AnalyzerResult {
    match component.kind() {
        ComponentKind::Analyzer(analyzer) => analyzer.result(),
        // `analyzers` is filtered at construction; other roles cannot occur.
        _ => AnalyzerResult::Text(String::new()),
    }
}
