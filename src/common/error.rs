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
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::ids::{ComponentId, RowId};

/// Classification of one recorded job error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobErrorKind {
    /// Raised from one component's categorize/transform/consume for one row.
    Component,
    /// Anything escaping the per-row boundary (connectivity, setup, panics).
    Unknown,
    /// Synthetic error injected by `cancel()`.
    Cancelled,
    /// Sentinel attached to tasks refused after an earlier recorded error.
    Previous,
}

/// One error recorded during a job run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub component: Option<ComponentId>,
    pub row: Option<RowId>,
    pub message: String,
}

impl JobError {
    pub fn component(component: ComponentId, row: RowId, message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Component,
            component: Some(component),
            row: Some(row),
            message: message.into(),
        }
    }

    /// Component-scoped error with no row context (init/close hooks).
    pub fn component_setup(component: ComponentId, message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Component,
            component: Some(component),
            row: None,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::Unknown,
            component: None,
            row: None,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: JobErrorKind::Cancelled,
            component: None,
            row: None,
            message: "job was cancelled".to_string(),
        }
    }

    pub fn previous() -> Self {
        Self {
            kind: JobErrorKind::Previous,
            component: None,
            row: None,
            message: "a previous error occurred".to_string(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.component, self.row) {
            (Some(component), Some(row)) => write!(
                f,
                "component {} failed on row {}: {}",
                component, row, self.message
            ),
            (Some(component), None) => {
                write!(f, "component {} failed: {}", component, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for JobError {}

/// Aggregate failure returned by blocking result accessors of an errornous job.
#[derive(Clone, Debug)]
pub struct JobFailedError {
    errors: Vec<JobError>,
}

impl JobFailedError {
    pub fn new(errors: Vec<JobError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[JobError] {
        &self.errors
    }
}

impl fmt::Display for JobFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job failed with {} error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for JobFailedError {}

/// Shared error record for one job run.
///
/// Every recorded error makes the run errornous, but only unknown/job-level
/// errors (and cancellation) flip the short-circuit flag the error-aware
/// task runner consults: a per-row component error is contained at the
/// consumer boundary and must not stop the stream's other rows.
#[derive(Debug, Default)]
pub struct ErrorState {
    errored: AtomicBool,
    short_circuited: AtomicBool,
    cancelled: AtomicBool,
    errors: Mutex<Vec<JobError>>,
}

impl ErrorState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, error: JobError) {
        match error.kind {
            JobErrorKind::Cancelled => {
                self.cancelled.store(true, Ordering::Release);
                self.short_circuited.store(true, Ordering::Release);
            }
            JobErrorKind::Unknown => {
                self.short_circuited.store(true, Ordering::Release);
            }
            JobErrorKind::Component | JobErrorKind::Previous => {}
        }
        let mut errors = self.errors.lock().expect("error state lock");
        errors.push(error);
        self.errored.store(true, Ordering::Release);
    }

    /// Any error recorded; the run can no longer be successful.
    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::Acquire)
    }

    /// A job-level error or cancellation was recorded; not-yet-started work
    /// is refused from here on.
    pub fn is_short_circuited(&self) -> bool {
        self.short_circuited.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn errors(&self) -> Vec<JobError> {
        self.errors.lock().expect("error state lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_flips_errored_flag() {
        let state = ErrorState::new();
        assert!(!state.is_errored());
        state.record(JobError::unknown("boom"));
        assert!(state.is_errored());
        assert!(state.is_short_circuited());
        assert!(!state.is_cancelled());
        assert_eq!(state.errors().len(), 1);
    }

    #[test]
    fn component_errors_do_not_short_circuit() {
        let state = ErrorState::new();
        state.record(JobError::component(
            ComponentId::new(1),
            RowId::new(2),
            "bad row",
        ));
        assert!(state.is_errored());
        assert!(!state.is_short_circuited());
    }

    #[test]
    fn cancellation_is_separately_queryable() {
        let state = ErrorState::new();
        state.record(JobError::cancelled());
        assert!(state.is_errored());
        assert!(state.is_cancelled());
    }

    #[test]
    fn job_failed_error_lists_all_causes() {
        let err = JobFailedError::new(vec![
            JobError::unknown("first"),
            JobError::component(ComponentId::new(3), RowId::new(2), "second"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("first"));
        assert!(text.contains("component 3 failed on row 2: second"));
    }
}
