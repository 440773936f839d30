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
//! Join-countdown primitive for fan-out/fan-in task scheduling.
//!
//! Responsibilities:
//! - Tracks registered vs. arrived task completions, remembers the first
//!   error, and releases waiters exactly when every registered task arrived.
//! - Doubles as a `TaskListener`, and fires an optional once-only callback
//!   on the arrival that completes the join.
//!
//! Key exported interfaces:
//! - Types: `TaskJoin`.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::common::error::JobError;
use crate::runtime::task_runner::TaskListener;

#[derive(Debug)]
struct JoinState {
    registered: usize,
    arrived: usize,
    sealed: bool,
    first_error: Option<JobError>,
}

impl JoinState {
    fn is_done(&self) -> bool {
        self.sealed && self.arrived >= self.registered
    }
}

type DoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// Countdown over a dynamically registered set of tasks.
///
/// Register before dispatch, seal when registration ends; waiters are
/// released once every registered task arrived (complete or error). With an
/// unknown task count, registration and arrival interleave safely because
/// completion additionally requires `seal()`.
pub struct TaskJoin {
    state: Mutex<JoinState>,
    cv: Condvar,
    on_done: Mutex<Option<DoneCallback>>,
}

impl TaskJoin {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JoinState {
                registered: 0,
                arrived: 0,
                sealed: false,
                first_error: None,
            }),
            cv: Condvar::new(),
            on_done: Mutex::new(None),
        }
    }

    /// Join over a fixed, known task count.
    pub fn sealed_with(count: usize) -> Self {
        let join = Self::new();
        {
            let mut state = join.state.lock().expect("task join lock");
            state.registered = count;
            state.sealed = true;
        }
        join
    }

    pub fn register(&self) {
        let mut state = self.state.lock().expect("task join lock");
        state.registered += 1;
    }

    /// End of registration. May itself complete the join (zero tasks, or all
    /// registered tasks already arrived).
    pub fn seal(&self) {
        let mut state = self.state.lock().expect("task join lock");
        state.sealed = true;
        let done = state.is_done();
        drop(state);
        if done {
            self.finish();
        }
    }

    fn arrive(&self, error: Option<&JobError>) {
        let mut state = self.state.lock().expect("task join lock");
        state.arrived += 1;
        if let Some(error) = error
            && state.first_error.is_none()
        {
            state.first_error = Some(error.clone());
        }
        let done = state.is_done();
        drop(state);
        if done {
            self.finish();
        }
    }

    fn finish(&self) {
        self.cv.notify_all();
        // Take under its own lock so the callback fires exactly once even
        // when seal() and the last arrival race.
        let callback = self.on_done.lock().expect("task join callback lock").take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Fired on the arrival (or seal) that completes the join. Set before
    /// dispatching any task.
    pub fn set_on_done(&self, callback: DoneCallback) {
        *self.on_done.lock().expect("task join callback lock") = Some(callback);
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().expect("task join lock").is_done()
    }

    /// Registered tasks that have not arrived yet.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().expect("task join lock");
        state.registered.saturating_sub(state.arrived)
    }

    pub fn first_error(&self) -> Option<JobError> {
        self.state
            .lock()
            .expect("task join lock")
            .first_error
            .clone()
    }

    /// Block until every registered task arrived; `Err` carries the first
    /// task error observed by this join.
    pub fn wait(&self) -> Result<(), JobError> {
        let mut state = self.state.lock().expect("task join lock");
        while !state.is_done() {
            state = self.cv.wait(state).expect("task join wait");
        }
        state.first_error.clone().map(Err).unwrap_or(Ok(()))
    }

    /// Bounded wait; returns whether the join completed within the timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.state.lock().expect("task join lock");
        if state.is_done() {
            return true;
        }
        let (state, _) = self
            .cv
            .wait_timeout_while(state, timeout, |s| !s.is_done())
            .expect("task join timed wait");
        state.is_done()
    }
}

impl Default for TaskJoin {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskListener for TaskJoin {
    fn on_complete(&self) {
        self.arrive(None);
    }

    fn on_error(&self, error: &JobError) {
        self.arrive(Some(error));
    }
}
