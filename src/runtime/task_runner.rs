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
//! Shared task runner abstraction and worker pool.
//!
//! Responsibilities:
//! - Schedules discrete units of work across worker threads; completion is
//!   signaled through callback listeners, never by blocking the scheduler.
//! - Lets waiting threads help drain pending work (`assist_execution`), and
//!   short-circuits scheduling after the first recorded error.
//!
//! Key exported interfaces:
//! - Types: `Task`, `TaskListener`, `TaskRunner`, `MultiThreadedTaskRunner`,
//!   `SingleThreadedTaskRunner`, `ErrorAwareTaskRunner`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::common::error::{ErrorState, JobError};
use crate::scrubjay_logging::error;

/// One unit of work. Errors are reported to the task's listener, never
/// thrown at the scheduler.
pub type Task = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

/// Completion callbacks for one scheduled task.
pub trait TaskListener: Send + Sync {
    fn on_begin(&self) {}

    fn on_complete(&self) {}

    fn on_error(&self, error: &JobError) {
        let _ = error;
    }
}

/// Scheduler contract: fire-and-observe task execution.
pub trait TaskRunner: Send + Sync {
    fn run(&self, task: Task, listener: Option<Arc<dyn TaskListener>>);

    /// Drain one pending task on the calling thread, if any. Used by threads
    /// blocked in a join-wait loop so a saturated pool cannot starve them.
    fn assist_execution(&self);

    fn shutdown(&self);
}

struct QueuedTask {
    task: Task,
    listener: Option<Arc<dyn TaskListener>>,
}

fn execute_queued(queued: QueuedTask) {
    let QueuedTask { task, listener } = queued;
    if let Some(listener) = listener.as_ref() {
        listener.on_begin();
    }
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || task()))
        .unwrap_or_else(|payload| {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            Err(format!("panic in task execution: {msg}"))
        });
    match outcome {
        Ok(()) => {
            if let Some(listener) = listener.as_ref() {
                listener.on_complete();
            }
        }
        Err(msg) => {
            error!("task failed: {}", msg);
            if let Some(listener) = listener.as_ref() {
                listener.on_error(&JobError::unknown(msg));
            }
        }
    }
}

struct RunnerShared {
    queue: Mutex<VecDeque<QueuedTask>>,
    cv: Condvar,
    shutdown: AtomicBool,
}

impl RunnerShared {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn pop_one(&self) -> Option<QueuedTask> {
        let mut queue = self.queue.lock().expect("task runner queue lock");
        queue.pop_front()
    }
}

/// Worker pool draining a shared queue. The pool is created per engine (not
/// per run) and shut down when the owner is done with it.
pub struct MultiThreadedTaskRunner {
    shared: Arc<RunnerShared>,
    _workers: Vec<thread::JoinHandle<()>>,
}

impl MultiThreadedTaskRunner {
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let shared = Arc::new(RunnerShared::new());
        let mut workers = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let shared_cloned = Arc::clone(&shared);
            workers.push(thread::spawn(move || worker_loop(shared_cloned)));
        }
        Self {
            shared,
            _workers: workers,
        }
    }
}

impl TaskRunner for MultiThreadedTaskRunner {
    fn run(&self, task: Task, listener: Option<Arc<dyn TaskListener>>) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            if let Some(listener) = listener.as_ref() {
                listener.on_error(&JobError::unknown("task runner is shut down"));
            }
            return;
        }
        let mut queue = self.shared.queue.lock().expect("task runner queue lock");
        queue.push_back(QueuedTask { task, listener });
        drop(queue);
        self.shared.cv.notify_one();
    }

    fn assist_execution(&self) {
        if let Some(queued) = self.shared.pop_one() {
            execute_queued(queued);
        } else {
            thread::yield_now();
        }
    }

    fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.cv.notify_all();
    }
}

fn worker_loop(shared: Arc<RunnerShared>) {
    loop {
        let queued = {
            let mut queue = shared.queue.lock().expect("task runner queue lock");
            while queue.is_empty() && !shared.shutdown.load(Ordering::Acquire) {
                queue = shared
                    .cv
                    .wait(queue)
                    .expect("task runner queue condvar wait");
            }
            if queue.is_empty() && shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            queue.pop_front()
        };
        let Some(queued) = queued else {
            continue;
        };
        execute_queued(queued);
    }
}

/// Executes every task inline on the calling thread. Serializes the whole
/// run; the deterministic choice for tests and for jobs carrying components
/// that declare themselves not concurrency-safe.
#[derive(Default)]
pub struct SingleThreadedTaskRunner;

impl SingleThreadedTaskRunner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskRunner for SingleThreadedTaskRunner {
    fn run(&self, task: Task, listener: Option<Arc<dyn TaskListener>>) {
        execute_queued(QueuedTask { task, listener });
    }

    fn assist_execution(&self) {
        // Nothing queued; tasks run inline at submission.
    }

    fn shutdown(&self) {}
}

/// Wrapper that stops scheduling once any error is recorded for the run.
///
/// Refused tasks are failed immediately with the shared "previous error"
/// sentinel instead of re-executed, so one failure does not flood the error
/// list with follow-on noise.
pub struct ErrorAwareTaskRunner {
    inner: Arc<dyn TaskRunner>,
    errors: Arc<ErrorState>,
}

impl ErrorAwareTaskRunner {
    pub fn new(inner: Arc<dyn TaskRunner>, errors: Arc<ErrorState>) -> Self {
        Self { inner, errors }
    }

    pub fn error_state(&self) -> &Arc<ErrorState> {
        &self.errors
    }
}

impl TaskRunner for ErrorAwareTaskRunner {
    fn run(&self, task: Task, listener: Option<Arc<dyn TaskListener>>) {
        if self.errors.is_short_circuited() {
            if let Some(listener) = listener.as_ref() {
                listener.on_error(&JobError::previous());
            }
            return;
        }
        self.inner.run(task, listener);
    }

    fn assist_execution(&self) {
        self.inner.assist_execution();
    }

    fn shutdown(&self) {
        self.inner.shutdown();
    }
}
