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
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use threadpool::ThreadPool;

use crate::common::app_config;

/// Context handed to a background task so it can observe cancellation.
pub struct BackgroundTaskContext {
    cancelled: Arc<AtomicBool>,
}

impl BackgroundTaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

struct BackgroundCompletion {
    done: AtomicBool,
    cv: Condvar,
    mu: Mutex<()>,
}

impl BackgroundCompletion {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            cv: Condvar::new(),
            mu: Mutex::new(()),
        }
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
        self.cv.notify_all();
    }

    fn wait(&self) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let guard = self.mu.lock().expect("background completion lock");
        let _guard = self
            .cv
            .wait_while(guard, |_| !self.done.load(Ordering::Acquire))
            .expect("background completion wait");
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.done.load(Ordering::Acquire) {
            return true;
        }
        let guard = self.mu.lock().expect("background completion lock");
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |_| !self.done.load(Ordering::Acquire))
            .expect("background completion wait");
        drop(guard);
        self.done.load(Ordering::Acquire)
    }
}

/// Handle to one submitted background task.
#[derive(Clone)]
pub struct BackgroundTaskHandle {
    cancelled: Arc<AtomicBool>,
    completion: Arc<BackgroundCompletion>,
}

impl BackgroundTaskHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.completion.cv.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.completion.done.load(Ordering::Acquire)
    }

    pub fn wait(&self) {
        self.completion.wait();
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.completion.wait_timeout(timeout)
    }
}

/// Pool for work that must stay off the row-processing critical path:
/// query-optimizer builds and row-count probes.
pub struct BackgroundExecutor {
    pool: ThreadPool,
}

impl BackgroundExecutor {
    pub fn new(num_threads: usize) -> Self {
        let threads = num_threads.max(1);
        let pool = ThreadPool::with_name("scrubjay_background".to_string(), threads);
        Self { pool }
    }

    pub fn submit<F>(&self, task: F) -> BackgroundTaskHandle
    where
        F: FnOnce(BackgroundTaskContext) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let completion = Arc::new(BackgroundCompletion::new());
        let ctx = BackgroundTaskContext {
            cancelled: Arc::clone(&cancelled),
        };
        let completion_cloned = Arc::clone(&completion);
        self.pool.execute(move || {
            task(ctx);
            completion_cloned.mark_done();
        });
        BackgroundTaskHandle {
            cancelled,
            completion,
        }
    }
}

static BACKGROUND_EXECUTOR: OnceLock<BackgroundExecutor> = OnceLock::new();

/// Process-wide background executor singleton.
pub fn background_executor() -> &'static BackgroundExecutor {
    BACKGROUND_EXECUTOR.get_or_init(|| {
        let threads = app_config::config()
            .ok()
            .map(|c| c.runtime.background_threads)
            .unwrap_or(2);
        BackgroundExecutor::new(threads)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn submit_runs_task_and_handle_waits() {
        let executor = BackgroundExecutor::new(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_cloned = Arc::clone(&counter);
        let handle = executor.submit(move |_ctx| {
            counter_cloned.fetch_add(1, Ordering::SeqCst);
        });
        handle.wait();
        assert!(handle.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_is_visible_to_the_task() {
        let executor = BackgroundExecutor::new(1);
        let observed = Arc::new(AtomicBool::new(false));
        let observed_cloned = Arc::clone(&observed);
        let gate = Arc::new(AtomicBool::new(false));
        let gate_cloned = Arc::clone(&gate);
        let handle = executor.submit(move |ctx| {
            while !gate_cloned.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
            observed_cloned.store(ctx.is_cancelled(), Ordering::SeqCst);
        });
        handle.cancel();
        gate.store(true, Ordering::Release);
        handle.wait();
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_timeout_observes_completion() {
        let executor = BackgroundExecutor::new(1);
        let handle = executor.submit(|_ctx| {});
        assert!(handle.wait_timeout(Duration::from_secs(5)));
    }
}
