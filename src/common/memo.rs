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
use std::sync::{Condvar, Mutex};

/// Compute-once cell that also caches a captured failure.
///
/// The first caller of [`MemoCell::get_or_init`] runs the closure; every
/// later caller gets a clone of the same result, including the same error
/// when the computation failed. Concurrent callers block until the first
/// computation settles; the closure runs at most once per cell.
pub struct MemoCell<T: Clone> {
    state: Mutex<MemoState<T>>,
    cv: Condvar,
}

enum MemoState<T> {
    Empty,
    Computing,
    Ready(Result<T, String>),
}

impl<T: Clone> MemoCell<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoState::Empty),
            cv: Condvar::new(),
        }
    }

    pub fn get_or_init<F>(&self, compute: F) -> Result<T, String>
    where
        F: FnOnce() -> Result<T, String>,
    {
        {
            let mut guard = self.state.lock().expect("memo cell lock");
            loop {
                match &*guard {
                    MemoState::Ready(result) => return result.clone(),
                    MemoState::Computing => {
                        guard = self.cv.wait(guard).expect("memo cell wait");
                    }
                    MemoState::Empty => {
                        *guard = MemoState::Computing;
                        break;
                    }
                }
            }
        }

        // Run the closure outside the lock; it may do connectivity calls.
        let result = compute();
        let mut guard = self.state.lock().expect("memo cell lock");
        *guard = MemoState::Ready(result.clone());
        self.cv.notify_all();
        result
    }

    /// Already-settled value, if any. Never triggers computation.
    pub fn peek(&self) -> Option<Result<T, String>> {
        match &*self.state.lock().expect("memo cell lock") {
            MemoState::Ready(result) => Some(result.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> Default for MemoCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
