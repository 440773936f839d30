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
//! Row-processing metrics.
//!
//! Responsibilities:
//! - Tracks expected and processed row counts per stream for progress
//!   reporting; the expected count is a once-only, best-effort probe.
//!
//! Key exported interfaces:
//! - Types: `StreamMetrics`, `RunMetrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::memo::MemoCell;
use crate::model::job::StreamKey;

/// Sentinel for "row count unknown" in progress reporting.
pub const ROW_COUNT_UNKNOWN: i64 = -1;

/// Per-stream progress counters.
pub struct StreamMetrics {
    stream: StreamKey,
    expected_rows: MemoCell<i64>,
    processed_rows: AtomicU64,
}

impl StreamMetrics {
    pub fn new(stream: StreamKey) -> Arc<Self> {
        Arc::new(Self {
            stream,
            expected_rows: MemoCell::new(),
            processed_rows: AtomicU64::new(0),
        })
    }

    pub fn stream(&self) -> &StreamKey {
        &self.stream
    }

    /// Expected row count, computed once through `probe` on first demand.
    /// A failed or unknown estimate is non-fatal and reported as
    /// [`ROW_COUNT_UNKNOWN`].
    pub fn expected_row_count<F>(&self, probe: F) -> i64
    where
        F: FnOnce() -> Result<Option<u64>, String>,
    {
        self.expected_rows
            .get_or_init(|| {
                Ok(match probe()? {
                    Some(count) => i64::try_from(count).unwrap_or(i64::MAX),
                    None => ROW_COUNT_UNKNOWN,
                })
            })
            .unwrap_or(ROW_COUNT_UNKNOWN)
    }

    /// Expected count if a probe already ran; never triggers one.
    pub fn expected_row_count_if_known(&self) -> Option<i64> {
        self.expected_rows.peek().map(|r| r.unwrap_or(ROW_COUNT_UNKNOWN))
    }

    pub fn record_processed_row(&self) -> u64 {
        self.processed_rows.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed_rows(&self) -> u64 {
        self.processed_rows.load(Ordering::Relaxed)
    }
}

/// Aggregate view over all stream metrics of one run, in stream
/// registration order.
#[derive(Default)]
pub struct RunMetrics {
    streams: Mutex<Vec<Arc<StreamMetrics>>>,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_stream(&self, metrics: Arc<StreamMetrics>) {
        self.streams.lock().expect("run metrics lock").push(metrics);
    }

    pub fn stream(&self, key: &StreamKey) -> Option<Arc<StreamMetrics>> {
        self.streams
            .lock()
            .expect("run metrics lock")
            .iter()
            .find(|m| m.stream() == key)
            .cloned()
    }

    pub fn streams(&self) -> Vec<Arc<StreamMetrics>> {
        self.streams.lock().expect("run metrics lock").clone()
    }

    pub fn total_processed_rows(&self) -> u64 {
        self.streams
            .lock()
            .expect("run metrics lock")
            .iter()
            .map(|m| m.processed_rows())
            .sum()
    }
}
