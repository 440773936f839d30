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
//! Plain row counter.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::model::component::{Analyzer, AnalyzerResult, Component};
use crate::model::row::Row;

/// Counts consumed rows. Internally thread-safe, so it stays correct under
/// concurrent row dispatch.
#[derive(Default)]
pub struct RowCountAnalyzer {
    rows: AtomicI64,
}

impl RowCountAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for RowCountAnalyzer {
    fn name(&self) -> &str {
        "Row count"
    }
}

impl Analyzer for RowCountAnalyzer {
    fn consume(&self, _row: &Row, distinct_count: usize) -> Result<(), String> {
        self.rows
            .fetch_add(distinct_count as i64, Ordering::Relaxed);
        Ok(())
    }

    fn result(&self) -> AnalyzerResult {
        AnalyzerResult::Number(self.rows.load(Ordering::Relaxed))
    }
}
