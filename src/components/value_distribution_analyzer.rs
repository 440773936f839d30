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
//! Value distribution analyzer.

use std::sync::Mutex;

use crate::model::column::ColumnRef;
use crate::model::component::{Analyzer, AnalyzerResult, Component};
use crate::model::row::Row;

/// Accumulates occurrence counts per distinct value of one column, in
/// first-seen order. Guarded by a mutex so concurrent consumption is safe.
pub struct ValueDistributionAnalyzer {
    column: ColumnRef,
    counts: Mutex<Vec<(String, u64)>>,
}

impl ValueDistributionAnalyzer {
    pub fn new(column: ColumnRef) -> Self {
        Self {
            column,
            counts: Mutex::new(Vec::new()),
        }
    }
}

impl Component for ValueDistributionAnalyzer {
    fn name(&self) -> &str {
        "Value distribution"
    }
}

impl Analyzer for ValueDistributionAnalyzer {
    fn consume(&self, row: &Row, distinct_count: usize) -> Result<(), String> {
        let rendered = row
            .value(&self.column)
            .map(|value| value.to_string())
            .unwrap_or_else(|| "<null>".to_string());
        let mut counts = self.counts.lock().expect("value distribution lock");
        if let Some(entry) = counts.iter_mut().find(|(value, _)| *value == rendered) {
            entry.1 += distinct_count as u64;
        } else {
            counts.push((rendered, distinct_count as u64));
        }
        Ok(())
    }

    fn result(&self) -> AnalyzerResult {
        AnalyzerResult::Distribution(self.counts.lock().expect("value distribution lock").clone())
    }
}
