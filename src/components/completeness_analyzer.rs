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
//! Completeness analyzer with an "incomplete rows" output stream.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::model::column::ColumnRef;
use crate::model::component::{
    Analyzer, AnalyzerResult, Component, OutputStreamCollector,
};
use crate::model::row::Row;
use crate::model::value::Value;

/// Counts rows with a null in any watched column. Each incomplete row's
/// watched values are published into the [`Self::STREAM_INCOMPLETE`] output
/// stream, where a nested sub-job can drill into them.
pub struct CompletenessAnalyzer {
    columns: Vec<ColumnRef>,
    incomplete: AtomicI64,
    incomplete_stream: Mutex<Option<OutputStreamCollector>>,
}

impl CompletenessAnalyzer {
    pub const STREAM_INCOMPLETE: &'static str = "incomplete rows";

    pub fn new(columns: Vec<ColumnRef>) -> Self {
        Self {
            columns,
            incomplete: AtomicI64::new(0),
            incomplete_stream: Mutex::new(None),
        }
    }
}

impl Component for CompletenessAnalyzer {
    fn name(&self) -> &str {
        "Completeness"
    }

    fn attach_output_stream(&self, stream_name: &str, collector: OutputStreamCollector) {
        if stream_name == Self::STREAM_INCOMPLETE {
            *self
                .incomplete_stream
                .lock()
                .expect("incomplete stream lock") = Some(collector);
        }
    }
}

impl Analyzer for CompletenessAnalyzer {
    fn consume(&self, row: &Row, _distinct_count: usize) -> Result<(), String> {
        let values: Vec<Value> = self
            .columns
            .iter()
            .map(|column| row.value(column).unwrap_or(Value::Null))
            .collect();
        if values.iter().any(|value| value.is_null()) {
            self.incomplete.fetch_add(1, Ordering::Relaxed);
            let stream = self
                .incomplete_stream
                .lock()
                .expect("incomplete stream lock");
            if let Some(collector) = stream.as_ref() {
                collector.push(row.id(), values);
            }
        }
        Ok(())
    }

    fn result(&self) -> AnalyzerResult {
        AnalyzerResult::Number(self.incomplete.load(Ordering::Relaxed))
    }
}
