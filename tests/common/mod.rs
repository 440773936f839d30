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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use scrubjay::common::error::JobError;
use scrubjay::common::ids::RowId;
use scrubjay::engine::listener::AnalysisJobListener;
use scrubjay::engine::metrics::{RunMetrics, StreamMetrics};
use scrubjay::model::column::ColumnRef;
use scrubjay::model::component::{
    Analyzer, AnalyzerResult, Component, ComponentJob, OutputRowCollector, Transformer,
};
use scrubjay::model::job::{AnalysisJob, StreamKey};
use scrubjay::model::row::Row;
use scrubjay::model::value::Value;
use scrubjay::source::datastore::{Datastore, DatastoreConnection, RowSet};
use scrubjay::source::memory::{MemTable, MemoryDatastore};
use scrubjay::source::query::RowQuery;

/// Analyzer remembering the id of every consumed row.
#[derive(Default)]
pub struct RecordingAnalyzer {
    rows: Mutex<Vec<RowId>>,
}

impl RecordingAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.lock().expect("recording analyzer lock").clone()
    }
}

impl Component for RecordingAnalyzer {
    fn name(&self) -> &str {
        "Recording analyzer"
    }
}

impl Analyzer for RecordingAnalyzer {
    fn consume(&self, row: &Row, _distinct_count: usize) -> Result<(), String> {
        self.rows.lock().expect("recording analyzer lock").push(row.id());
        Ok(())
    }

    fn result(&self) -> AnalyzerResult {
        AnalyzerResult::Number(self.rows.lock().expect("recording analyzer lock").len() as i64)
    }
}

/// Analyzer counting its lifecycle hook invocations.
#[derive(Default)]
pub struct InitCloseProbe {
    inits: AtomicUsize,
    closes: AtomicUsize,
}

impl InitCloseProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Component for InitCloseProbe {
    fn name(&self) -> &str {
        "Init/close probe"
    }

    fn init(&self) -> Result<(), String> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), String> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Analyzer for InitCloseProbe {
    fn consume(&self, _row: &Row, _distinct_count: usize) -> Result<(), String> {
        Ok(())
    }

    fn result(&self) -> AnalyzerResult {
        AnalyzerResult::Number(0)
    }
}

/// Transformer failing for one trigger value, passing everything else
/// through into its single output column.
pub struct FailOnValueTransformer {
    column: ColumnRef,
    trigger: Value,
}

impl FailOnValueTransformer {
    pub fn new(column: ColumnRef, trigger: Value) -> Self {
        Self { column, trigger }
    }
}

impl Component for FailOnValueTransformer {
    fn name(&self) -> &str {
        "Fail on value"
    }
}

impl Transformer for FailOnValueTransformer {
    fn transform(
        &self,
        row: &Row,
        _collector: &mut OutputRowCollector,
    ) -> Result<Vec<Value>, String> {
        let value = row.value(&self.column).unwrap_or(Value::Null);
        if value == self.trigger {
            return Err(format!("synthetic failure on value {}", value));
        }
        Ok(vec![value])
    }
}

/// Datastore whose result set breaks with an iteration error after a fixed
/// number of records.
pub struct FailingDatastore {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    rows_before_failure: usize,
}

impl FailingDatastore {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<&str>,
        rows: Vec<Vec<Value>>,
        rows_before_failure: usize,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(|c| c.to_string()).collect(),
            rows,
            rows_before_failure,
        }
    }
}

impl Datastore for FailingDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_connection(&self) -> Result<Box<dyn DatastoreConnection>, String> {
        Ok(Box::new(FailingConnection {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            rows_before_failure: self.rows_before_failure,
        }))
    }
}

struct FailingConnection {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    rows_before_failure: usize,
}

impl DatastoreConnection for FailingConnection {
    fn execute(&mut self, query: &RowQuery) -> Result<RowSet, String> {
        let mut projection = Vec::with_capacity(query.columns().len());
        for column in query.columns() {
            let index = self
                .columns
                .iter()
                .position(|name| name == column.name())
                .ok_or_else(|| format!("unknown column {}", column.name()))?;
            projection.push(index);
        }
        let records: Vec<Result<Vec<Value>, String>> = self
            .rows
            .iter()
            .take(self.rows_before_failure)
            .map(|record| {
                Ok(projection
                    .iter()
                    .map(|&index| record.get(index).cloned().unwrap_or(Value::Null))
                    .collect())
            })
            .chain(std::iter::once(Err("connection lost".to_string())))
            .collect();
        Ok(RowSet::new(Box::new(records.into_iter())))
    }

    fn approximate_row_count(&mut self, _table: &str) -> Result<Option<u64>, String> {
        Ok(Some(self.rows.len() as u64))
    }
}

/// Listener recording event names (with their stream, where applicable) in
/// arrival order.
#[derive(Default)]
pub struct EventRecordingListener {
    events: Mutex<Vec<String>>,
}

impl EventRecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("event listener lock").clone()
    }

    pub fn count_of(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn position_of(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn push(&self, event: String) {
        self.events.lock().expect("event listener lock").push(event);
    }
}

impl AnalysisJobListener for EventRecordingListener {
    fn job_begin(&self, _job: &AnalysisJob, _metrics: &RunMetrics) {
        self.push("job_begin".to_string());
    }

    fn job_success(&self, _job: &AnalysisJob, _metrics: &RunMetrics) {
        self.push("job_success".to_string());
    }

    fn row_processing_begin(
        &self,
        _job: &AnalysisJob,
        stream: &StreamKey,
        _metrics: &StreamMetrics,
    ) {
        self.push(format!("row_processing_begin:{}", stream));
    }

    fn row_processing_success(
        &self,
        _job: &AnalysisJob,
        stream: &StreamKey,
        _metrics: &StreamMetrics,
    ) {
        self.push(format!("row_processing_success:{}", stream));
    }

    fn error_in_component(
        &self,
        _job: &AnalysisJob,
        component: &ComponentJob,
        _row: Option<&Row>,
        _err: &JobError,
    ) {
        self.push(format!("error_in_component:{}", component.id()));
    }

    fn error_unknown(&self, _job: &AnalysisJob, _err: &JobError) {
        self.push("error_unknown".to_string());
    }
}

/// In-memory people table with (name, city) rows.
pub fn people_datastore(rows: Vec<(Option<&str>, Option<&str>)>) -> MemoryDatastore {
    let mut table = MemTable::new(vec!["name", "city"]);
    for (name, city) in rows {
        table.add_row(vec![
            name.map(Value::from).unwrap_or(Value::Null),
            city.map(Value::from).unwrap_or(Value::Null),
        ]);
    }
    MemoryDatastore::new("people_db").with_table("people", table)
}
