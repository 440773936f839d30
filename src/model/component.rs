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
//! Component contracts and the component-job specification.
//!
//! Responsibilities:
//! - Defines the three behavioral roles (filter/transformer/analyzer) as a
//!   closed tagged-variant type plus the shared lifecycle contract.
//! - Defines `ComponentJob`, the immutable per-component unit of a job DAG.
//!
//! Key exported interfaces:
//! - Types: `Component`, `Filter`, `Transformer`, `Analyzer`, `ComponentKind`,
//!   `ComponentJob`, `AnalyzerResult`, `OutputRowCollector`,
//!   `OutputStreamCollector`.

use std::fmt;
use std::sync::Arc;

use crate::common::ids::{ColumnId, ComponentId, RowId};
use crate::model::column::ColumnRef;
use crate::model::job::OutputStreamJob;
use crate::model::outcome::Category;
use crate::model::requirement::Requirement;
use crate::model::row::Row;
use crate::model::value::Value;
use crate::source::query::RowQuery;

/// Shared lifecycle contract of every live component instance.
///
/// `init` and `close` bracket one run; `close` fires even when row
/// processing failed. Components declaring `is_concurrency_safe() == false`
/// rely on the caller-side convention of running the job on a
/// single-threaded task runner; the engine does not add locking for them.
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    fn init(&self) -> Result<(), String> {
        Ok(())
    }

    fn close(&self) -> Result<(), String> {
        Ok(())
    }

    fn is_concurrency_safe(&self) -> bool {
        true
    }

    /// Called once per declared output stream before row processing starts.
    /// Components that publish derived records hold on to the collector and
    /// push into it during their per-row calls.
    fn attach_output_stream(&self, stream_name: &str, collector: OutputStreamCollector) {
        let _ = (stream_name, collector);
    }
}

/// Row classifier: maps each row to one of a fixed set of categories.
pub trait Filter: Component {
    fn categories(&self) -> Vec<Category>;

    fn categorize(&self, row: &Row) -> Result<Category, String>;

    /// Query pushdown capability. A filter that can express `category` as
    /// native query semantics returns the rewritten query; `None` keeps the
    /// filter in the consumer chain. Best-effort only.
    fn optimize_query(&self, query: &RowQuery, category: &Category) -> Option<RowQuery> {
        let _ = (query, category);
        None
    }
}

/// Value producer: computes this component's output-column values per row.
/// Additional tuples pushed through the collector multiply the record.
pub trait Transformer: Component {
    fn transform(&self, row: &Row, collector: &mut OutputRowCollector) -> Result<Vec<Value>, String>;
}

/// State accumulator: consumes rows and exposes a result after the run.
pub trait Analyzer: Component {
    fn consume(&self, row: &Row, distinct_count: usize) -> Result<(), String>;

    fn result(&self) -> AnalyzerResult;
}

/// Collects additional output tuples during one `transform` call
/// (record multiplication). The returned value of `transform` is the first
/// tuple; each collected tuple spawns an independent downstream continuation.
#[derive(Default)]
pub struct OutputRowCollector {
    tuples: Vec<Vec<Value>>,
}

impl OutputRowCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, values: Vec<Value>) {
        self.tuples.push(values);
    }

    pub fn take_tuples(&mut self) -> Vec<Vec<Value>> {
        std::mem::take(&mut self.tuples)
    }
}

/// Receiving end of one nested output stream, owned by the engine.
pub trait OutputStreamSink: Send + Sync {
    /// Push one derived record. `source_row` is the id of the row the record
    /// was derived from; the nested stream reuses it for the first record of
    /// each source row and mints fresh ids for the rest.
    fn push(&self, source_row: RowId, values: Vec<Value>);
}

/// Cloneable handle a producing component pushes derived records through.
#[derive(Clone)]
pub struct OutputStreamCollector {
    sink: Arc<dyn OutputStreamSink>,
}

impl OutputStreamCollector {
    pub fn new(sink: Arc<dyn OutputStreamSink>) -> Self {
        Self { sink }
    }

    pub fn push(&self, source_row: RowId, values: Vec<Value>) {
        self.sink.push(source_row, values);
    }
}

/// Result exposed by an analyzer after (or during) a run.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalyzerResult {
    Number(i64),
    Text(String),
    /// Value → occurrence count, in first-seen order.
    Distribution(Vec<(String, u64)>),
}

impl fmt::Display for AnalyzerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerResult::Number(v) => write!(f, "{}", v),
            AnalyzerResult::Text(v) => write!(f, "{}", v),
            AnalyzerResult::Distribution(entries) => {
                write!(f, "{} distinct value(s)", entries.len())
            }
        }
    }
}

/// The three behavioral roles, as a closed sum type with shared metadata in
/// [`ComponentJob`]. Dispatch is by pattern matching; there is no open
/// plugin hierarchy inside the engine.
#[derive(Clone)]
pub enum ComponentKind {
    Filter(Arc<dyn Filter>),
    Transformer(Arc<dyn Transformer>),
    Analyzer(Arc<dyn Analyzer>),
}

impl ComponentKind {
    pub fn role_name(&self) -> &'static str {
        match self {
            ComponentKind::Filter(_) => "filter",
            ComponentKind::Transformer(_) => "transformer",
            ComponentKind::Analyzer(_) => "analyzer",
        }
    }

    pub fn as_component(&self) -> &dyn Component {
        match self {
            ComponentKind::Filter(filter) => filter.as_ref(),
            ComponentKind::Transformer(transformer) => transformer.as_ref(),
            ComponentKind::Analyzer(analyzer) => analyzer.as_ref(),
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, ComponentKind::Filter(_))
    }

    pub fn is_analyzer(&self) -> bool {
        matches!(self, ComponentKind::Analyzer(_))
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.role_name(), self.as_component().name())
    }
}

/// Immutable specification of one unit of work within a job.
#[derive(Clone, Debug)]
pub struct ComponentJob {
    id: ComponentId,
    label: String,
    kind: ComponentKind,
    inputs: Vec<ColumnRef>,
    outputs: Vec<ColumnRef>,
    requirement: Option<Requirement>,
    output_streams: Vec<OutputStreamJob>,
}

impl ComponentJob {
    pub fn new(id: ComponentId, label: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            requirement: None,
            output_streams: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<ColumnRef>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<ColumnRef>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = Some(requirement);
        self
    }

    pub fn with_output_streams(mut self, output_streams: Vec<OutputStreamJob>) -> Self {
        self.output_streams = output_streams;
        self
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn component(&self) -> &dyn Component {
        self.kind.as_component()
    }

    pub fn inputs(&self) -> &[ColumnRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ColumnRef] {
        &self.outputs
    }

    pub fn requirement(&self) -> Option<&Requirement> {
        self.requirement.as_ref()
    }

    pub fn output_streams(&self) -> &[OutputStreamJob] {
        &self.output_streams
    }

    pub fn produces(&self, column: ColumnId) -> bool {
        self.outputs.iter().any(|c| c.id() == column)
    }
}

impl fmt::Display for ComponentJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' (id={})", self.kind.role_name(), self.label, self.id)
    }
}
