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
//! The immutable analysis-job tree.
//!
//! Responsibilities:
//! - Holds the declarative description the engine executes: source columns,
//!   component specifications, nested output-stream sub-jobs.
//! - Owned by the caller and only read by the engine.
//!
//! Key exported interfaces:
//! - Types: `AnalysisJob`, `OutputStreamJob`, `StreamKey`, `JobScope`.

use std::fmt;
use std::sync::Arc;

use crate::common::ids::{ColumnId, ComponentId};
use crate::model::column::ColumnRef;
use crate::model::component::ComponentJob;
use crate::source::datastore::Datastore;

/// Identity of one stream: a physical source table, or one nested
/// output-data-stream declared by a producing component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StreamKey {
    Table(String),
    OutputStream {
        producer: ComponentId,
        name: String,
    },
}

impl StreamKey {
    pub fn table(name: impl Into<String>) -> Self {
        StreamKey::Table(name.into())
    }

    pub fn is_source_table(&self) -> bool {
        matches!(self, StreamKey::Table(_))
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKey::Table(name) => write!(f, "table:{}", name),
            StreamKey::OutputStream { producer, name } => {
                write!(f, "stream:{}@{}", name, producer)
            }
        }
    }
}

/// Nested sub-job executed against records a producing component publishes.
///
/// The stream's `columns` are physical-to-the-stream: their table name is the
/// stream name, and the nested components consume them like source fields.
#[derive(Clone, Debug)]
pub struct OutputStreamJob {
    name: String,
    columns: Vec<ColumnRef>,
    components: Vec<Arc<ComponentJob>>,
}

impl OutputStreamJob {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnRef>,
        components: Vec<Arc<ComponentJob>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            components,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn components(&self) -> &[Arc<ComponentJob>] {
        &self.components
    }
}

/// The complete, immutable description of one analysis run.
#[derive(Clone)]
pub struct AnalysisJob {
    label: String,
    datastore: Arc<dyn Datastore>,
    source_columns: Vec<ColumnRef>,
    components: Vec<Arc<ComponentJob>>,
}

impl AnalysisJob {
    pub fn new(
        label: impl Into<String>,
        datastore: Arc<dyn Datastore>,
        source_columns: Vec<ColumnRef>,
        components: Vec<Arc<ComponentJob>>,
    ) -> Self {
        Self {
            label: label.into(),
            datastore,
            source_columns,
            components,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.datastore
    }

    pub fn source_columns(&self) -> &[ColumnRef] {
        &self.source_columns
    }

    pub fn components(&self) -> &[Arc<ComponentJob>] {
        &self.components
    }

    /// All analyzers in the job tree, nested streams included, in job order.
    pub fn all_analyzers(&self) -> Vec<Arc<ComponentJob>> {
        let mut analyzers = Vec::new();
        let mut worklist: Vec<&[Arc<ComponentJob>]> = vec![&self.components];
        while let Some(components) = worklist.pop() {
            for component in components {
                if component.kind().is_analyzer() {
                    analyzers.push(Arc::clone(component));
                }
                for stream in component.output_streams() {
                    worklist.push(stream.components());
                }
            }
        }
        analyzers
    }
}

impl fmt::Debug for AnalysisJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisJob")
            .field("label", &self.label)
            .field("datastore", &self.datastore.name())
            .field("source_columns", &self.source_columns.len())
            .field("components", &self.components.len())
            .finish()
    }
}

/// Lookup view over one stream's component list (the top-level job or one
/// nested sub-job). Producer resolution never crosses stream boundaries;
/// that blind spot is what the sorter's multi-stream escape hatch covers.
#[derive(Clone)]
pub struct JobScope {
    components: Arc<Vec<Arc<ComponentJob>>>,
}

impl JobScope {
    pub fn new(components: Vec<Arc<ComponentJob>>) -> Self {
        Self {
            components: Arc::new(components),
        }
    }

    pub fn components(&self) -> &[Arc<ComponentJob>] {
        &self.components
    }

    pub fn component_by_id(&self, id: ComponentId) -> Option<&Arc<ComponentJob>> {
        self.components.iter().find(|c| c.id() == id)
    }

    /// The transformer producing a virtual column, if it lives in this scope.
    pub fn producer_of(&self, column: ColumnId) -> Option<&Arc<ComponentJob>> {
        self.components.iter().find(|c| c.produces(column))
    }
}
