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
//! Publisher registry: partitions a job into per-stream publishers.
//!
//! Responsibilities:
//! - Walks the whole job tree once, assigns every component to the stream
//!   its inputs originate from, and groups components into one publisher per
//!   distinct stream, preserving insertion order.
//! - Registers nested output-stream sub-jobs against child publishers linked
//!   to their parents, via an explicit worklist instead of call-stack
//!   recursion.
//!
//! Key exported interfaces:
//! - Types: `PublisherRegistry`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::engine::consumer::Consumer;
use crate::engine::lineage::origin_table;
use crate::engine::publisher::{ActiveOutputStream, RowProcessingPublisher};
use crate::model::component::{ComponentJob, OutputStreamCollector, OutputStreamSink};
use crate::model::job::{AnalysisJob, JobScope, StreamKey};
use crate::scrubjay_logging::debug;

/// All publishers of one run, keyed by stream, in insertion order.
///
/// Insertion order matters: nested streams are registered strictly after
/// their parent stream's consumers, and finalization walks the same order.
pub struct PublisherRegistry {
    publishers: Vec<Arc<RowProcessingPublisher>>,
    index: HashMap<StreamKey, usize>,
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("publishers", &self.publishers.len())
            .field("index", &self.index)
            .finish()
    }
}

struct WorkItem {
    components: Vec<Arc<ComponentJob>>,
    scope: JobScope,
    target: RegistrationTarget,
}

enum RegistrationTarget {
    /// Top-level components attach to source-table publishers resolved from
    /// their column lineage.
    SourceTables { default_table: String },
    /// Nested components attach to their stream's child publisher.
    NestedStream {
        publisher: Arc<RowProcessingPublisher>,
        stream_name: String,
    },
}

impl PublisherRegistry {
    /// Walk the job and group every component into its stream's publisher.
    ///
    /// Fails when a component's inputs span multiple physical tables, or a
    /// nested component reaches outside its own stream; both are fatal
    /// configuration errors raised before any row is processed.
    pub fn build(job: &Arc<AnalysisJob>) -> Result<Self, String> {
        let mut registry = Self {
            publishers: Vec::new(),
            index: HashMap::new(),
        };

        // Components without any physical dependency still need a stream to
        // ride on; the job's first source table is the conventional host.
        let default_table = job
            .source_columns()
            .iter()
            .find_map(|column| column.physical_table())
            .map(str::to_string)
            .unwrap_or_else(|| job.datastore().name().to_string());

        let mut worklist = VecDeque::new();
        worklist.push_back(WorkItem {
            components: job.components().to_vec(),
            scope: JobScope::new(job.components().to_vec()),
            target: RegistrationTarget::SourceTables { default_table },
        });

        while let Some(item) = worklist.pop_front() {
            for component in &item.components {
                let publisher = match &item.target {
                    RegistrationTarget::SourceTables { default_table } => {
                        let table = origin_table(&item.scope, component)?
                            .unwrap_or_else(|| default_table.clone());
                        registry.source_publisher(job, table)
                    }
                    RegistrationTarget::NestedStream {
                        publisher,
                        stream_name,
                    } => {
                        if let Some(table) = origin_table(&item.scope, component)?
                            && table != *stream_name
                        {
                            return Err(format!(
                                "invalid job: {} belongs to stream '{}' but consumes columns of '{}'",
                                component, stream_name, table
                            ));
                        }
                        Arc::clone(publisher)
                    }
                };

                debug!("Registering {} with publisher {}", component, publisher.key());
                publisher.register_consumer(Arc::new(Consumer::new(
                    Arc::clone(component),
                    &item.scope,
                )));

                for stream in component.output_streams() {
                    let child = registry.create_nested_publisher(component, stream)?;
                    publisher.add_child(Arc::clone(&child));
                    worklist.push_back(WorkItem {
                        components: stream.components().to_vec(),
                        scope: JobScope::new(stream.components().to_vec()),
                        target: RegistrationTarget::NestedStream {
                            publisher: child,
                            stream_name: stream.name().to_string(),
                        },
                    });
                }
            }
        }

        // All consumers known: let every publisher start planning, parents
        // first (registration order).
        for publisher in &registry.publishers {
            publisher.on_all_consumers_registered();
        }

        Ok(registry)
    }

    fn source_publisher(
        &mut self,
        job: &Arc<AnalysisJob>,
        table: String,
    ) -> Arc<RowProcessingPublisher> {
        let key = StreamKey::table(table.clone());
        if let Some(&position) = self.index.get(&key) {
            return Arc::clone(&self.publishers[position]);
        }
        let publisher =
            RowProcessingPublisher::new_source(key.clone(), Arc::clone(job.datastore()), table);
        self.index.insert(key, self.publishers.len());
        self.publishers.push(Arc::clone(&publisher));
        publisher
    }

    fn create_nested_publisher(
        &mut self,
        producer: &Arc<ComponentJob>,
        stream: &crate::model::job::OutputStreamJob,
    ) -> Result<Arc<RowProcessingPublisher>, String> {
        let key = StreamKey::OutputStream {
            producer: producer.id(),
            name: stream.name().to_string(),
        };
        if self.index.contains_key(&key) {
            return Err(format!(
                "invalid job: duplicate output stream '{}' on {}",
                stream.name(),
                producer
            ));
        }
        let active = ActiveOutputStream::new(key.clone());
        producer.component().attach_output_stream(
            stream.name(),
            OutputStreamCollector::new(Arc::clone(&active) as Arc<dyn OutputStreamSink>),
        );
        let publisher = RowProcessingPublisher::new_nested(
            key.clone(),
            stream.name(),
            stream.columns().to_vec(),
            active,
        );
        self.index.insert(key, self.publishers.len());
        self.publishers.push(Arc::clone(&publisher));
        Ok(publisher)
    }

    pub fn publisher(&self, key: &StreamKey) -> Option<&Arc<RowProcessingPublisher>> {
        self.index.get(key).map(|&position| &self.publishers[position])
    }

    /// All publishers in insertion order (parents before their children).
    pub fn publishers(&self) -> &[Arc<RowProcessingPublisher>] {
        &self.publishers
    }

    /// Top-level publishers, the ones the run delegate kicks off directly.
    pub fn source_publishers(&self) -> Vec<Arc<RowProcessingPublisher>> {
        self.publishers
            .iter()
            .filter(|p| p.is_source_stream())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}
