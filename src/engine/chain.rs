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
//! Per-row consumption chain.
//!
//! Responsibilities:
//! - Runs one row through the sorted consumer sequence: filters append
//!   outcomes, transformers append virtual values (and may multiply the
//!   record), analyzers accumulate.
//! - Contains per-consumer errors: report, abandon the failing row from the
//!   failing consumer onward, keep the stream going.
//!
//! Key exported interfaces:
//! - Types: `ConsumeRowHandler`, `RowConsumptionResult`.

use std::sync::Arc;

use crate::common::error::JobError;
use crate::common::ids::RowIdGenerator;
use crate::engine::consumer::Consumer;
use crate::engine::listener::AnalysisJobListener;
use crate::model::component::ComponentKind;
use crate::model::component::OutputRowCollector;
use crate::model::job::AnalysisJob;
use crate::model::outcome::{FilterOutcome, OutcomeSieve};
use crate::model::row::Row;
use crate::model::value::Value;
use crate::scrubjay_logging::debug;

/// Rows and outcomes produced by one source row's traversal. Rows abandoned
/// by a component error are not included.
pub struct RowConsumptionResult {
    pub rows: Vec<Row>,
    pub outcomes: OutcomeSieve,
}

/// Executes the sorted consumer sequence for single rows.
///
/// One handler serves a whole stream; all per-row state lives on the stack
/// of `consume_row`, so concurrent rows never share mutable state. Each
/// multiplied branch continues the *remainder* of the sequence with its own
/// sieve clone and a freshly minted row id.
pub struct ConsumeRowHandler {
    consumers: Vec<Arc<Consumer>>,
    job: Arc<AnalysisJob>,
    listener: Arc<dyn AnalysisJobListener>,
    id_generator: Arc<RowIdGenerator>,
    preloaded_outcomes: Vec<FilterOutcome>,
}

impl ConsumeRowHandler {
    pub fn new(
        consumers: Vec<Arc<Consumer>>,
        job: Arc<AnalysisJob>,
        listener: Arc<dyn AnalysisJobListener>,
        id_generator: Arc<RowIdGenerator>,
        preloaded_outcomes: Vec<FilterOutcome>,
    ) -> Self {
        Self {
            consumers,
            job,
            listener,
            id_generator,
            preloaded_outcomes,
        }
    }

    pub fn consume_row(&self, row: Row) -> RowConsumptionResult {
        let sieve = OutcomeSieve::with_preloaded(self.preloaded_outcomes.clone());
        let mut rows = Vec::with_capacity(1);
        let outcomes = self
            .consume_from(0, row, sieve, &mut rows)
            .unwrap_or_default();
        RowConsumptionResult { rows, outcomes }
    }

    /// Run `row` through consumers `start..`. Returns the primary branch's
    /// sieve, or `None` when a component error abandoned the row.
    fn consume_from(
        &self,
        start: usize,
        mut row: Row,
        mut sieve: OutcomeSieve,
        out_rows: &mut Vec<Row>,
    ) -> Option<OutcomeSieve> {
        for index in start..self.consumers.len() {
            let consumer = &self.consumers[index];
            if !consumer.satisfied_for_consume(&sieve) {
                continue;
            }
            match consumer.kind() {
                ComponentKind::Filter(filter) => {
                    match filter.categorize(&row) {
                        Ok(category) => {
                            sieve.add(FilterOutcome {
                                component: consumer.id(),
                                category,
                            });
                        }
                        Err(message) => {
                            self.report_component_error(consumer, &row, message);
                            return None;
                        }
                    }
                }
                ComponentKind::Transformer(transformer) => {
                    let mut collector = OutputRowCollector::new();
                    match transformer.transform(&row, &mut collector) {
                        Ok(values) => {
                            // Additional tuples continue the remainder of the
                            // sequence independently, each under a fresh id
                            // and its own sieve clone.
                            for tuple in collector.take_tuples() {
                                let mut branch = row.derive(self.id_generator.next_id());
                                if let Err(message) =
                                    self.bind_outputs(consumer, &mut branch, tuple)
                                {
                                    self.report_component_error(consumer, &branch, message);
                                    continue;
                                }
                                let _ = self.consume_from(
                                    index + 1,
                                    branch,
                                    sieve.clone(),
                                    out_rows,
                                );
                            }
                            if let Err(message) = self.bind_outputs(consumer, &mut row, values) {
                                self.report_component_error(consumer, &row, message);
                                return None;
                            }
                        }
                        Err(message) => {
                            self.report_component_error(consumer, &row, message);
                            return None;
                        }
                    }
                }
                ComponentKind::Analyzer(analyzer) => {
                    if let Err(message) = analyzer.consume(&row, 1) {
                        self.report_component_error(consumer, &row, message);
                        return None;
                    }
                }
            }
        }
        out_rows.push(row);
        Some(sieve)
    }

    fn bind_outputs(
        &self,
        consumer: &Consumer,
        row: &mut Row,
        values: Vec<Value>,
    ) -> Result<(), String> {
        let outputs = consumer.component_job().outputs();
        if values.len() != outputs.len() {
            return Err(format!(
                "transformer produced {} value(s) for {} output column(s)",
                values.len(),
                outputs.len()
            ));
        }
        for (column, value) in outputs.iter().zip(values) {
            row.put(column.id(), value);
        }
        Ok(())
    }

    fn report_component_error(&self, consumer: &Consumer, row: &Row, message: String) {
        debug!(
            "Component error: component={} row={} message={}",
            consumer.component_job(),
            row.id(),
            message
        );
        let error = JobError::component(consumer.id(), row.id(), message);
        self.listener.error_in_component(
            &self.job,
            consumer.component_job(),
            Some(row),
            &error,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorState;
    use crate::common::ids::{ColumnId, ComponentId, RowId};
    use crate::components::{NullCheckFilter, RowCountAnalyzer, TokenizerTransformer};
    use crate::engine::listener::ErrorAwareAnalysisListener;
    use crate::model::column::Column;
    use crate::model::component::{ComponentJob, ComponentKind};
    use crate::model::job::JobScope;
    use crate::model::requirement::Requirement;
    use crate::source::memory::MemoryDatastore;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn empty_job() -> Arc<AnalysisJob> {
        Arc::new(AnalysisJob::new(
            "chain test",
            MemoryDatastore::new("none").into_shared(),
            Vec::new(),
            Vec::new(),
        ))
    }

    fn handler_for(
        jobs: Vec<Arc<ComponentJob>>,
        listener: Arc<dyn AnalysisJobListener>,
    ) -> ConsumeRowHandler {
        let scope = JobScope::new(jobs.clone());
        let consumers = jobs
            .into_iter()
            .map(|job| Arc::new(Consumer::new(job, &scope)))
            .collect();
        ConsumeRowHandler::new(
            consumers,
            empty_job(),
            listener,
            Arc::new(RowIdGenerator::starting_at(100)),
            Vec::new(),
        )
    }

    struct NullListener;

    impl AnalysisJobListener for NullListener {}

    #[test]
    fn filter_outcome_gates_downstream_consumer() {
        let column = Column::physical(ColumnId::new(1), "people", "name");
        let filter = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "null check",
                ComponentKind::Filter(Arc::new(NullCheckFilter::new(Arc::clone(&column)))),
            )
            .with_inputs(vec![Arc::clone(&column)]),
        );
        let analyzer_component = Arc::new(RowCountAnalyzer::new());
        let analyzer = Arc::new(
            ComponentJob::new(
                ComponentId::new(2),
                "count valid",
                ComponentKind::Analyzer(Arc::clone(&analyzer_component) as _),
            )
            .with_requirement(Requirement::Outcome(FilterOutcome::new(
                ComponentId::new(1),
                NullCheckFilter::VALID,
            ))),
        );

        let handler = handler_for(vec![filter, analyzer], Arc::new(NullListener));

        let mut valid_row = Row::new(RowId::new(1));
        valid_row.put(ColumnId::new(1), Value::from("ada"));
        let result = handler.consume_row(valid_row);
        assert_eq!(result.rows.len(), 1);
        assert!(result.outcomes.contains(&FilterOutcome::new(
            ComponentId::new(1),
            NullCheckFilter::VALID
        )));

        let mut invalid_row = Row::new(RowId::new(2));
        invalid_row.put(ColumnId::new(1), Value::Null);
        handler.consume_row(invalid_row);

        // Only the valid row reached the analyzer.
        use crate::model::component::Analyzer;
        assert_eq!(
            analyzer_component.result(),
            crate::model::component::AnalyzerResult::Number(1)
        );
    }

    #[test]
    fn record_multiplication_fans_out_remainder_of_chain() {
        let tags = Column::physical(ColumnId::new(1), "people", "tags");
        let token = Column::virtual_column(ColumnId::new(2), "token");
        let tokenizer = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "tokenizer",
                ComponentKind::Transformer(Arc::new(TokenizerTransformer::new(
                    Arc::clone(&tags),
                    ' ',
                ))),
            )
            .with_inputs(vec![Arc::clone(&tags)])
            .with_outputs(vec![Arc::clone(&token)]),
        );
        let analyzer_component = Arc::new(RowCountAnalyzer::new());
        let analyzer = Arc::new(
            ComponentJob::new(
                ComponentId::new(2),
                "count tokens",
                ComponentKind::Analyzer(Arc::clone(&analyzer_component) as _),
            )
            .with_inputs(vec![Arc::clone(&token)]),
        );

        let handler = handler_for(vec![tokenizer, analyzer], Arc::new(NullListener));
        let mut row = Row::new(RowId::new(1));
        row.put(ColumnId::new(1), Value::from("a b c"));
        let result = handler.consume_row(row);

        assert_eq!(result.rows.len(), 3);
        use crate::model::component::Analyzer;
        assert_eq!(
            analyzer_component.result(),
            crate::model::component::AnalyzerResult::Number(3)
        );
        // Every produced row carries a distinct id.
        let ids: HashSet<RowId> = result.rows.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), 3);
        // One of them is the original source row.
        assert!(ids.contains(&RowId::new(1)));
    }

    #[test]
    fn multiplied_branches_have_isolated_outcome_sieves() {
        // tokenizer → null-check on the token column → counting analyzer of
        // VALID tokens. The branch consuming the null token must not see the
        // VALID outcome of a sibling branch.
        let tags = Column::physical(ColumnId::new(1), "people", "tags");
        let token = Column::virtual_column(ColumnId::new(2), "token");
        let tokenizer = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "tokenizer",
                ComponentKind::Transformer(Arc::new(TokenizerTransformer::new(
                    Arc::clone(&tags),
                    ' ',
                ))),
            )
            .with_inputs(vec![Arc::clone(&tags)])
            .with_outputs(vec![Arc::clone(&token)]),
        );
        let token_filter = Arc::new(
            ComponentJob::new(
                ComponentId::new(2),
                "token null check",
                ComponentKind::Filter(Arc::new(NullCheckFilter::new(Arc::clone(&token)))),
            )
            .with_inputs(vec![Arc::clone(&token)]),
        );
        let analyzer_component = Arc::new(RowCountAnalyzer::new());
        let analyzer = Arc::new(
            ComponentJob::new(
                ComponentId::new(3),
                "count valid tokens",
                ComponentKind::Analyzer(Arc::clone(&analyzer_component) as _),
            )
            .with_requirement(Requirement::Outcome(FilterOutcome::new(
                ComponentId::new(2),
                NullCheckFilter::VALID,
            ))),
        );

        let handler = handler_for(vec![tokenizer, token_filter, analyzer], Arc::new(NullListener));
        let mut row = Row::new(RowId::new(1));
        row.put(ColumnId::new(1), Value::from("x y"));
        let result = handler.consume_row(row);
        assert_eq!(result.rows.len(), 2);
        use crate::model::component::Analyzer;
        assert_eq!(
            analyzer_component.result(),
            crate::model::component::AnalyzerResult::Number(2)
        );
    }

    #[test]
    fn component_error_abandons_row_but_is_reported_once() {
        struct FailingTransformer;

        impl crate::model::component::Component for FailingTransformer {
            fn name(&self) -> &str {
                "failing"
            }
        }

        impl crate::model::component::Transformer for FailingTransformer {
            fn transform(
                &self,
                _row: &Row,
                _collector: &mut OutputRowCollector,
            ) -> Result<Vec<Value>, String> {
                Err("synthetic failure".to_string())
            }
        }

        struct RecordingListener {
            errors: Mutex<Vec<JobError>>,
        }

        impl AnalysisJobListener for RecordingListener {
            fn error_in_component(
                &self,
                _job: &AnalysisJob,
                _component: &ComponentJob,
                _row: Option<&Row>,
                err: &JobError,
            ) {
                self.errors.lock().expect("errors lock").push(err.clone());
            }
        }

        let failing = Arc::new(ComponentJob::new(
            ComponentId::new(1),
            "failing",
            ComponentKind::Transformer(Arc::new(FailingTransformer)),
        ));
        let analyzer_component = Arc::new(RowCountAnalyzer::new());
        let analyzer = Arc::new(ComponentJob::new(
            ComponentId::new(2),
            "count",
            ComponentKind::Analyzer(Arc::clone(&analyzer_component) as _),
        ));

        let listener = Arc::new(RecordingListener {
            errors: Mutex::new(Vec::new()),
        });
        let handler = handler_for(vec![failing, analyzer], Arc::clone(&listener) as _);

        let result = handler.consume_row(Row::new(RowId::new(7)));
        assert!(result.rows.is_empty());
        let errors = listener.errors.lock().expect("errors lock");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, Some(RowId::new(7)));
        // The abandoned row never reached the downstream analyzer.
        use crate::model::component::Analyzer;
        assert_eq!(
            analyzer_component.result(),
            crate::model::component::AnalyzerResult::Number(0)
        );
    }

    #[test]
    fn preloaded_outcomes_satisfy_requirements_without_the_filter() {
        let analyzer_component = Arc::new(RowCountAnalyzer::new());
        let analyzer = Arc::new(
            ComponentJob::new(
                ComponentId::new(2),
                "count",
                ComponentKind::Analyzer(Arc::clone(&analyzer_component) as _),
            )
            .with_requirement(Requirement::Outcome(FilterOutcome::new(
                ComponentId::new(1),
                "VALID",
            ))),
        );
        let scope = JobScope::new(vec![Arc::clone(&analyzer)]);
        let handler = ConsumeRowHandler::new(
            vec![Arc::new(Consumer::new(analyzer, &scope))],
            empty_job(),
            Arc::new(NullListener),
            Arc::new(RowIdGenerator::new()),
            vec![FilterOutcome::new(ComponentId::new(1), "VALID")],
        );
        handler.consume_row(Row::new(RowId::new(1)));
        use crate::model::component::Analyzer;
        assert_eq!(
            analyzer_component.result(),
            crate::model::component::AnalyzerResult::Number(1)
        );
    }

    // Keep the error-aware listener wired through a chain too, so the
    // recording path used by the engine is covered close to the source.
    #[test]
    fn error_aware_listener_records_chain_errors() {
        struct FailingAnalyzer;

        impl crate::model::component::Component for FailingAnalyzer {
            fn name(&self) -> &str {
                "failing analyzer"
            }
        }

        impl crate::model::component::Analyzer for FailingAnalyzer {
            fn consume(&self, _row: &Row, _distinct_count: usize) -> Result<(), String> {
                Err("cannot consume".to_string())
            }

            fn result(&self) -> crate::model::component::AnalyzerResult {
                crate::model::component::AnalyzerResult::Number(0)
            }
        }

        let failing = Arc::new(ComponentJob::new(
            ComponentId::new(1),
            "failing analyzer",
            ComponentKind::Analyzer(Arc::new(FailingAnalyzer)),
        ));
        let state = ErrorState::new();
        let listener = Arc::new(ErrorAwareAnalysisListener::new(Arc::clone(&state)));
        let handler = handler_for(vec![failing], listener);
        handler.consume_row(Row::new(RowId::new(1)));
        assert!(state.is_errored());
        assert_eq!(state.errors().len(), 1);
    }
}
