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
//! End-to-end engine scenarios: conditional routing, record multiplication,
//! partial failure, nested output streams and query pushdown.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use scrubjay::common::error::JobErrorKind;
use scrubjay::common::ids::{ColumnId, ComponentId, RowId};
use scrubjay::components::{CompletenessAnalyzer, MaxRowsFilter, NullCheckFilter, UpperCaseTransformer};
use scrubjay::components::TokenizerTransformer;
use scrubjay::engine::publisher::PublisherState;
use scrubjay::engine::registry::PublisherRegistry;
use scrubjay::engine::result::JobStatus;
use scrubjay::engine::runner::AnalysisRunner;
use scrubjay::model::column::Column;
use scrubjay::model::component::{AnalyzerResult, ComponentJob, ComponentKind};
use scrubjay::model::job::{AnalysisJob, OutputStreamJob, StreamKey};
use scrubjay::model::outcome::FilterOutcome;
use scrubjay::model::requirement::Requirement;
use scrubjay::model::value::Value;
use scrubjay::runtime::task_runner::{MultiThreadedTaskRunner, SingleThreadedTaskRunner};

use common::{
    EventRecordingListener, FailOnValueTransformer, FailingDatastore, InitCloseProbe,
    RecordingAnalyzer, people_datastore,
};

#[test]
fn filter_routes_only_valid_rows_to_downstream_consumers() {
    // 3 rows; one has a null name. The transformer runs for VALID rows only
    // and the analyzer inherits that gate through its input column.
    let datastore = people_datastore(vec![
        (Some("ada"), Some("london")),
        (None, Some("paris")),
        (Some("grace"), Some("york")),
    ]);

    let name = Column::physical(ColumnId::new(1), "people", "name");
    let name_upper = Column::virtual_column(ColumnId::new(2), "name_upper");

    let filter = Arc::new(
        ComponentJob::new(
            ComponentId::new(1),
            "name null check",
            ComponentKind::Filter(Arc::new(NullCheckFilter::new(Arc::clone(&name)))),
        )
        .with_inputs(vec![Arc::clone(&name)]),
    );
    let transformer = Arc::new(
        ComponentJob::new(
            ComponentId::new(2),
            "upper case name",
            ComponentKind::Transformer(Arc::new(UpperCaseTransformer::new(Arc::clone(&name)))),
        )
        .with_inputs(vec![Arc::clone(&name)])
        .with_outputs(vec![Arc::clone(&name_upper)])
        .with_requirement(Requirement::Outcome(FilterOutcome::new(
            ComponentId::new(1),
            NullCheckFilter::VALID,
        ))),
    );
    let analyzer_instance = Arc::new(RecordingAnalyzer::new());
    let analyzer = Arc::new(
        ComponentJob::new(
            ComponentId::new(3),
            "collect upper names",
            ComponentKind::Analyzer(Arc::clone(&analyzer_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&name_upper)]),
    );

    let job = AnalysisJob::new(
        "routing",
        datastore.into_shared(),
        vec![name],
        vec![filter, transformer, analyzer],
    );

    let runner = AnalysisRunner::with_task_runner(Arc::new(SingleThreadedTaskRunner::new()));
    let future = runner.run(job).expect("valid job");
    future.await_done();

    assert!(future.is_successful());
    assert_eq!(analyzer_instance.row_ids().len(), 2);

    let results = future.results().expect("successful job");
    assert_eq!(results, vec![AnalyzerResult::Number(2)]);
    assert_eq!(
        future.result_for(ComponentId::new(3)).expect("analyzer result"),
        AnalyzerResult::Number(2)
    );
}

#[test]
fn record_multiplying_transformer_fans_out_with_distinct_row_ids() {
    // Every row's tag list splits into 2 tokens: 3 rows in, 6 analyzer
    // consumptions out, all under distinct row ids.
    let datastore = {
        use scrubjay::source::memory::{MemTable, MemoryDatastore};
        let mut table = MemTable::new(vec!["tags"]);
        table.add_row(vec![Value::from("red blue")]);
        table.add_row(vec![Value::from("soft hard")]);
        table.add_row(vec![Value::from("hot cold")]);
        MemoryDatastore::new("tags_db").with_table("things", table)
    };

    let tags = Column::physical(ColumnId::new(1), "things", "tags");
    let token = Column::virtual_column(ColumnId::new(2), "token");

    let tokenizer = Arc::new(
        ComponentJob::new(
            ComponentId::new(1),
            "tokenize tags",
            ComponentKind::Transformer(Arc::new(TokenizerTransformer::new(
                Arc::clone(&tags),
                ' ',
            ))),
        )
        .with_inputs(vec![Arc::clone(&tags)])
        .with_outputs(vec![Arc::clone(&token)]),
    );
    let analyzer_instance = Arc::new(RecordingAnalyzer::new());
    let analyzer = Arc::new(
        ComponentJob::new(
            ComponentId::new(2),
            "collect tokens",
            ComponentKind::Analyzer(Arc::clone(&analyzer_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&token)]),
    );

    let job = AnalysisJob::new(
        "multiplication",
        datastore.into_shared(),
        vec![tags],
        vec![tokenizer, analyzer],
    );

    let runner = AnalysisRunner::with_task_runner(Arc::new(SingleThreadedTaskRunner::new()));
    let future = runner.run(job).expect("valid job");
    future.await_done();

    assert!(future.is_successful());
    let ids = analyzer_instance.row_ids();
    assert_eq!(ids.len(), 6);
    let distinct: HashSet<RowId> = ids.into_iter().collect();
    assert_eq!(distinct.len(), 6);
}

#[test]
fn component_error_is_contained_to_the_failing_row() {
    // The transformer throws on row #2 of 3: one error_in_component, rows
    // #1 and #3 still reach the analyzer, the job is errornous in aggregate.
    let datastore = people_datastore(vec![
        (Some("ada"), None),
        (Some("brian"), None),
        (Some("grace"), None),
    ]);

    let name = Column::physical(ColumnId::new(1), "people", "name");
    let passed = Column::virtual_column(ColumnId::new(2), "passed_name");

    let failing = Arc::new(
        ComponentJob::new(
            ComponentId::new(1),
            "fail on brian",
            ComponentKind::Transformer(Arc::new(FailOnValueTransformer::new(
                Arc::clone(&name),
                Value::from("brian"),
            ))),
        )
        .with_inputs(vec![Arc::clone(&name)])
        .with_outputs(vec![Arc::clone(&passed)]),
    );
    let analyzer_instance = Arc::new(RecordingAnalyzer::new());
    let analyzer = Arc::new(
        ComponentJob::new(
            ComponentId::new(2),
            "collect survivors",
            ComponentKind::Analyzer(Arc::clone(&analyzer_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&passed)]),
    );

    let listener = Arc::new(EventRecordingListener::new());
    let mut runner = AnalysisRunner::with_task_runner(Arc::new(SingleThreadedTaskRunner::new()));
    runner.add_listener(Arc::clone(&listener) as _);
    let job = AnalysisJob::new(
        "partial failure",
        datastore.into_shared(),
        vec![name],
        vec![failing, analyzer],
    );
    let future = runner.run(job).expect("valid job");
    future.await_done();

    assert_eq!(future.status(), JobStatus::Errornous);
    assert_eq!(analyzer_instance.row_ids().len(), 2);
    assert_eq!(listener.count_of("error_in_component:1"), 1);

    let errors = future.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, JobErrorKind::Component);
    assert_eq!(errors[0].component, Some(ComponentId::new(1)));

    let failure = future.results().expect_err("errornous job");
    assert_eq!(failure.errors().len(), 1);
}

#[test]
fn job_completion_waits_for_nested_output_streams() {
    // One source stream plus one nested stream; the nested publisher starts
    // only after the parent's iteration, so job success must come last and
    // fire exactly once.
    let datastore = people_datastore(vec![
        (Some("ada"), Some("london")),
        (Some("brian"), None),
        (Some("grace"), None),
    ]);

    let name = Column::physical(ColumnId::new(1), "people", "name");
    let city = Column::physical(ColumnId::new(2), "people", "city");
    let stream_name = Column::physical(
        ColumnId::new(10),
        CompletenessAnalyzer::STREAM_INCOMPLETE,
        "name",
    );
    let stream_city = Column::physical(
        ColumnId::new(11),
        CompletenessAnalyzer::STREAM_INCOMPLETE,
        "city",
    );

    let nested_instance = Arc::new(RecordingAnalyzer::new());
    let nested_analyzer = Arc::new(
        ComponentJob::new(
            ComponentId::new(2),
            "collect incomplete",
            ComponentKind::Analyzer(Arc::clone(&nested_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&stream_name)]),
    );
    let stream = OutputStreamJob::new(
        CompletenessAnalyzer::STREAM_INCOMPLETE,
        vec![Arc::clone(&stream_name), Arc::clone(&stream_city)],
        vec![nested_analyzer],
    );
    let completeness = Arc::new(
        ComponentJob::new(
            ComponentId::new(1),
            "completeness",
            ComponentKind::Analyzer(Arc::new(CompletenessAnalyzer::new(vec![
                Arc::clone(&name),
                Arc::clone(&city),
            ]))),
        )
        .with_inputs(vec![Arc::clone(&name), Arc::clone(&city)])
        .with_output_streams(vec![stream]),
    );

    let listener = Arc::new(EventRecordingListener::new());
    let mut runner = AnalysisRunner::with_task_runner(Arc::new(MultiThreadedTaskRunner::new(2)));
    runner.add_listener(Arc::clone(&listener) as _);
    let job = AnalysisJob::new(
        "nested",
        datastore.into_shared(),
        vec![name, city],
        vec![completeness],
    );
    let future = runner.run(job).expect("valid job");
    future.await_done();

    assert!(future.is_successful());
    // 2 incomplete rows flowed into the nested stream.
    assert_eq!(nested_instance.row_ids().len(), 2);

    let results = future.result_map().expect("successful job");
    assert_eq!(results.get(&ComponentId::new(1)), Some(&AnalyzerResult::Number(2)));
    assert_eq!(results.get(&ComponentId::new(2)), Some(&AnalyzerResult::Number(2)));

    // Exactly one job-level success, strictly after the nested stream's own
    // success.
    assert_eq!(listener.count_of("job_success"), 1);
    let nested_key = StreamKey::OutputStream {
        producer: ComponentId::new(1),
        name: CompletenessAnalyzer::STREAM_INCOMPLETE.to_string(),
    };
    let nested_success = listener
        .position_of(&format!("row_processing_success:{}", nested_key))
        .expect("nested stream succeeded");
    let job_success = listener.position_of("job_success").expect("job succeeded");
    assert!(job_success > nested_success);
}

#[test]
fn close_hooks_fire_exactly_once_even_after_iteration_failure() {
    let datastore = FailingDatastore::new(
        "flaky_db",
        vec!["name"],
        vec![vec![Value::from("ada")], vec![Value::from("brian")]],
        1,
    );

    let name = Column::physical(ColumnId::new(1), "flaky", "name");
    let probe_instance = Arc::new(InitCloseProbe::new());
    let probe = Arc::new(
        ComponentJob::new(
            ComponentId::new(1),
            "probe",
            ComponentKind::Analyzer(Arc::clone(&probe_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&name)]),
    );

    let listener = Arc::new(EventRecordingListener::new());
    let mut runner = AnalysisRunner::with_task_runner(Arc::new(SingleThreadedTaskRunner::new()));
    runner.add_listener(Arc::clone(&listener) as _);
    let job = AnalysisJob::new(
        "flaky iteration",
        Arc::new(datastore),
        vec![name],
        vec![probe],
    );
    let future = runner.run(job).expect("valid job");
    future.await_done();

    assert_eq!(future.status(), JobStatus::Errornous);
    assert_eq!(probe_instance.init_count(), 1);
    assert_eq!(probe_instance.close_count(), 1);
    assert_eq!(listener.count_of("error_unknown"), 1);
    assert_eq!(listener.count_of("job_success"), 0);
    assert!(
        future
            .errors()
            .iter()
            .any(|e| e.message.contains("connection lost"))
    );
}

#[test]
fn row_limit_filter_is_pushed_into_the_source_query() {
    let datastore = people_datastore(vec![
        (Some("a"), None),
        (Some("b"), None),
        (Some("c"), None),
        (Some("d"), None),
        (Some("e"), None),
    ]);

    let name = Column::physical(ColumnId::new(1), "people", "name");
    let max_rows = Arc::new(ComponentJob::new(
        ComponentId::new(1),
        "first two",
        ComponentKind::Filter(Arc::new(MaxRowsFilter::new(2))),
    ));
    let analyzer_instance = Arc::new(RecordingAnalyzer::new());
    let analyzer = Arc::new(
        ComponentJob::new(
            ComponentId::new(2),
            "collect limited",
            ComponentKind::Analyzer(Arc::clone(&analyzer_instance) as _),
        )
        .with_inputs(vec![Arc::clone(&name)])
        .with_requirement(Requirement::Outcome(FilterOutcome::new(
            ComponentId::new(1),
            MaxRowsFilter::VALID,
        ))),
    );

    let job = Arc::new(AnalysisJob::new(
        "pushdown",
        datastore.into_shared(),
        vec![Arc::clone(&name)],
        vec![max_rows, analyzer],
    ));

    // The plan itself shows the pushdown: the filter is gone from the chain
    // and the query carries the row bound.
    let registry = PublisherRegistry::build(&job).expect("valid job");
    let publisher = registry
        .publisher(&StreamKey::table("people"))
        .expect("people publisher");
    assert_eq!(publisher.state(), PublisherState::ConsumersRegistered);
    let plan = publisher.plan().expect("plan");
    assert_eq!(plan.query.max_rows(), Some(2));
    assert_eq!(plan.consumers.len(), 1);
    assert_eq!(plan.preloaded_outcomes.len(), 1);

    // And end to end the analyzer sees exactly the limited rows.
    let runner = AnalysisRunner::with_task_runner(Arc::new(SingleThreadedTaskRunner::new()));
    let future = runner
        .run(Arc::try_unwrap(job).unwrap_or_else(|arc| (*arc).clone()))
        .expect("valid job");
    future.await_done();
    assert!(future.is_successful());
    assert_eq!(analyzer_instance.row_ids().len(), 2);
}
