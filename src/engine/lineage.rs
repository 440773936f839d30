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
//! Column lineage resolution.
//!
//! Responsibilities:
//! - Resolves which physical source columns a component transitively depends
//!   on, through transformer chains and requirement outcomes.
//! - Determines the single table a component's inputs originate from;
//!   multi-table spans are a fatal configuration error.
//!
//! Key exported interfaces:
//! - Functions: `resolve_physical_columns`, `origin_table`.

use std::collections::HashSet;

use crate::common::ids::{ColumnId, ComponentId};
use crate::model::column::ColumnRef;
use crate::model::component::ComponentJob;
use crate::model::job::JobScope;

/// All physical columns `component` transitively depends on within `scope`.
///
/// Follows virtual column → producing transformer chains, and requirement
/// outcomes → the producing filter's own inputs. Constant columns contribute
/// nothing. Producers living in a sibling stream are invisible to the scope
/// and simply not followed.
pub fn resolve_physical_columns(scope: &JobScope, component: &ComponentJob) -> Vec<ColumnRef> {
    let mut physical: Vec<ColumnRef> = Vec::new();
    let mut seen_columns: HashSet<ColumnId> = HashSet::new();
    let mut visited: HashSet<ComponentId> = HashSet::new();
    let mut worklist: Vec<&ComponentJob> = vec![component];

    while let Some(current) = worklist.pop() {
        if !visited.insert(current.id()) {
            continue;
        }
        for column in current.inputs() {
            if column.is_physical() {
                if seen_columns.insert(column.id()) {
                    physical.push(column.clone());
                }
            } else if column.is_virtual()
                && let Some(producer) = scope.producer_of(column.id())
            {
                worklist.push(producer.as_ref());
            }
        }
        if let Some(requirement) = current.requirement() {
            for outcome in requirement.processing_dependencies() {
                if let Some(filter) = scope.component_by_id(outcome.component) {
                    worklist.push(filter.as_ref());
                }
            }
        }
    }

    physical
}

/// The single physical table backing `component`'s resolved inputs, or
/// `None` for components with no physical dependency at all.
///
/// An input span across two distinct tables makes the job invalid; this is
/// surfaced before any row is processed.
pub fn origin_table(scope: &JobScope, component: &ComponentJob) -> Result<Option<String>, String> {
    let mut tables: Vec<String> = Vec::new();
    for column in resolve_physical_columns(scope, component) {
        if let Some(table) = column.physical_table()
            && !tables.iter().any(|t| t == table)
        {
            tables.push(table.to_string());
        }
    }
    match tables.len() {
        0 => Ok(None),
        1 => Ok(tables.pop()),
        _ => Err(format!(
            "invalid job: input columns of {} span multiple physical tables: {}",
            component,
            tables.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::ComponentId;
    use crate::model::column::Column;
    use crate::model::component::{
        Component, ComponentKind, Filter, OutputRowCollector, Transformer,
    };
    use crate::model::outcome::{Category, FilterOutcome};
    use crate::model::requirement::Requirement;
    use crate::model::row::Row;
    use crate::model::value::Value;
    use std::sync::Arc;

    struct Passthrough;

    impl Component for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }
    }

    impl Transformer for Passthrough {
        fn transform(
            &self,
            _row: &Row,
            _collector: &mut OutputRowCollector,
        ) -> Result<Vec<Value>, String> {
            Ok(Vec::new())
        }
    }

    struct AcceptAll;

    impl Component for AcceptAll {
        fn name(&self) -> &str {
            "accept all"
        }
    }

    impl Filter for AcceptAll {
        fn categories(&self) -> Vec<Category> {
            vec![Category::new("VALID")]
        }

        fn categorize(&self, _row: &Row) -> Result<Category, String> {
            Ok(Category::new("VALID"))
        }
    }

    #[test]
    fn follows_transformer_chains_to_physical_roots() {
        let physical = Column::physical(crate::common::ids::ColumnId::new(1), "orders", "amount");
        let derived_a = Column::virtual_column(crate::common::ids::ColumnId::new(2), "a");
        let derived_b = Column::virtual_column(crate::common::ids::ColumnId::new(3), "b");

        let first = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "first",
                ComponentKind::Transformer(Arc::new(Passthrough)),
            )
            .with_inputs(vec![Arc::clone(&physical)])
            .with_outputs(vec![Arc::clone(&derived_a)]),
        );
        let second = Arc::new(
            ComponentJob::new(
                ComponentId::new(2),
                "second",
                ComponentKind::Transformer(Arc::new(Passthrough)),
            )
            .with_inputs(vec![Arc::clone(&derived_a)])
            .with_outputs(vec![Arc::clone(&derived_b)]),
        );
        let consumer = ComponentJob::new(
            ComponentId::new(3),
            "consumer",
            ComponentKind::Transformer(Arc::new(Passthrough)),
        )
        .with_inputs(vec![Arc::clone(&derived_b)]);

        let scope = JobScope::new(vec![first, second]);
        let resolved = resolve_physical_columns(&scope, &consumer);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "amount");
        assert_eq!(origin_table(&scope, &consumer), Ok(Some("orders".to_string())));
    }

    #[test]
    fn requirement_outcomes_pull_in_filter_inputs() {
        let filter_input = Column::physical(crate::common::ids::ColumnId::new(1), "people", "name");
        let filter = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "name filter",
                ComponentKind::Filter(Arc::new(AcceptAll)),
            )
            .with_inputs(vec![Arc::clone(&filter_input)]),
        );
        let gated = ComponentJob::new(
            ComponentId::new(2),
            "gated",
            ComponentKind::Transformer(Arc::new(Passthrough)),
        )
        .with_requirement(Requirement::Outcome(FilterOutcome::new(
            ComponentId::new(1),
            "VALID",
        )));

        let scope = JobScope::new(vec![filter]);
        let resolved = resolve_physical_columns(&scope, &gated);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name(), "name");
    }

    #[test]
    fn multi_table_span_is_a_fatal_error() {
        let a = Column::physical(crate::common::ids::ColumnId::new(1), "orders", "id");
        let b = Column::physical(crate::common::ids::ColumnId::new(2), "people", "id");
        let component = ComponentJob::new(
            ComponentId::new(1),
            "spanning",
            ComponentKind::Transformer(Arc::new(Passthrough)),
        )
        .with_inputs(vec![a, b]);

        let scope = JobScope::new(Vec::new());
        let err = origin_table(&scope, &component).expect_err("must be invalid");
        assert!(err.contains("multiple physical tables"));
    }

    #[test]
    fn constants_and_missing_producers_resolve_to_no_table() {
        let constant = Column::constant(
            crate::common::ids::ColumnId::new(1),
            "origin",
            Value::from("import"),
        );
        let foreign_virtual = Column::virtual_column(crate::common::ids::ColumnId::new(2), "x");
        let component = ComponentJob::new(
            ComponentId::new(1),
            "detached",
            ComponentKind::Transformer(Arc::new(Passthrough)),
        )
        .with_inputs(vec![constant, foreign_virtual]);

        let scope = JobScope::new(Vec::new());
        assert!(resolve_physical_columns(&scope, &component).is_empty());
        assert_eq!(origin_table(&scope, &component), Ok(None));
    }
}
