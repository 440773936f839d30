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
//! Source-query optimization by filter pushdown.
//!
//! Responsibilities:
//! - Rewrites a stream's base query with filter semantics the source can
//!   evaluate natively, removes consumers the rewritten query subsumes, and
//!   publishes their now-unconditional outcomes.
//! - Provides the identity variant used for nested streams, which have no
//!   physical query to optimize.
//!
//! Key exported interfaces:
//! - Types: `QueryOptimizer`, `RowProcessingQueryOptimizer`,
//!   `NoopQueryOptimizer`, `OptimizedQueryPlan`.

use std::sync::Arc;

use crate::engine::consumer::Consumer;
use crate::model::component::ComponentKind;
use crate::model::outcome::FilterOutcome;
use crate::scrubjay_logging::debug;
use crate::source::query::RowQuery;

/// Outcome of one optimization attempt over (query, sorted consumers).
#[derive(Clone)]
pub struct OptimizedQueryPlan {
    pub query: RowQuery,
    pub consumers: Vec<Arc<Consumer>>,
    /// Outcomes that hold for every fetched row because their producing
    /// filter was subsumed into the query.
    pub preloaded_outcomes: Vec<FilterOutcome>,
}

/// Best-effort query rewriting. Failure to optimize is never an error, only
/// a missed efficiency opportunity.
pub trait QueryOptimizer: Send + Sync {
    fn optimize(&self, query: RowQuery, consumers: Vec<Arc<Consumer>>) -> OptimizedQueryPlan;
}

/// Identity passthrough, used where no physical query backs the stream.
pub struct NoopQueryOptimizer;

impl QueryOptimizer for NoopQueryOptimizer {
    fn optimize(&self, query: RowQuery, consumers: Vec<Arc<Consumer>>) -> OptimizedQueryPlan {
        OptimizedQueryPlan {
            query,
            consumers,
            preloaded_outcomes: Vec::new(),
        }
    }
}

/// Pushes leading optimizable filters into the source query.
///
/// A filter is eligible while it sits at the head of the sorted chain, one
/// of its categories is expressible as native query semantics, and every
/// remaining consumer routes through exactly that outcome (so rows the
/// rewritten query drops could never have reached them). Eligible filters
/// are removed from the chain; their pushed outcome becomes unconditionally
/// true for every fetched row.
pub struct RowProcessingQueryOptimizer;

impl QueryOptimizer for RowProcessingQueryOptimizer {
    fn optimize(
        &self,
        mut query: RowQuery,
        mut consumers: Vec<Arc<Consumer>>,
    ) -> OptimizedQueryPlan {
        let mut preloaded_outcomes = Vec::new();

        while let Some(head) = consumers.first().cloned() {
            let Some(rewrite) = eligible_rewrite(&head, &query, &consumers[1..]) else {
                break;
            };
            debug!(
                "Query pushdown: {} subsumed by query, outcome {} now unconditional",
                head.component_job(),
                rewrite.outcome
            );
            query = rewrite.query;
            preloaded_outcomes.push(rewrite.outcome);
            consumers.remove(0);
        }

        OptimizedQueryPlan {
            query,
            consumers,
            preloaded_outcomes,
        }
    }
}

struct Rewrite {
    query: RowQuery,
    outcome: FilterOutcome,
}

fn eligible_rewrite(head: &Consumer, query: &RowQuery, rest: &[Arc<Consumer>]) -> Option<Rewrite> {
    // Only an ungated head can be folded into the query: a requirement on
    // the filter itself cannot be expressed source-side.
    if !head.is_always_satisfied() {
        return None;
    }
    let ComponentKind::Filter(filter) = head.kind() else {
        return None;
    };
    for category in filter.categories() {
        let Some(rewritten) = filter.optimize_query(query, &category) else {
            continue;
        };
        let outcome = FilterOutcome {
            component: head.id(),
            category,
        };
        if rest.iter().all(|consumer| consumer.routes_through(&outcome)) {
            return Some(Rewrite {
                query: rewritten,
                outcome,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::{ColumnId, ComponentId};
    use crate::components::max_rows_filter::MaxRowsFilter;
    use crate::components::row_count_analyzer::RowCountAnalyzer;
    use crate::model::column::Column;
    use crate::model::component::{ComponentJob, ComponentKind};
    use crate::model::job::JobScope;
    use crate::model::requirement::Requirement;

    fn base_query() -> RowQuery {
        RowQuery::new(
            "orders",
            vec![Column::physical(ColumnId::new(1), "orders", "id")],
        )
    }

    fn consumers_for(jobs: Vec<Arc<ComponentJob>>) -> Vec<Arc<Consumer>> {
        let scope = JobScope::new(jobs.clone());
        jobs.into_iter()
            .map(|job| Arc::new(Consumer::new(job, &scope)))
            .collect()
    }

    fn max_rows_job(id: u32, limit: u64) -> Arc<ComponentJob> {
        Arc::new(ComponentJob::new(
            ComponentId::new(id),
            "max rows",
            ComponentKind::Filter(Arc::new(MaxRowsFilter::new(limit))),
        ))
    }

    fn gated_analyzer(id: u32, gate: FilterOutcome) -> Arc<ComponentJob> {
        Arc::new(
            ComponentJob::new(
                ComponentId::new(id),
                "count",
                ComponentKind::Analyzer(Arc::new(RowCountAnalyzer::new())),
            )
            .with_requirement(Requirement::Outcome(gate)),
        )
    }

    #[test]
    fn noop_optimizer_is_identity() {
        let consumers = consumers_for(vec![max_rows_job(1, 5)]);
        let plan = NoopQueryOptimizer.optimize(base_query(), consumers);
        assert_eq!(plan.query.max_rows(), None);
        assert_eq!(plan.consumers.len(), 1);
        assert!(plan.preloaded_outcomes.is_empty());
    }

    #[test]
    fn row_limit_filter_is_pushed_into_the_query() {
        let gate = FilterOutcome::new(ComponentId::new(1), MaxRowsFilter::VALID);
        let consumers = consumers_for(vec![max_rows_job(1, 5), gated_analyzer(2, gate.clone())]);
        let plan = RowProcessingQueryOptimizer.optimize(base_query(), consumers);

        assert_eq!(plan.query.max_rows(), Some(5));
        // The filter was subsumed; only the analyzer remains.
        assert_eq!(plan.consumers.len(), 1);
        assert_eq!(plan.consumers[0].id(), ComponentId::new(2));
        assert_eq!(plan.preloaded_outcomes, vec![gate]);
    }

    #[test]
    fn pushdown_is_skipped_when_a_consumer_does_not_route_through() {
        // The analyzer has no requirement at all: it must see every source
        // row, so the row limit cannot be folded into the query.
        let ungated = Arc::new(ComponentJob::new(
            ComponentId::new(2),
            "count",
            ComponentKind::Analyzer(Arc::new(RowCountAnalyzer::new())),
        ));
        let consumers = consumers_for(vec![max_rows_job(1, 5), ungated]);
        let plan = RowProcessingQueryOptimizer.optimize(base_query(), consumers);

        assert_eq!(plan.query.max_rows(), None);
        assert_eq!(plan.consumers.len(), 2);
        assert!(plan.preloaded_outcomes.is_empty());
    }

    #[test]
    fn non_optimizable_filters_remain_in_the_chain() {
        use crate::components::null_check_filter::NullCheckFilter;
        let column = Column::physical(ColumnId::new(1), "orders", "id");
        let filter = Arc::new(
            ComponentJob::new(
                ComponentId::new(1),
                "null check",
                ComponentKind::Filter(Arc::new(NullCheckFilter::new(Arc::clone(&column)))),
            )
            .with_inputs(vec![column]),
        );
        let gate = FilterOutcome::new(ComponentId::new(1), NullCheckFilter::VALID);
        let consumers = consumers_for(vec![filter, gated_analyzer(2, gate)]);
        let plan = RowProcessingQueryOptimizer.optimize(base_query(), consumers);
        assert_eq!(plan.consumers.len(), 2);
        assert!(plan.preloaded_outcomes.is_empty());
    }
}
