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
//! Topological consumer ordering.
//!
//! Responsibilities:
//! - Orders one stream's consumers into a strict sequence safe for per-row
//!   execution: virtual inputs before their consumers, filter outcomes
//!   before the consumers they gate.
//! - Carries the deliberate escape hatch for multi-stream components whose
//!   dependencies live in a sibling stream this sort cannot see.
//!
//! Key exported interfaces:
//! - Functions: `sort_consumers`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::common::ids::ColumnId;
use crate::engine::consumer::Consumer;
use crate::model::outcome::FilterOutcome;
use crate::scrubjay_logging::warn;

/// Fixed-point ordering pass over one stream's consumers.
///
/// A consumer is accepted into the order once (a) its requirement could be
/// satisfied by the outcomes of already-accepted consumers, and (b) every
/// non-physical, non-constant input column was published by an
/// already-accepted consumer. When a pass accepts nothing and a multi-stream
/// component remains, that component is force-accepted: its dependency may
/// live in a sibling stream, which this sort has no visibility into. This is
/// a best-effort rule, not a provably-correct one; zero progress without the
/// fallback is a programming-error-class failure.
pub fn sort_consumers(consumers: Vec<Arc<Consumer>>) -> Result<Vec<Arc<Consumer>>, String> {
    let mut remaining = consumers;
    let mut sorted: Vec<Arc<Consumer>> = Vec::with_capacity(remaining.len());
    let mut available_outcomes: HashSet<FilterOutcome> = HashSet::new();
    let mut available_columns: HashSet<ColumnId> = HashSet::new();

    while !remaining.is_empty() {
        let mut accepted_this_pass = Vec::new();
        let mut still_remaining = Vec::with_capacity(remaining.len());

        for consumer in remaining {
            if is_schedulable(&consumer, &available_outcomes, &available_columns) {
                accepted_this_pass.push(consumer);
            } else {
                still_remaining.push(consumer);
            }
        }

        if accepted_this_pass.is_empty() {
            // No progress. A multi-stream component may depend on a sibling
            // stream; force-accept the first one rather than deadlocking.
            let position = still_remaining.iter().position(|c| c.is_multi_stream());
            match position {
                Some(position) => {
                    let forced = still_remaining.remove(position);
                    warn!(
                        "Consumer sort made no progress; force-accepting multi-stream component {}",
                        forced.component_job()
                    );
                    accepted_this_pass.push(forced);
                }
                None => {
                    let stuck: Vec<String> = still_remaining
                        .iter()
                        .map(|c| c.component_job().to_string())
                        .collect();
                    return Err(format!(
                        "consumer sort made no progress; unsatisfiable dependencies among: {}",
                        stuck.join(", ")
                    ));
                }
            }
        }

        for consumer in accepted_this_pass {
            for outcome in consumer.published_outcomes() {
                available_outcomes.insert(outcome);
            }
            for output in consumer.component_job().outputs() {
                available_columns.insert(output.id());
            }
            sorted.push(consumer);
        }
        remaining = still_remaining;
    }

    Ok(sorted)
}

fn is_schedulable(
    consumer: &Consumer,
    available_outcomes: &HashSet<FilterOutcome>,
    available_columns: &HashSet<ColumnId>,
) -> bool {
    if !consumer.satisfied_for_flow_ordering(available_outcomes) {
        return false;
    }
    consumer.required_columns().iter().all(|column| {
        column.is_physical() || column.is_constant() || available_columns.contains(&column.id())
    })
}
