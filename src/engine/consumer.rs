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
//! Runtime consumer wrapper.
//!
//! Responsibilities:
//! - Binds one component-job spec to its live instance within one stream's
//!   execution; precomputes requirement satisfaction where it is static.
//! - Answers the two satisfaction questions the sorter and the per-row chain
//!   ask, including transitive satisfaction through input-column producers.
//!
//! Key exported interfaces:
//! - Types: `Consumer`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::common::ids::ComponentId;
use crate::model::column::ColumnRef;
use crate::model::component::{ComponentJob, ComponentKind};
use crate::model::job::JobScope;
use crate::model::outcome::{FilterOutcome, OutcomeSieve};
use crate::model::requirement::Requirement;

/// Runtime binding of one component job within one stream.
///
/// Wraps exactly one component instance for the lifetime of one run; the
/// instance is never shared across streams.
#[derive(Debug)]
pub struct Consumer {
    job: Arc<ComponentJob>,
    /// Precomputed once per consumer: no inputs at all, or an explicit "any"
    /// wildcard requirement, means every row satisfies this consumer.
    always_satisfied: bool,
    /// When the component declares no requirement of its own, satisfaction is
    /// inherited from the producers of its virtual input columns.
    inherited_requirements: Vec<Requirement>,
}

impl Consumer {
    pub fn new(job: Arc<ComponentJob>, scope: &JobScope) -> Self {
        let (always_satisfied, inherited_requirements) = precompute_satisfaction(&job, scope);
        Self {
            job,
            always_satisfied,
            inherited_requirements,
        }
    }

    pub fn component_job(&self) -> &Arc<ComponentJob> {
        &self.job
    }

    pub fn id(&self) -> ComponentId {
        self.job.id()
    }

    pub fn kind(&self) -> &ComponentKind {
        self.job.kind()
    }

    pub fn required_columns(&self) -> &[ColumnRef] {
        self.job.inputs()
    }

    pub fn is_concurrency_safe(&self) -> bool {
        self.job.component().is_concurrency_safe()
    }

    /// A component fanning out into nested output streams. Its true
    /// dependencies may live in a sibling stream the sorter cannot see.
    pub fn is_multi_stream(&self) -> bool {
        !self.job.output_streams().is_empty()
    }

    pub fn is_always_satisfied(&self) -> bool {
        self.always_satisfied
    }

    /// The outcomes this consumer makes available downstream once scheduled.
    pub fn published_outcomes(&self) -> Vec<FilterOutcome> {
        match self.job.kind() {
            ComponentKind::Filter(filter) => filter
                .categories()
                .into_iter()
                .map(|category| FilterOutcome {
                    component: self.job.id(),
                    category,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Flow-ordering sense (§topological sort): could this consumer be
    /// scheduled given the outcomes published by already-scheduled consumers?
    pub fn satisfied_for_flow_ordering(&self, available: &HashSet<FilterOutcome>) -> bool {
        if self.always_satisfied {
            return true;
        }
        match self.job.requirement() {
            Some(requirement) => requirement.satisfied_for_flow_ordering(available),
            None => self
                .inherited_requirements
                .iter()
                .any(|requirement| requirement.satisfied_for_flow_ordering(available)),
        }
    }

    /// Per-row consume sense: given this row's actual outcomes, should the
    /// component run?
    pub fn satisfied_for_consume(&self, sieve: &OutcomeSieve) -> bool {
        if self.always_satisfied {
            return true;
        }
        match self.job.requirement() {
            Some(requirement) => requirement.satisfied_for_consume(sieve),
            None => self
                .inherited_requirements
                .iter()
                .any(|requirement| requirement.satisfied_for_consume(sieve)),
        }
    }

    /// Whether every row reaching this consumer necessarily carries
    /// `outcome`. Used by the query optimizer to decide pushdown
    /// eligibility; conservative by design.
    pub fn routes_through(&self, outcome: &FilterOutcome) -> bool {
        if self.always_satisfied {
            return false;
        }
        match self.job.requirement() {
            Some(Requirement::Outcome(o)) => o == outcome,
            Some(Requirement::AnyOf(os)) => os.len() == 1 && os[0] == *outcome,
            Some(Requirement::Any) | None => {
                !self.inherited_requirements.is_empty()
                    && self
                        .inherited_requirements
                        .iter()
                        .all(|r| matches!(r, Requirement::Outcome(o) if o == outcome))
            }
        }
    }

    pub fn initialize(&self) -> Result<(), String> {
        self.job.component().init()
    }

    pub fn close(&self) -> Result<(), String> {
        self.job.component().close()
    }
}

fn precompute_satisfaction(
    job: &Arc<ComponentJob>,
    scope: &JobScope,
) -> (bool, Vec<Requirement>) {
    if matches!(job.requirement(), Some(Requirement::Any)) {
        return (true, Vec::new());
    }
    if job.requirement().is_some() {
        return (false, Vec::new());
    }

    // No explicit requirement: inherit from the producers of virtual inputs.
    let mut inherited = Vec::new();
    for column in job.inputs() {
        if !column.is_virtual() {
            continue;
        }
        match scope.producer_of(column.id()) {
            Some(producer) => match producer.requirement() {
                // An ungated (or wildcard-gated) producer emits for every
                // row, so the consumer is unconditionally reachable.
                None | Some(Requirement::Any) => return (true, Vec::new()),
                Some(requirement) => inherited.push(requirement.clone()),
            },
            // Producer in a sibling stream; nothing to inherit from here.
            None => return (true, Vec::new()),
        }
    }

    if inherited.is_empty() {
        // Only physical/constant inputs (or none at all).
        return (true, Vec::new());
    }
    (false, inherited)
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer of {}", self.job)
    }
}
