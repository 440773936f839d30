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
//! Component activation conditions over upstream filter outcomes.
//!
//! Responsibilities:
//! - Declares which filter outcomes gate a component, and evaluates the gate
//!   in the two senses the engine needs: flow ordering and per-row consume.
//!
//! Key exported interfaces:
//! - Types: `Requirement`.

use std::collections::HashSet;
use std::fmt;

use crate::model::outcome::{FilterOutcome, OutcomeSieve};

/// Predicate over the outcomes produced upstream of a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// The wildcard requirement: satisfied for every row.
    Any,
    /// Satisfied when one specific outcome was produced for the row.
    Outcome(FilterOutcome),
    /// Satisfied when at least one of the listed outcomes was produced.
    AnyOf(Vec<FilterOutcome>),
}

impl Requirement {
    /// The outcomes this requirement statically depends on.
    pub fn processing_dependencies(&self) -> &[FilterOutcome] {
        match self {
            Requirement::Any => &[],
            Requirement::Outcome(outcome) => std::slice::from_ref(outcome),
            Requirement::AnyOf(outcomes) => outcomes,
        }
    }

    /// Flow-ordering sense: could this requirement ever be satisfied given
    /// the outcomes available from already-scheduled consumers? This is a
    /// structural check (no row), used only by the topological sorter.
    pub fn satisfied_for_flow_ordering(&self, available: &HashSet<FilterOutcome>) -> bool {
        if matches!(self, Requirement::Any) {
            return true;
        }
        self.processing_dependencies()
            .iter()
            .all(|outcome| available.contains(outcome))
    }

    /// Per-row consume sense: given the outcomes this row actually produced,
    /// should the gated component run?
    pub fn satisfied_for_consume(&self, sieve: &OutcomeSieve) -> bool {
        match self {
            Requirement::Any => true,
            Requirement::Outcome(outcome) => sieve.contains(outcome),
            Requirement::AnyOf(outcomes) => {
                outcomes.iter().any(|outcome| sieve.contains(outcome))
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Any => write!(f, "<any>"),
            Requirement::Outcome(outcome) => write!(f, "{}", outcome),
            Requirement::AnyOf(outcomes) => {
                let parts: Vec<String> = outcomes.iter().map(|o| o.to_string()).collect();
                write!(f, "any of [{}]", parts.join(", "))
            }
        }
    }
}
