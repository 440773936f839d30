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
use std::fmt;

use crate::common::ids::{ColumnId, RowId};
use crate::model::column::Column;
use crate::model::value::Value;

/// One record flowing through the consumption chain.
///
/// Stable identity plus an append-only bag of column bindings that grows as
/// transformers add virtual values. Mutation is local to one row's traversal
/// and never shared across rows or multiplied branches.
#[derive(Clone, Debug)]
pub struct Row {
    id: RowId,
    values: Vec<(ColumnId, Value)>,
}

impl Row {
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            values: Vec::new(),
        }
    }

    pub fn from_values(id: RowId, values: Vec<(ColumnId, Value)>) -> Self {
        Self { id, values }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    /// Resolve a column against this row. Constant columns resolve without a
    /// binding; physical and virtual columns resolve to their bound value.
    pub fn value(&self, column: &Column) -> Option<Value> {
        if let Some(constant) = column.constant_value() {
            return Some(constant.clone());
        }
        self.value_of(column.id()).cloned()
    }

    pub fn value_of(&self, column: ColumnId) -> Option<&Value> {
        self.values
            .iter()
            .find(|(id, _)| *id == column)
            .map(|(_, value)| value)
    }

    pub fn has_value(&self, column: ColumnId) -> bool {
        self.values.iter().any(|(id, _)| *id == column)
    }

    /// Bind a value. Rebinding an already-bound column replaces the value;
    /// this only happens when a transformer re-runs on a multiplied branch.
    pub fn put(&mut self, column: ColumnId, value: Value) {
        if let Some(slot) = self.values.iter_mut().find(|(id, _)| *id == column) {
            slot.1 = value;
            return;
        }
        self.values.push((column, value));
    }

    /// Clone this row's bindings under a fresh identity (record multiplication).
    pub fn derive(&self, id: RowId) -> Self {
        Self {
            id,
            values: self.values.clone(),
        }
    }

    pub fn bindings(&self) -> &[(ColumnId, Value)] {
        &self.values
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ({} values)", self.id, self.values.len())
    }
}
