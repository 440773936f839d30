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
use std::sync::Arc;

use crate::common::ids::ColumnId;
use crate::model::value::Value;

/// Shared handle to one declared column.
pub type ColumnRef = Arc<Column>;

/// Where a column's per-row value comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnOrigin {
    /// Backed directly by a field of a source table (or of a nested stream's
    /// record layout; the "table" is then the stream name).
    Physical { table: String },
    /// Produced by a transformer during row processing. Available only after
    /// the producing transformer executed for the current row.
    Virtual,
    /// A fixed value, available to every row without any producer.
    Constant(Value),
}

/// One declared column: identity + name + origin.
#[derive(Clone, Debug)]
pub struct Column {
    id: ColumnId,
    name: String,
    origin: ColumnOrigin,
}

impl Column {
    pub fn physical(id: ColumnId, table: impl Into<String>, name: impl Into<String>) -> ColumnRef {
        Arc::new(Self {
            id,
            name: name.into(),
            origin: ColumnOrigin::Physical {
                table: table.into(),
            },
        })
    }

    pub fn virtual_column(id: ColumnId, name: impl Into<String>) -> ColumnRef {
        Arc::new(Self {
            id,
            name: name.into(),
            origin: ColumnOrigin::Virtual,
        })
    }

    pub fn constant(id: ColumnId, name: impl Into<String>, value: Value) -> ColumnRef {
        Arc::new(Self {
            id,
            name: name.into(),
            origin: ColumnOrigin::Constant(value),
        })
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ColumnOrigin {
        &self.origin
    }

    pub fn is_physical(&self) -> bool {
        matches!(self.origin, ColumnOrigin::Physical { .. })
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.origin, ColumnOrigin::Virtual)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.origin, ColumnOrigin::Constant(_))
    }

    pub fn physical_table(&self) -> Option<&str> {
        match &self.origin {
            ColumnOrigin::Physical { table } => Some(table),
            _ => None,
        }
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.origin {
            ColumnOrigin::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            ColumnOrigin::Physical { table } => write!(f, "{}.{}", table, self.name),
            ColumnOrigin::Virtual => write!(f, "{} (virtual)", self.name),
            ColumnOrigin::Constant(value) => write!(f, "{} (constant: {})", self.name, value),
        }
    }
}
