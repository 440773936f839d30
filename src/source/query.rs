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

use crate::model::column::ColumnRef;

/// Column-projected query against one physical table.
///
/// Selects exactly the physical columns the stream's consumers need, in a
/// stable order; optimizable filters may push row-limit/offset semantics
/// into `max_rows`/`first_row`.
#[derive(Clone, Debug)]
pub struct RowQuery {
    table: String,
    columns: Vec<ColumnRef>,
    max_rows: Option<u64>,
    first_row: Option<u64>,
}

impl RowQuery {
    pub fn new(table: impl Into<String>, columns: Vec<ColumnRef>) -> Self {
        Self {
            table: table.into(),
            columns,
            max_rows: None,
            first_row: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    /// 1-based index of the first row to return.
    pub fn first_row(&self) -> Option<u64> {
        self.first_row
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_first_row(mut self, first_row: u64) -> Self {
        self.first_row = Some(first_row);
        self
    }
}

impl fmt::Display for RowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name()).collect();
        write!(f, "SELECT {} FROM {}", names.join(", "), self.table)?;
        if let Some(max_rows) = self.max_rows {
            write!(f, " MAX ROWS {}", max_rows)?;
        }
        if let Some(first_row) = self.first_row {
            write!(f, " FIRST ROW {}", first_row)?;
        }
        Ok(())
    }
}
