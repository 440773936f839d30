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
//! Tabular source contracts.
//!
//! Responsibilities:
//! - Defines the scoped-connection datastore boundary the engine pulls rows
//!   through: open, execute a column-projected query, estimate row counts.
//!
//! Key exported interfaces:
//! - Types: `Datastore`, `DatastoreConnection`, `RowSet`.

use crate::model::value::Value;
use crate::source::query::RowQuery;

/// A queryable tabular source. Implementations are external; the engine only
/// requires scoped connections and projected row iteration.
pub trait Datastore: Send + Sync {
    fn name(&self) -> &str;

    /// Open a scoped connection. The connection is released when the returned
    /// value is dropped; the optimizer probe and the main row iteration each
    /// acquire their own scope and need not share a physical connection.
    fn open_connection(&self) -> Result<Box<dyn DatastoreConnection>, String>;
}

/// One scoped connection to a datastore.
pub trait DatastoreConnection: Send {
    /// Execute a column-projected, optionally row-limited query.
    fn execute(&mut self, query: &RowQuery) -> Result<RowSet, String>;

    /// Best-effort row count for progress reporting. `Ok(None)` = unknown;
    /// failure to estimate is non-fatal for the caller.
    fn approximate_row_count(&mut self, table: &str) -> Result<Option<u64>, String>;
}

/// Iterable result set of one query. Each item is one record's values in
/// query projection order; per-record errors surface as `Err` items so the
/// engine can abort iteration without losing already-delivered rows.
pub struct RowSet {
    rows: Box<dyn Iterator<Item = Result<Vec<Value>, String>> + Send>,
}

impl RowSet {
    pub fn new(rows: Box<dyn Iterator<Item = Result<Vec<Value>, String>> + Send>) -> Self {
        Self { rows }
    }

    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: Box::new(rows.into_iter().map(Ok)),
        }
    }
}

impl Iterator for RowSet {
    type Item = Result<Vec<Value>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}
