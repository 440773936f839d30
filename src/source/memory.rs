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
//! In-memory datastore.
//!
//! Reference `Datastore` implementation backed by plain vectors. Used by the
//! crate's own tests and demos; production sources live outside the engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::value::Value;
use crate::source::datastore::{Datastore, DatastoreConnection, RowSet};
use crate::source::query::RowQuery;

/// One named table: column names plus record values in column order.
#[derive(Clone, Debug, Default)]
pub struct MemTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl MemTable {
    pub fn new(columns: Vec<&str>) -> Self {
        Self {
            columns: columns.into_iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, values: Vec<Value>) -> &mut Self {
        self.rows.push(values);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Datastore over a fixed set of in-memory tables.
pub struct MemoryDatastore {
    name: String,
    tables: HashMap<String, MemTable>,
}

impl MemoryDatastore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table_name: impl Into<String>, table: MemTable) -> Self {
        self.tables.insert(table_name.into(), table);
        self
    }

    pub fn into_shared(self) -> Arc<dyn Datastore> {
        Arc::new(self)
    }
}

impl Datastore for MemoryDatastore {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_connection(&self) -> Result<Box<dyn DatastoreConnection>, String> {
        // The connection owns a snapshot; dropping it releases the scope.
        Ok(Box::new(MemoryConnection {
            tables: self.tables.clone(),
        }))
    }
}

struct MemoryConnection {
    tables: HashMap<String, MemTable>,
}

impl DatastoreConnection for MemoryConnection {
    fn execute(&mut self, query: &RowQuery) -> Result<RowSet, String> {
        let table = self
            .tables
            .get(query.table())
            .ok_or_else(|| format!("unknown table: {}", query.table()))?;

        let mut projection = Vec::with_capacity(query.columns().len());
        for column in query.columns() {
            let index = table
                .columns
                .iter()
                .position(|name| name == column.name())
                .ok_or_else(|| {
                    format!(
                        "unknown column {} in table {}",
                        column.name(),
                        query.table()
                    )
                })?;
            projection.push(index);
        }

        let skip = query.first_row().map(|f| f.saturating_sub(1)).unwrap_or(0) as usize;
        let take = query.max_rows().map(|m| m as usize).unwrap_or(usize::MAX);

        let rows: Vec<Vec<Value>> = table
            .rows
            .iter()
            .skip(skip)
            .take(take)
            .map(|record| {
                projection
                    .iter()
                    .map(|&index| record.get(index).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(RowSet::from_rows(rows))
    }

    fn approximate_row_count(&mut self, table: &str) -> Result<Option<u64>, String> {
        match self.tables.get(table) {
            Some(t) => Ok(Some(t.rows.len() as u64)),
            None => Err(format!("unknown table: {}", table)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::ColumnId;
    use crate::model::column::Column;

    fn sample_datastore() -> MemoryDatastore {
        let mut table = MemTable::new(vec!["id", "name"]);
        table.add_row(vec![Value::from(1i64), Value::from("ada")]);
        table.add_row(vec![Value::from(2i64), Value::from("brian")]);
        table.add_row(vec![Value::from(3i64), Value::from("grace")]);
        MemoryDatastore::new("people_db").with_table("people", table)
    }

    #[test]
    fn execute_projects_requested_columns() {
        let datastore = sample_datastore();
        let mut conn = datastore.open_connection().expect("open");
        let query = RowQuery::new(
            "people",
            vec![Column::physical(ColumnId::new(2), "people", "name")],
        );
        let rows: Result<Vec<_>, _> = conn.execute(&query).expect("execute").collect();
        let rows = rows.expect("rows");
        assert_eq!(
            rows,
            vec![
                vec![Value::from("ada")],
                vec![Value::from("brian")],
                vec![Value::from("grace")],
            ]
        );
    }

    #[test]
    fn execute_applies_first_row_and_max_rows() {
        let datastore = sample_datastore();
        let mut conn = datastore.open_connection().expect("open");
        let query = RowQuery::new(
            "people",
            vec![Column::physical(ColumnId::new(1), "people", "id")],
        )
        .with_first_row(2)
        .with_max_rows(1);
        let rows: Result<Vec<_>, _> = conn.execute(&query).expect("execute").collect();
        assert_eq!(rows.expect("rows"), vec![vec![Value::from(2i64)]]);
    }

    #[test]
    fn unknown_table_and_column_are_errors() {
        let datastore = sample_datastore();
        let mut conn = datastore.open_connection().expect("open");
        let bad_table = RowQuery::new("nope", Vec::new());
        assert!(conn.execute(&bad_table).is_err());

        let bad_column = RowQuery::new(
            "people",
            vec![Column::physical(ColumnId::new(9), "people", "age")],
        );
        assert!(conn.execute(&bad_column).is_err());
    }

    #[test]
    fn approximate_row_count_reports_table_size() {
        let datastore = sample_datastore();
        let mut conn = datastore.open_connection().expect("open");
        assert_eq!(conn.approximate_row_count("people"), Ok(Some(3)));
        assert!(conn.approximate_row_count("nope").is_err());
    }
}
