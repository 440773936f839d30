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
//! Concatenation transformer over multiple input columns.

use crate::model::column::ColumnRef;
use crate::model::component::{Component, OutputRowCollector, Transformer};
use crate::model::row::Row;
use crate::model::value::Value;

/// Joins the display renditions of its input columns into one text value.
/// Null and missing bindings render as empty.
pub struct ConcatTransformer {
    columns: Vec<ColumnRef>,
    separator: String,
}

impl ConcatTransformer {
    pub fn new(columns: Vec<ColumnRef>, separator: impl Into<String>) -> Self {
        Self {
            columns,
            separator: separator.into(),
        }
    }
}

impl Component for ConcatTransformer {
    fn name(&self) -> &str {
        "Concatenate"
    }
}

impl Transformer for ConcatTransformer {
    fn transform(
        &self,
        row: &Row,
        _collector: &mut OutputRowCollector,
    ) -> Result<Vec<Value>, String> {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| match row.value(column) {
                Some(Value::Null) | None => String::new(),
                Some(value) => value.to_string(),
            })
            .collect();
        Ok(vec![Value::Text(parts.join(&self.separator))])
    }
}
