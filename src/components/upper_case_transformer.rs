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
//! Upper-case transformer producing one virtual text column.

use crate::model::column::ColumnRef;
use crate::model::component::{Component, OutputRowCollector, Transformer};
use crate::model::row::Row;
use crate::model::value::Value;

/// Emits the upper-cased rendition of one input column. Non-text input is an
/// error the engine reports against the offending row.
pub struct UpperCaseTransformer {
    column: ColumnRef,
}

impl UpperCaseTransformer {
    pub fn new(column: ColumnRef) -> Self {
        Self { column }
    }
}

impl Component for UpperCaseTransformer {
    fn name(&self) -> &str {
        "Upper case"
    }
}

impl Transformer for UpperCaseTransformer {
    fn transform(
        &self,
        row: &Row,
        _collector: &mut OutputRowCollector,
    ) -> Result<Vec<Value>, String> {
        match row.value(&self.column) {
            Some(Value::Text(text)) => Ok(vec![Value::Text(text.to_uppercase())]),
            Some(Value::Null) | None => Ok(vec![Value::Null]),
            Some(other) => Err(format!(
                "expected text in column {}, got {}",
                self.column.name(),
                other.type_name()
            )),
        }
    }
}
