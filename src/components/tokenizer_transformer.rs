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
//! Tokenizer transformer, the record-multiplying case.

use crate::model::column::ColumnRef;
use crate::model::component::{Component, OutputRowCollector, Transformer};
use crate::model::row::Row;
use crate::model::value::Value;

/// Splits one text column on a separator and emits one output row per
/// token: the first token on the input row itself, every further token as
/// an additional tuple through the collector (record multiplication).
pub struct TokenizerTransformer {
    column: ColumnRef,
    separator: char,
}

impl TokenizerTransformer {
    pub fn new(column: ColumnRef, separator: char) -> Self {
        Self { column, separator }
    }
}

impl Component for TokenizerTransformer {
    fn name(&self) -> &str {
        "Tokenizer"
    }
}

impl Transformer for TokenizerTransformer {
    fn transform(
        &self,
        row: &Row,
        collector: &mut OutputRowCollector,
    ) -> Result<Vec<Value>, String> {
        let Some(Value::Text(text)) = row.value(&self.column) else {
            return Ok(vec![Value::Null]);
        };
        let mut tokens = text
            .split(self.separator)
            .filter(|token| !token.is_empty())
            .map(|token| Value::Text(token.to_string()));

        let first = tokens.next().unwrap_or(Value::Null);
        for token in tokens {
            collector.push(vec![token]);
        }
        Ok(vec![first])
    }
}
