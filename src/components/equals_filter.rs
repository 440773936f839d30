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
//! Equality filter against a fixed reference value.

use crate::model::column::ColumnRef;
use crate::model::component::{Component, Filter};
use crate::model::outcome::Category;
use crate::model::row::Row;
use crate::model::value::Value;

/// Routes rows on whether one column equals a reference value.
pub struct EqualsFilter {
    column: ColumnRef,
    reference: Value,
}

impl EqualsFilter {
    pub const MATCH: &'static str = "MATCH";
    pub const NO_MATCH: &'static str = "NO_MATCH";

    pub fn new(column: ColumnRef, reference: Value) -> Self {
        Self { column, reference }
    }
}

impl Component for EqualsFilter {
    fn name(&self) -> &str {
        "Equals"
    }
}

impl Filter for EqualsFilter {
    fn categories(&self) -> Vec<Category> {
        vec![Category::new(Self::MATCH), Category::new(Self::NO_MATCH)]
    }

    fn categorize(&self, row: &Row) -> Result<Category, String> {
        let matched = row
            .value(&self.column)
            .map(|value| value == self.reference)
            .unwrap_or(false);
        Ok(Category::new(if matched {
            Self::MATCH
        } else {
            Self::NO_MATCH
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::{ColumnId, RowId};
    use crate::model::column::Column;

    #[test]
    fn matches_reference_value_only() {
        let column = Column::physical(ColumnId::new(1), "orders", "status");
        let filter = EqualsFilter::new(column, Value::from("open"));

        let mut open = Row::new(RowId::new(1));
        open.put(ColumnId::new(1), Value::from("open"));
        assert_eq!(filter.categorize(&open), Ok(Category::new("MATCH")));

        let mut closed = Row::new(RowId::new(2));
        closed.put(ColumnId::new(1), Value::from("closed"));
        assert_eq!(filter.categorize(&closed), Ok(Category::new("NO_MATCH")));

        let missing = Row::new(RowId::new(3));
        assert_eq!(filter.categorize(&missing), Ok(Category::new("NO_MATCH")));
    }
}
