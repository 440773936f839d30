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
//! Null-check filter: routes rows on the null-ness of one input column.

use crate::model::column::ColumnRef;
use crate::model::component::{Component, Filter};
use crate::model::outcome::Category;
use crate::model::row::Row;

/// Categorizes rows as VALID when the watched column holds a non-null value,
/// INVALID otherwise (including rows missing the binding entirely).
pub struct NullCheckFilter {
    column: ColumnRef,
}

impl NullCheckFilter {
    pub const VALID: &'static str = "VALID";
    pub const INVALID: &'static str = "INVALID";

    pub fn new(column: ColumnRef) -> Self {
        Self { column }
    }
}

impl Component for NullCheckFilter {
    fn name(&self) -> &str {
        "Null check"
    }
}

impl Filter for NullCheckFilter {
    fn categories(&self) -> Vec<Category> {
        vec![Category::new(Self::VALID), Category::new(Self::INVALID)]
    }

    fn categorize(&self, row: &Row) -> Result<Category, String> {
        let category = match row.value(&self.column) {
            Some(value) if !value.is_null() => Self::VALID,
            _ => Self::INVALID,
        };
        Ok(Category::new(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::{ColumnId, RowId};
    use crate::model::column::Column;
    use crate::model::value::Value;

    #[test]
    fn non_null_is_valid_null_and_missing_are_invalid() {
        let column = Column::physical(ColumnId::new(1), "people", "name");
        let filter = NullCheckFilter::new(column);

        let mut row = Row::new(RowId::new(1));
        row.put(ColumnId::new(1), Value::from("ada"));
        assert_eq!(filter.categorize(&row), Ok(Category::new("VALID")));

        let mut null_row = Row::new(RowId::new(2));
        null_row.put(ColumnId::new(1), Value::Null);
        assert_eq!(filter.categorize(&null_row), Ok(Category::new("INVALID")));

        let missing_row = Row::new(RowId::new(3));
        assert_eq!(filter.categorize(&missing_row), Ok(Category::new("INVALID")));
    }
}
