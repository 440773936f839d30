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
//! Row-limit filter, natively optimizable into the source query.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::component::{Component, Filter};
use crate::model::outcome::Category;
use crate::model::row::Row;
use crate::source::query::RowQuery;

/// Lets the first `limit` rows through as VALID, everything after as
/// INVALID. When every downstream consumer routes through VALID, the whole
/// filter collapses into a `max_rows` bound on the source query.
pub struct MaxRowsFilter {
    limit: u64,
    seen: AtomicU64,
}

impl MaxRowsFilter {
    pub const VALID: &'static str = "VALID";
    pub const INVALID: &'static str = "INVALID";

    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            seen: AtomicU64::new(0),
        }
    }
}

impl Component for MaxRowsFilter {
    fn name(&self) -> &str {
        "Max rows"
    }
}

impl Filter for MaxRowsFilter {
    fn categories(&self) -> Vec<Category> {
        vec![Category::new(Self::VALID), Category::new(Self::INVALID)]
    }

    fn categorize(&self, _row: &Row) -> Result<Category, String> {
        let seen = self.seen.fetch_add(1, Ordering::Relaxed);
        Ok(Category::new(if seen < self.limit {
            Self::VALID
        } else {
            Self::INVALID
        }))
    }

    fn optimize_query(&self, query: &RowQuery, category: &Category) -> Option<RowQuery> {
        if category.as_str() != Self::VALID {
            return None;
        }
        Some(query.clone().with_max_rows(self.limit))
    }
}
