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
//! Built-in components covering every behavioral role, including query
//! pushdown ([`max_rows_filter`]), record multiplication
//! ([`tokenizer_transformer`]) and output-stream publication
//! ([`completeness_analyzer`]).

pub mod completeness_analyzer;
pub mod concat_transformer;
pub mod equals_filter;
pub mod max_rows_filter;
pub mod null_check_filter;
pub mod row_count_analyzer;
pub mod tokenizer_transformer;
pub mod upper_case_transformer;
pub mod value_distribution_analyzer;

pub use completeness_analyzer::CompletenessAnalyzer;
pub use concat_transformer::ConcatTransformer;
pub use equals_filter::EqualsFilter;
pub use max_rows_filter::MaxRowsFilter;
pub use null_check_filter::NullCheckFilter;
pub use row_count_analyzer::RowCountAnalyzer;
pub use tokenizer_transformer::TokenizerTransformer;
pub use upper_case_transformer::UpperCaseTransformer;
pub use value_distribution_analyzer::ValueDistributionAnalyzer;
