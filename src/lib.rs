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
pub mod common;
pub mod components;
pub mod engine;
pub mod model;
pub mod runtime;
pub mod source;

// Convenience aliases for the ambient facades.
pub use common::app_config as scrubjay_config;
pub use common::logging as scrubjay_logging;

pub use common::error::{JobError, JobErrorKind, JobFailedError};
pub use engine::result::{AnalysisResultFuture, JobStatus};
pub use engine::runner::AnalysisRunner;
pub use model::job::{AnalysisJob, OutputStreamJob, StreamKey};
