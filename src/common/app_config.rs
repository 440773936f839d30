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
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<ScrubjayConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static ScrubjayConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = ScrubjayConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn init_from_env_or_default() -> Result<&'static ScrubjayConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let Some(path) = config_path_from_env_or_default() else {
        let _ = CONFIG.set(ScrubjayConfig::default());
        return Ok(CONFIG.get().expect("CONFIG set"));
    };
    let cfg = ScrubjayConfig::load_from_file(&path)?;
    let _ = CONFIG.set(cfg);
    Ok(CONFIG.get().expect("CONFIG set"))
}

pub fn config() -> Result<&'static ScrubjayConfig> {
    init_from_env_or_default()
}

fn config_path_from_env_or_default() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SCRUBJAY_CONFIG") {
        if !p.trim().is_empty() {
            return Some(PathBuf::from(p));
        }
    }

    let candidates = [PathBuf::from("scrubjay.toml")];
    candidates.into_iter().find(|p| p.exists())
}

#[derive(Clone, Deserialize)]
pub struct ScrubjayConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "scrubjay=debug"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl ScrubjayConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let cfg: ScrubjayConfig =
            toml::from_str(&s).with_context(|| format!("parse toml: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.runtime.row_task_queue_limit == 0 {
            return Err(anyhow!("runtime.row_task_queue_limit must be positive"));
        }
        Ok(())
    }

    pub fn effective_log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(&self.log_level)
    }
}

impl Default for ScrubjayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Worker threads for the row-processing task runner. 0 = one per core.
    #[serde(default)]
    pub exec_threads: usize,

    /// Threads for the background executor (query optimization, row-count probes).
    #[serde(default = "default_background_threads")]
    pub background_threads: usize,

    /// Upper bound on row tasks buffered ahead of the workers before the
    /// dispatching thread starts assisting execution.
    #[serde(default = "default_row_task_queue_limit")]
    pub row_task_queue_limit: usize,
}

fn default_background_threads() -> usize {
    2
}

fn default_row_task_queue_limit() -> usize {
    1024
}

impl RuntimeConfig {
    pub fn actual_exec_threads(&self) -> usize {
        if self.exec_threads > 0 {
            return self.exec_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            exec_threads: 0,
            background_threads: default_background_threads(),
            row_task_queue_limit: default_row_task_queue_limit(),
        }
    }
}
