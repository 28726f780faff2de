// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sessiongraph_memory::KnowledgeGraphConfig;
use std::path::{Path, PathBuf};

pub const ENV_SIMILARITY_THRESHOLD: &str = "SESSIONGRAPH_SIMILARITY_THRESHOLD";
pub const ENV_MAX_GRAPH_NODES: &str = "SESSIONGRAPH_MAX_GRAPH_NODES";

/// Sessiongraph CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    /// Knowledge graph memory settings
    #[serde(default)]
    pub memory: KnowledgeGraphConfig,
}

impl CliConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    ///
    /// Supported environment variables:
    /// - SESSIONGRAPH_SIMILARITY_THRESHOLD: merge threshold in [0, 1]
    /// - SESSIONGRAPH_MAX_GRAPH_NODES: node ceiling per session ("unbounded" or empty for none)
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        let config = config.merge_with_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables that are set
    pub fn merge_with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = var(ENV_SIMILARITY_THRESHOLD) {
            self.memory.similarity_threshold = value.trim().parse().with_context(|| {
                format!("{} is not a number: {:?}", ENV_SIMILARITY_THRESHOLD, value)
            })?;
        }

        if let Some(value) = var(ENV_MAX_GRAPH_NODES) {
            let value = value.trim();
            let unbounded = value.is_empty() || value.eq_ignore_ascii_case("unbounded");
            self.memory.max_graph_nodes = if unbounded {
                None
            } else {
                Some(value.parse().with_context(|| {
                    format!("{} is not a node count: {:?}", ENV_MAX_GRAPH_NODES, value)
                })?)
            };
        }

        Ok(self)
    }

    /// Validate the memory settings
    pub fn validate(&self) -> Result<()> {
        self.memory
            .validate()
            .context("invalid [memory] configuration")
    }
}
