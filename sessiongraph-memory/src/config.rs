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

//! Knowledge graph memory configuration

use crate::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};

/// Default similarity threshold for merging entity mentions
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Configuration for the knowledge graph memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeGraphConfig {
    /// Minimum similarity score in [0, 1] for a mention to merge into an
    /// existing entity of the same type
    pub similarity_threshold: f64,

    /// Maximum entities per session graph (None = unbounded)
    pub max_graph_nodes: Option<usize>,

    /// Hop depth used by related-entity lookups
    pub traversal_depth: usize,

    /// Importance assigned to a newly inserted entity
    pub baseline_importance: f64,

    /// Importance added for every repeated mention
    pub mention_boost: f64,

    /// Importance added to both endpoints whenever a relation is observed
    pub relation_boost: f64,

    /// Entities listed in the rendered graph summary
    pub summary_entity_limit: usize,

    /// Relations listed in the rendered graph summary
    pub summary_relation_limit: usize,

    /// Entities described in the rendered entity info
    pub entity_info_limit: usize,

    /// Keys read from inputs/outputs when building turn text (empty = all keys)
    pub text_keys: Vec<String>,
}

impl Default for KnowledgeGraphConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_graph_nodes: None,
            traversal_depth: 1,
            baseline_importance: 1.0,
            mention_boost: 0.5,
            relation_boost: 0.25,
            summary_entity_limit: 10,
            summary_relation_limit: 10,
            entity_info_limit: 5,
            text_keys: Vec::new(),
        }
    }
}

impl KnowledgeGraphConfig {
    /// Set the similarity threshold
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the node ceiling per session
    pub fn max_graph_nodes(mut self, max_nodes: usize) -> Self {
        self.max_graph_nodes = Some(max_nodes);
        self
    }

    /// Set the traversal depth for related-entity lookups
    pub fn traversal_depth(mut self, depth: usize) -> Self {
        self.traversal_depth = depth;
        self
    }

    /// Restrict the input/output keys that carry turn text
    pub fn text_keys(mut self, keys: Vec<impl Into<String>>) -> Self {
        self.text_keys = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Validate every setting, returning the first violation found
    pub fn validate(&self) -> MemoryResult<()> {
        validate_similarity_threshold(self.similarity_threshold)?;
        validate_max_graph_nodes(self.max_graph_nodes)?;

        if self.traversal_depth == 0 {
            return Err(MemoryError::Config(
                "traversal_depth must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("baseline_importance", self.baseline_importance),
            ("mention_boost", self.mention_boost),
            ("relation_boost", self.relation_boost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MemoryError::Config(format!(
                    "{} must be a finite, non-negative number (got {})",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("summary_entity_limit", self.summary_entity_limit),
            ("summary_relation_limit", self.summary_relation_limit),
            ("entity_info_limit", self.entity_info_limit),
        ] {
            if value == 0 {
                return Err(MemoryError::Config(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }
}

/// Reject thresholds outside [0, 1], NaN included
pub fn validate_similarity_threshold(threshold: f64) -> MemoryResult<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(MemoryError::Config(format!(
            "similarity_threshold must be within [0, 1] (got {})",
            threshold
        )))
    }
}

/// Reject a zero node ceiling; `None` means unbounded
pub fn validate_max_graph_nodes(max_nodes: Option<usize>) -> MemoryResult<()> {
    match max_nodes {
        Some(0) => Err(MemoryError::Config(
            "max_graph_nodes must be greater than 0".to_string(),
        )),
        _ => Ok(()),
    }
}
