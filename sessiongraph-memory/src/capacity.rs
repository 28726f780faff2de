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

//! Capacity enforcement
//!
//! Runs after every write. When a graph holds more entities than its ceiling,
//! the least valuable entities are evicted: lowest importance first, ties
//! broken by oldest `last_seen`, then by id.

use crate::entities::{Entity, EntityId};
use crate::graph::SessionGraph;
use tracing::info;

/// Least-value eviction policy
#[derive(Debug, Default, Clone, Copy)]
pub struct CapacityManager;

impl CapacityManager {
    pub fn new() -> Self {
        Self
    }

    /// Evict until the graph is within its ceiling, returning evicted entities
    /// in eviction order
    pub fn enforce(&self, graph: &mut SessionGraph) -> Vec<Entity> {
        let Some(max_nodes) = graph.max_nodes() else {
            return Vec::new();
        };
        if graph.len() <= max_nodes {
            return Vec::new();
        }

        // Importance never changes during eviction, so one ordering suffices
        let overflow = graph.len() - max_nodes;
        let victims = eviction_order(graph)
            .into_iter()
            .take(overflow)
            .collect::<Vec<_>>();

        let evicted: Vec<Entity> = victims
            .iter()
            .filter_map(|id| graph.remove_entity(id))
            .collect();

        info!(
            "Evicted {} entities to respect max_graph_nodes={} ({} remain)",
            evicted.len(),
            max_nodes,
            graph.len()
        );

        evicted
    }
}

/// Entity ids from least to most valuable
fn eviction_order(graph: &SessionGraph) -> Vec<EntityId> {
    let mut entities: Vec<&Entity> = graph.entities().collect();
    entities.sort_by(|a, b| {
        a.importance
            .total_cmp(&b.importance)
            .then(a.last_seen.cmp(&b.last_seen))
            .then(a.id.cmp(&b.id))
    });
    entities.into_iter().map(|e| e.id.clone()).collect()
}
