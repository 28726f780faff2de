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

//! Prompt rendering
//!
//! Renders a session graph into the plain-text variables injected into a
//! prompt: a bounded summary of the graph and focused info on entities the
//! current query mentions.

use crate::entities::{Entity, EntityId, Relation};
use crate::graph::SessionGraph;
use crate::queries::EntityInfo;

/// Text used for `knowledge_graph` when a session has no graph
pub const NO_GRAPH_PLACEHOLDER: &str = "No knowledge graph data available.";

/// Renders graphs within fixed listing limits
#[derive(Debug, Clone, Copy)]
pub struct GraphRenderer {
    entity_limit: usize,
    relation_limit: usize,
}

impl GraphRenderer {
    pub fn new(entity_limit: usize, relation_limit: usize) -> Self {
        Self {
            entity_limit,
            relation_limit,
        }
    }

    /// Summary of the most important entities and strongest relations
    pub fn summary(&self, graph: &SessionGraph) -> String {
        if graph.is_empty() {
            return NO_GRAPH_PLACEHOLDER.to_string();
        }

        let mut content = format!(
            "## Knowledge Graph\n\n{} entities, {} relations\n",
            graph.len(),
            graph.relation_count()
        );

        let mut entities: Vec<&Entity> = graph.entities().collect();
        entities.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then(b.last_seen.cmp(&a.last_seen))
                .then(a.id.cmp(&b.id))
        });

        content.push_str("\n### Entities\n\n");
        for entity in entities.iter().take(self.entity_limit) {
            content.push_str(&format!(
                "- {} ({}, importance {:.2}, mentions {})\n",
                entity.name, entity.entity_type, entity.importance, entity.mention_count
            ));
        }

        let mut relations: Vec<&Relation> = graph.relations().collect();
        if !relations.is_empty() {
            relations.sort_by(|a, b| {
                b.weight
                    .cmp(&a.weight)
                    .then(b.last_seen.cmp(&a.last_seen))
                    .then(a.key().cmp(&b.key()))
            });

            content.push_str("\n### Relations\n\n");
            for relation in relations.iter().take(self.relation_limit) {
                content.push_str(&format!(
                    "- {} -[{}]-> {} (x{})\n",
                    display_name(graph, &relation.source),
                    relation.relation_type,
                    display_name(graph, &relation.target),
                    relation.weight
                ));
            }
        }

        content
    }

    /// Focused description of a few entities
    pub fn entity_info(&self, infos: &[EntityInfo]) -> String {
        infos
            .iter()
            .map(|info| {
                let mut line = format!(
                    "{} ({}): mentioned {} times",
                    info.name, info.entity_type, info.mention_count
                );
                if !info.relations.is_empty() {
                    line.push_str(&format!("; related to {}", info.relations.join(", ")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn display_name<'a>(graph: &'a SessionGraph, id: &'a EntityId) -> &'a str {
    graph
        .entity(id)
        .map(|e| e.name.as_str())
        .unwrap_or(id.0.as_str())
}
