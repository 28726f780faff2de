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

//! Knowledge graph memory
//!
//! The public entry point. Writes run extraction, resolution, store updates
//! and capacity enforcement as one transaction per turn; reads borrow a
//! session graph under a shared lock and render prompt-ready text.

use crate::capacity::CapacityManager;
use crate::config::{validate_max_graph_nodes, validate_similarity_threshold, KnowledgeGraphConfig};
use crate::entities::{normalize_name, Candidate, EntityId, EntityType, GraphStats, RelationType};
use crate::error::MemoryResult;
use crate::extractor::{Extractor, PatternExtractor};
use crate::graph::{ImportancePolicy, SessionGraph};
use crate::queries::{EntityInfo, GraphQueryEngine, RelatedEntity};
use crate::registry::SessionRegistry;
use crate::render::{GraphRenderer, NO_GRAPH_PLACEHOLDER};
use crate::similarity::SimilarityResolver;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the graph summary variable
pub const KNOWLEDGE_GRAPH_KEY: &str = "knowledge_graph";
/// Name of the query-focused entity variable
pub const ENTITY_INFO_KEY: &str = "entity_info";

/// Inputs, outputs and queries exchanged with the conversational framework
pub type TurnValues = HashMap<String, Value>;

/// What one `save_context` call changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Entity mentions applied (merged or inserted)
    pub entities_upserted: usize,
    /// Entities newly inserted
    pub entities_created: usize,
    /// Relation observations applied
    pub relations_upserted: usize,
    /// Names of entities evicted by capacity enforcement
    pub evicted: Vec<String>,
}

/// Prompt variables produced by `load_memory_variables`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryVariables {
    pub knowledge_graph: String,
    pub entity_info: String,
}

impl MemoryVariables {
    fn empty() -> Self {
        Self {
            knowledge_graph: NO_GRAPH_PLACEHOLDER.to_string(),
            entity_info: String::new(),
        }
    }

    /// Variables keyed by their names
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (KNOWLEDGE_GRAPH_KEY.to_string(), self.knowledge_graph.clone()),
            (ENTITY_INFO_KEY.to_string(), self.entity_info.clone()),
        ])
    }
}

/// Session-scoped knowledge graph memory
pub struct KnowledgeGraphMemory {
    config: RwLock<KnowledgeGraphConfig>,
    registry: SessionRegistry,
    extractor: Arc<dyn Extractor>,
    capacity: CapacityManager,
}

impl KnowledgeGraphMemory {
    /// Create a memory using the built-in pattern extractor
    pub fn new(config: KnowledgeGraphConfig) -> MemoryResult<Self> {
        Self::with_extractor(config, PatternExtractor::new())
    }

    /// Create a memory with a custom extractor
    pub fn with_extractor(
        config: KnowledgeGraphConfig,
        extractor: impl Extractor + 'static,
    ) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            registry: SessionRegistry::new(),
            extractor: Arc::new(extractor),
            capacity: CapacityManager::new(),
        })
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> KnowledgeGraphConfig {
        self.config.read().clone()
    }

    /// Change the merge threshold used by later writes and queries
    pub fn set_similarity_threshold(&self, threshold: f64) -> MemoryResult<()> {
        validate_similarity_threshold(threshold)?;
        self.config.write().similarity_threshold = threshold;
        Ok(())
    }

    /// Change the node ceiling; live graphs are trimmed to the new ceiling
    pub fn set_max_graph_nodes(&self, max_nodes: Option<usize>) -> MemoryResult<()> {
        validate_max_graph_nodes(max_nodes)?;
        self.config.write().max_graph_nodes = max_nodes;

        let capacity = self.capacity;
        self.registry.write_all(|session_id, graph| {
            graph.set_max_nodes(max_nodes);
            let evicted = capacity.enforce(graph);
            if !evicted.is_empty() {
                debug!(
                    "Session {} trimmed by {} entities after ceiling change",
                    session_id,
                    evicted.len()
                );
            }
        });
        Ok(())
    }

    /// Variable names returned by `load_memory_variables`
    pub fn memory_variables(&self) -> Vec<String> {
        vec![KNOWLEDGE_GRAPH_KEY.to_string(), ENTITY_INFO_KEY.to_string()]
    }

    /// The fixed entity type vocabulary
    pub fn entity_types(&self) -> &'static [EntityType] {
        &EntityType::ALL
    }

    /// The fixed relation type vocabulary
    pub fn relation_types(&self) -> &'static [RelationType] {
        &RelationType::ALL
    }

    /// Ids of sessions that currently hold a graph
    pub fn session_ids(&self) -> Vec<String> {
        self.registry.session_ids()
    }

    /// Extract knowledge from one turn and merge it into the session graph
    ///
    /// Extractor failures are logged and leave the graph untouched. A turn
    /// with nothing to extract does not create a graph.
    pub fn save_context(
        &self,
        session_id: &str,
        inputs: &TurnValues,
        outputs: &TurnValues,
    ) -> WriteOutcome {
        let config = self.config();
        let text = turn_text(&[inputs, outputs], &config.text_keys);

        let candidates = match self.extractor.extract(&text) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Dropping turn for session {}: {}", session_id, e);
                return WriteOutcome::default();
            }
        };
        if candidates.is_empty() {
            return WriteOutcome::default();
        }

        let resolver = SimilarityResolver::new(config.similarity_threshold);
        let policy = ImportancePolicy::from(&config);
        let max_nodes = config.max_graph_nodes;

        let outcome = self.registry.write(
            session_id,
            || SessionGraph::new(policy, max_nodes),
            |graph| self.apply_turn(graph, &candidates, &resolver),
        );

        debug!(
            "Applied turn to session {}: {} entities ({} new), {} relations, {} evicted",
            session_id,
            outcome.entities_upserted,
            outcome.entities_created,
            outcome.relations_upserted,
            outcome.evicted.len()
        );
        outcome
    }

    /// Apply extracted candidates under the session's write lock
    fn apply_turn(
        &self,
        graph: &mut SessionGraph,
        candidates: &[Candidate],
        resolver: &SimilarityResolver,
    ) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        graph.begin_turn();

        // Names seen this turn resolve to whatever their mention resolved to
        let mut turn_ids: HashMap<String, EntityId> = HashMap::new();
        for candidate in candidates {
            if let Candidate::Entity(entity) = candidate {
                if let Some(upserted) = graph.upsert_entity(entity, resolver) {
                    outcome.entities_upserted += 1;
                    if upserted.created {
                        outcome.entities_created += 1;
                    }
                    turn_ids.insert(normalize_name(&entity.name), upserted.id);
                }
            }
        }

        for candidate in candidates {
            if let Candidate::Relation(relation) = candidate {
                let endpoint = |name: &str| {
                    turn_ids
                        .get(&normalize_name(name))
                        .cloned()
                        .or_else(|| resolver.resolve_name(name, graph))
                };
                let (Some(source), Some(target)) =
                    (endpoint(relation.source.as_str()), endpoint(relation.target.as_str()))
                else {
                    continue;
                };
                if graph.upsert_relation(&source, &target, relation.relation_type) {
                    outcome.relations_upserted += 1;
                }
            }
        }

        outcome.evicted = self
            .capacity
            .enforce(graph)
            .into_iter()
            .map(|e| e.name)
            .collect();
        outcome
    }

    /// Render the session graph and query-relevant entity info
    ///
    /// A session without a graph yields the fixed placeholder.
    pub fn load_memory_variables(&self, session_id: &str, query: &TurnValues) -> MemoryVariables {
        let config = self.config();
        let query_text = turn_text(&[query], &config.text_keys);

        // Extraction happens outside the lock; a failure only loses the hints
        let hinted: Vec<String> = match self.extractor.extract(&query_text) {
            Ok(candidates) => candidates
                .into_iter()
                .filter_map(|c| match c {
                    Candidate::Entity(e) => Some(e.name),
                    Candidate::Relation(_) => None,
                })
                .collect(),
            Err(e) => {
                warn!("Query extraction failed for session {}: {}", session_id, e);
                Vec::new()
            }
        };

        let resolver = SimilarityResolver::new(config.similarity_threshold);
        let renderer =
            GraphRenderer::new(config.summary_entity_limit, config.summary_relation_limit);

        self.registry
            .read(session_id, |graph| {
                let engine = GraphQueryEngine::new(graph, resolver);
                let infos = focused_entities(graph, &engine, &query_text, &hinted)
                    .into_iter()
                    .take(config.entity_info_limit)
                    .filter_map(|id| graph.entity(&id).map(|e| engine.describe(e)))
                    .collect::<Vec<_>>();
                MemoryVariables {
                    knowledge_graph: renderer.summary(graph),
                    entity_info: renderer.entity_info(&infos),
                }
            })
            .unwrap_or_else(MemoryVariables::empty)
    }

    /// Names related to `name` in the most recently updated session that knows it
    pub fn get_related_entities(&self, name: &str, limit: usize) -> Vec<String> {
        let config = self.config();
        let resolver = SimilarityResolver::new(config.similarity_threshold);
        for (_, graph) in self.registry.by_recency() {
            let graph = graph.read();
            let engine = GraphQueryEngine::new(&graph, resolver);
            if engine.resolve(name).is_some() {
                return engine
                    .related_entities(name, limit, config.traversal_depth)
                    .into_iter()
                    .map(|r| r.name)
                    .collect();
            }
        }
        Vec::new()
    }

    /// Related entities within one session
    pub fn related_entities_in(
        &self,
        session_id: &str,
        name: &str,
        limit: usize,
    ) -> Vec<RelatedEntity> {
        let config = self.config();
        let resolver = SimilarityResolver::new(config.similarity_threshold);
        self.registry
            .read(session_id, |graph| {
                GraphQueryEngine::new(graph, resolver).related_entities(
                    name,
                    limit,
                    config.traversal_depth,
                )
            })
            .unwrap_or_default()
    }

    /// Key-value info for `name` from the most recently updated session that
    /// knows it; empty when unresolved
    pub fn get_entity_info(&self, name: &str) -> Map<String, Value> {
        let resolver = self.resolver();
        for (_, graph) in self.registry.by_recency() {
            let graph = graph.read();
            if let Some(info) = GraphQueryEngine::new(&graph, resolver).entity_info(name) {
                return info.to_map();
            }
        }
        Map::new()
    }

    /// Entity info within one session
    pub fn entity_info_in(&self, session_id: &str, name: &str) -> Option<EntityInfo> {
        let resolver = self.resolver();
        self.registry
            .read(session_id, |graph| {
                GraphQueryEngine::new(graph, resolver).entity_info(name)
            })
            .flatten()
    }

    /// Shortest path between two names in the most recently updated session
    /// where both resolve; empty when none
    pub fn find_path(&self, from: &str, to: &str) -> Vec<String> {
        let resolver = self.resolver();
        for (_, graph) in self.registry.by_recency() {
            let graph = graph.read();
            let engine = GraphQueryEngine::new(&graph, resolver);
            if engine.resolve(from).is_some() && engine.resolve(to).is_some() {
                return engine.find_path(from, to);
            }
        }
        Vec::new()
    }

    /// Shortest path within one session
    pub fn find_path_in(&self, session_id: &str, from: &str, to: &str) -> Vec<String> {
        let resolver = self.resolver();
        self.registry
            .read(session_id, |graph| {
                GraphQueryEngine::new(graph, resolver).find_path(from, to)
            })
            .unwrap_or_default()
    }

    /// Statistics for one session; `None` if it has no graph
    pub fn graph_stats(&self, session_id: &str) -> Option<GraphStats> {
        self.registry.read(session_id, |graph| graph.stats())
    }

    /// Key-value statistics for one session; empty if it has no graph
    pub fn get_graph_stats(&self, session_id: &str) -> Map<String, Value> {
        let Some(stats) = self.graph_stats(session_id) else {
            return Map::new();
        };

        let counts = |distribution: HashMap<String, usize>| -> Value {
            Value::Object(
                distribution
                    .into_iter()
                    .map(|(label, count)| (label, Value::from(count)))
                    .collect(),
            )
        };

        let mut map = Map::new();
        map.insert("total_entities".into(), Value::from(stats.total_entities));
        map.insert("total_relations".into(), Value::from(stats.total_relations));
        map.insert("type_distribution".into(), counts(stats.type_distribution));
        map.insert(
            "relation_type_distribution".into(),
            counts(stats.relation_type_distribution),
        );
        map.insert("avg_degree".into(), Value::from(stats.avg_degree));
        map
    }

    /// Drop one session's graph, or every graph when `session_id` is `None`
    pub fn clear(&self, session_id: Option<&str>) {
        match session_id {
            Some(id) => {
                self.registry.remove(id);
            }
            None => {
                self.registry.clear_all();
            }
        }
    }

    fn resolver(&self) -> SimilarityResolver {
        SimilarityResolver::new(self.config.read().similarity_threshold)
    }
}

/// Concatenate the text-bearing values of a turn, keys in sorted order
fn turn_text(maps: &[&TurnValues], text_keys: &[String]) -> String {
    let mut parts = Vec::new();
    for map in maps {
        let mut keys: Vec<&String> = map
            .keys()
            .filter(|k| text_keys.is_empty() || text_keys.contains(*k))
            .collect();
        keys.sort();
        for key in keys {
            match &map[key] {
                Value::Null => {}
                Value::String(s) => parts.push(s.clone()),
                other => parts.push(other.to_string()),
            }
        }
    }
    parts.join("\n")
}

/// Entities the query mentions by name or that extraction found in it,
/// most important first
fn focused_entities(
    graph: &SessionGraph,
    engine: &GraphQueryEngine<'_>,
    query_text: &str,
    hinted: &[String],
) -> Vec<EntityId> {
    let normalized_query = normalize_name(query_text);
    if normalized_query.is_empty() {
        return Vec::new();
    }

    let mut ids: Vec<EntityId> = graph
        .entities()
        .filter(|e| mentions(&normalized_query, &normalize_name(&e.name)))
        .map(|e| e.id.clone())
        .collect();
    for name in hinted {
        if let Some(entity) = engine.resolve(name) {
            ids.push(entity.id.clone());
        }
    }

    ids.sort();
    ids.dedup();
    ids.sort_by(|a, b| {
        let (ea, eb) = (graph.entity(a), graph.entity(b));
        let ia = ea.map(|e| e.importance).unwrap_or(0.0);
        let ib = eb.map(|e| e.importance).unwrap_or(0.0);
        ib.total_cmp(&ia).then(a.cmp(b))
    });
    ids
}

/// Whether `query` names `name` as a whole word
///
/// Latin edges need a non-alphanumeric neighbour; a one-character name
/// must stand alone in any script.
fn mentions(query: &str, name: &str) -> bool {
    let (Some(first), Some(last)) = (name.chars().next(), name.chars().last()) else {
        return false;
    };
    let single = name.chars().nth(1).is_none();
    let separated = |neighbour: Option<char>, edge: char| match neighbour {
        None => true,
        Some(c) if single => !c.is_alphanumeric(),
        Some(c) => !(edge.is_ascii_alphanumeric() && c.is_ascii_alphanumeric()),
    };

    query.match_indices(name).any(|(start, matched)| {
        let before = query[..start].chars().next_back();
        let after = query[start + matched.len()..].chars().next();
        separated(before, first) && separated(after, last)
    })
}
