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

//! Session Knowledge Graph
//!
//! The per-session graph data structure storing entities and relations.
//! Relations are stored once, keyed by `(source, target, type)`, and indexed
//! by adjacency sets in both directions so undirected traversal is cheap.
//!
//! A `SessionGraph` is plain data: it does no locking of its own. The
//! session registry wraps each graph in a reader/writer lock.

use crate::config::KnowledgeGraphConfig;
use crate::entities::{
    CandidateEntity, Entity, EntityId, GraphStats, Relation, RelationKey, RelationType, Tick,
};
use crate::similarity::{Resolution, SimilarityResolver};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How importance is assigned and grown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportancePolicy {
    /// Importance of a newly inserted entity
    pub baseline: f64,
    /// Added per repeated mention
    pub mention_boost: f64,
    /// Added to both endpoints per relation observation
    pub relation_boost: f64,
}

impl Default for ImportancePolicy {
    fn default() -> Self {
        Self::from(&KnowledgeGraphConfig::default())
    }
}

impl From<&KnowledgeGraphConfig> for ImportancePolicy {
    fn from(config: &KnowledgeGraphConfig) -> Self {
        Self {
            baseline: config.baseline_importance,
            mention_boost: config.mention_boost,
            relation_boost: config.relation_boost,
        }
    }
}

/// Result of upserting one entity mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedEntity {
    pub id: EntityId,
    /// True when a new entity was inserted, false when merged
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
struct Adjacency {
    outgoing: BTreeSet<RelationKey>,
    incoming: BTreeSet<RelationKey>,
}

/// Knowledge graph for one conversation session
#[derive(Debug, Clone)]
pub struct SessionGraph {
    /// Entity storage (ID -> Entity)
    entities: HashMap<EntityId, Entity>,
    /// Relation storage (key -> Relation)
    relations: HashMap<RelationKey, Relation>,
    /// Outgoing and incoming relation keys per entity
    adjacency: HashMap<EntityId, Adjacency>,
    policy: ImportancePolicy,
    /// Entity ceiling enforced by the capacity manager (None = unbounded)
    max_nodes: Option<usize>,
    clock: Tick,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionGraph {
    /// Create an empty graph
    pub fn new(policy: ImportancePolicy, max_nodes: Option<usize>) -> Self {
        let now = Utc::now();
        Self {
            entities: HashMap::new(),
            relations: HashMap::new(),
            adjacency: HashMap::new(),
            policy,
            max_nodes,
            clock: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the logical clock for a new write and return the new tick
    pub fn begin_turn(&mut self) -> Tick {
        self.clock += 1;
        self.updated_at = Utc::now();
        self.clock
    }

    /// Current logical time
    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn max_nodes(&self) -> Option<usize> {
        self.max_nodes
    }

    pub fn set_max_nodes(&mut self, max_nodes: Option<usize>) {
        self.max_nodes = max_nodes;
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of directed relations
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Get entity by ID
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// All entities, in no particular order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All relations, in no particular order
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Relations touching an entity in either direction, outgoing first
    pub fn relations_of<'a>(&'a self, id: &EntityId) -> impl Iterator<Item = &'a Relation> + 'a {
        self.adjacency
            .get(id)
            .into_iter()
            .flat_map(|adj| adj.outgoing.iter().chain(adj.incoming.iter()))
            .filter_map(|key| self.relations.get(key))
    }

    /// Number of relations touching an entity
    pub fn degree(&self, id: &EntityId) -> usize {
        self.adjacency
            .get(id)
            .map(|adj| adj.outgoing.len() + adj.incoming.len())
            .unwrap_or(0)
    }

    /// Undirected neighbours with the summed weight of every relation
    /// connecting them, ordered by id
    pub fn neighbors(&self, id: &EntityId) -> Vec<(EntityId, u64)> {
        let mut weights: BTreeMap<EntityId, u64> = BTreeMap::new();
        for relation in self.relations_of(id) {
            if let Some(other) = relation.other_end(id) {
                *weights.entry(other.clone()).or_default() += relation.weight;
            }
        }
        weights.into_iter().collect()
    }

    /// Merge a mention into a matching entity or insert a new one
    ///
    /// Repeat mentions within the same turn resolve to the entity without
    /// counting again. Returns `None` for a blank name.
    pub fn upsert_entity(
        &mut self,
        candidate: &CandidateEntity,
        resolver: &SimilarityResolver,
    ) -> Option<UpsertedEntity> {
        let name = candidate.name.trim();
        if name.is_empty() {
            return None;
        }

        let resolution = {
            let graph: &SessionGraph = self;
            if candidate.type_inferred {
                resolver
                    .resolve_name(name, graph)
                    .map(Resolution::Existing)
                    .unwrap_or_else(|| resolver.resolve(candidate, graph))
            } else {
                resolver.resolve(candidate, graph)
            }
        };

        match resolution {
            Resolution::Existing(id) => {
                let entity = self.entities.get_mut(&id)?;
                // At most one mention per entity per turn
                if entity.last_seen != self.clock {
                    entity.mention_count += 1;
                    entity.importance += self.policy.mention_boost;
                    entity.last_seen = self.clock;
                }
                Some(UpsertedEntity { id, created: false })
            }
            Resolution::New => {
                let id = EntityId::derive(name, candidate.entity_type);
                let entity = Entity {
                    id: id.clone(),
                    name: name.to_string(),
                    entity_type: candidate.entity_type,
                    importance: self.policy.baseline,
                    mention_count: 1,
                    first_seen: self.clock,
                    last_seen: self.clock,
                };
                self.entities.insert(id.clone(), entity);
                self.adjacency.entry(id.clone()).or_default();
                Some(UpsertedEntity { id, created: true })
            }
        }
    }

    /// Record a directed relation between two existing entities
    ///
    /// Repeated triples increment the weight. Unknown endpoints and
    /// self-loops are ignored and return `false`.
    pub fn upsert_relation(
        &mut self,
        source: &EntityId,
        target: &EntityId,
        relation_type: RelationType,
    ) -> bool {
        if source == target || !self.contains(source) || !self.contains(target) {
            return false;
        }

        let key = RelationKey {
            source: source.clone(),
            target: target.clone(),
            relation_type,
        };
        let clock = self.clock;

        match self.relations.get_mut(&key) {
            Some(relation) => {
                relation.weight += 1;
                relation.last_seen = clock;
            }
            None => {
                self.relations.insert(
                    key.clone(),
                    Relation {
                        source: source.clone(),
                        target: target.clone(),
                        relation_type,
                        weight: 1,
                        last_seen: clock,
                    },
                );
                self.adjacency
                    .entry(source.clone())
                    .or_default()
                    .outgoing
                    .insert(key.clone());
                self.adjacency
                    .entry(target.clone())
                    .or_default()
                    .incoming
                    .insert(key);
            }
        }

        let boost = self.policy.relation_boost;
        for id in [source, target] {
            if let Some(entity) = self.entities.get_mut(id) {
                entity.importance += boost;
                entity.last_seen = clock;
            }
        }

        true
    }

    /// Remove an entity together with every relation referencing it
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;

        if let Some(adj) = self.adjacency.remove(id) {
            for key in adj.outgoing.into_iter().chain(adj.incoming) {
                self.relations.remove(&key);
                let other = if &key.source == id {
                    &key.target
                } else {
                    &key.source
                };
                if let Some(other_adj) = self.adjacency.get_mut(other) {
                    other_adj.outgoing.remove(&key);
                    other_adj.incoming.remove(&key);
                }
            }
        }

        Some(entity)
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        let total_entities = self.entities.len();
        let total_relations = self.relations.len();

        let mut type_distribution: HashMap<String, usize> = HashMap::new();
        for entity in self.entities.values() {
            *type_distribution
                .entry(entity.entity_type.to_string())
                .or_default() += 1;
        }

        let mut relation_type_distribution: HashMap<String, usize> = HashMap::new();
        for relation in self.relations.values() {
            *relation_type_distribution
                .entry(relation.relation_type.to_string())
                .or_default() += 1;
        }

        let avg_degree = if total_entities > 0 {
            (2 * total_relations) as f64 / total_entities as f64
        } else {
            0.0
        };

        GraphStats {
            total_entities,
            total_relations,
            type_distribution,
            relation_type_distribution,
            avg_degree,
        }
    }
}
