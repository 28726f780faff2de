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

//! Graph Query Engine
//!
//! Read-only queries over one session graph:
//! - "What is related to 张三?" (bounded-depth neighbourhood)
//! - "How is Alice connected to Paris?" (shortest undirected path)
//! - "What do we know about Rust?" (entity info)
//!
//! Every query resolves names the same way the write path does and returns
//! an empty result, never an error, when nothing resolves.

use crate::entities::{Entity, EntityId, EntityType, GraphStats, Tick};
use crate::graph::SessionGraph;
use crate::similarity::SimilarityResolver;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

/// A neighbour found by `related_entities`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub id: EntityId,
    pub name: String,
    pub entity_type: EntityType,
    /// Hops from the queried entity (>= 1)
    pub distance: usize,
    /// Strongest summed relation weight linking it to the previous hop
    pub weight: u64,
    pub importance: f64,
}

/// Description of one resolved entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub importance: f64,
    pub mention_count: u64,
    pub first_seen: Tick,
    pub last_seen: Tick,
    /// Neighbour names, strongest connection first
    pub relations: Vec<String>,
}

impl EntityInfo {
    /// Key-value form returned by the memory facade
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".into(), json!(self.name));
        map.insert("type".into(), json!(self.entity_type.as_str()));
        map.insert("importance".into(), json!(self.importance));
        map.insert("mentionCount".into(), json!(self.mention_count));
        map.insert("firstSeen".into(), json!(self.first_seen));
        map.insert("lastSeen".into(), json!(self.last_seen));
        map.insert("relations".into(), json!(self.relations));
        map
    }
}

/// Query engine borrowing a session graph for the duration of a read
pub struct GraphQueryEngine<'a> {
    graph: &'a SessionGraph,
    resolver: SimilarityResolver,
}

impl<'a> GraphQueryEngine<'a> {
    pub fn new(graph: &'a SessionGraph, resolver: SimilarityResolver) -> Self {
        Self { graph, resolver }
    }

    /// Resolve a bare name to an entity of this graph
    pub fn resolve(&self, name: &str) -> Option<&'a Entity> {
        let id = self.resolver.resolve_name(name, self.graph)?;
        self.graph.entity(&id)
    }

    /// Entities within `depth` hops of `name`, up to `limit`
    ///
    /// Ordered by hop distance, then relation weight (descending), then
    /// importance (descending), then name.
    pub fn related_entities(&self, name: &str, limit: usize, depth: usize) -> Vec<RelatedEntity> {
        let Some(root) = self.resolve(name) else {
            return Vec::new();
        };
        if limit == 0 || depth == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<EntityId> = HashSet::from([root.id.clone()]);
        let mut frontier: Vec<EntityId> = vec![root.id.clone()];
        let mut found: Vec<RelatedEntity> = Vec::new();

        for distance in 1..=depth {
            // Strongest link from the previous hop to each new entity
            let mut layer: HashMap<EntityId, u64> = HashMap::new();
            for id in &frontier {
                for (neighbor, weight) in self.graph.neighbors(id) {
                    if visited.contains(&neighbor) {
                        continue;
                    }
                    let best = layer.entry(neighbor).or_default();
                    *best = (*best).max(weight);
                }
            }
            if layer.is_empty() {
                break;
            }

            let mut next: Vec<RelatedEntity> = layer
                .into_iter()
                .filter_map(|(id, weight)| {
                    let entity = self.graph.entity(&id)?;
                    Some(RelatedEntity {
                        id,
                        name: entity.name.clone(),
                        entity_type: entity.entity_type,
                        distance,
                        weight,
                        importance: entity.importance,
                    })
                })
                .collect();
            next.sort_by(|a, b| {
                b.weight
                    .cmp(&a.weight)
                    .then(b.importance.total_cmp(&a.importance))
                    .then(a.name.cmp(&b.name))
                    .then(a.id.cmp(&b.id))
            });

            frontier = next.iter().map(|r| r.id.clone()).collect();
            visited.extend(frontier.iter().cloned());
            found.extend(next);

            if found.len() >= limit {
                break;
            }
        }

        found.truncate(limit);
        found
    }

    /// Shortest undirected path between two names, as display names
    ///
    /// Among equally short paths the one with the greatest total relation
    /// weight wins. Empty when either name is unresolved or no path exists.
    pub fn find_path(&self, from: &str, to: &str) -> Vec<String> {
        let (Some(source), Some(target)) = (self.resolve(from), self.resolve(to)) else {
            return Vec::new();
        };
        if source.id == target.id {
            return vec![source.name.clone()];
        }

        let mut distance: HashMap<EntityId, usize> = HashMap::from([(source.id.clone(), 0)]);
        // Best total weight reaching each entity along a shortest path, and its predecessor
        let mut best: HashMap<EntityId, (u64, Option<EntityId>)> =
            HashMap::from([(source.id.clone(), (0, None))]);
        let mut frontier: BTreeSet<EntityId> = BTreeSet::from([source.id.clone()]);
        let mut level = 0;

        while !frontier.is_empty() && !distance.contains_key(&target.id) {
            let mut next: BTreeSet<EntityId> = BTreeSet::new();
            for current in &frontier {
                let base = best.get(current).map(|(w, _)| *w).unwrap_or(0);
                for (neighbor, weight) in self.graph.neighbors(current) {
                    match distance.get(&neighbor) {
                        Some(d) if *d <= level => continue,
                        Some(_) => {}
                        None => {
                            distance.insert(neighbor.clone(), level + 1);
                            next.insert(neighbor.clone());
                        }
                    }
                    let total = base + weight;
                    let entry = best.entry(neighbor).or_insert((0, None));
                    if entry.1.is_none() || total > entry.0 {
                        *entry = (total, Some(current.clone()));
                    }
                }
            }
            frontier = next;
            level += 1;
        }

        if !distance.contains_key(&target.id) {
            return Vec::new();
        }

        let mut path = Vec::new();
        let mut cursor = Some(target.id.clone());
        while let Some(id) = cursor {
            let Some(entity) = self.graph.entity(&id) else {
                return Vec::new();
            };
            path.push(entity.name.clone());
            cursor = best.get(&id).and_then(|(_, prev)| prev.clone());
        }
        path.reverse();
        path
    }

    /// Info for the entity `name` resolves to
    pub fn entity_info(&self, name: &str) -> Option<EntityInfo> {
        let entity = self.resolve(name)?;
        Some(self.describe(entity))
    }

    /// Info for a known entity
    pub fn describe(&self, entity: &Entity) -> EntityInfo {
        let mut neighbors: Vec<(u64, &Entity)> = self
            .graph
            .neighbors(&entity.id)
            .into_iter()
            .filter_map(|(id, weight)| Some((weight, self.graph.entity(&id)?)))
            .collect();
        neighbors.sort_by(|(wa, a), (wb, b)| wb.cmp(wa).then(a.name.cmp(&b.name)));

        EntityInfo {
            name: entity.name.clone(),
            entity_type: entity.entity_type,
            importance: entity.importance,
            mention_count: entity.mention_count,
            first_seen: entity.first_seen,
            last_seen: entity.last_seen,
            relations: neighbors.into_iter().map(|(_, e)| e.name.clone()).collect(),
        }
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }
}
