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

//! Entity resolution
//!
//! Decides whether a mention refers to an entity already in a session graph.
//! Scoring is Jaccard similarity over character bigrams of normalized names,
//! which behaves the same for CJK text (no word boundaries) and for
//! space-separated languages.

use crate::entities::{normalize_name, CandidateEntity, Entity, EntityId, EntityType};
use crate::graph::SessionGraph;
use std::collections::HashSet;

/// Outcome of resolving a candidate against a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The candidate refers to this existing entity
    Existing(EntityId),
    /// No entity matched; the candidate should be inserted
    New,
}

/// Character bigrams of an already-normalized name
fn bigrams(normalized: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = normalized.chars().collect();
    match chars.len() {
        0 => HashSet::new(),
        1 => std::iter::once((chars[0], '\0')).collect(),
        _ => chars.windows(2).map(|w| (w[0], w[1])).collect(),
    }
}

/// Similarity in [0, 1] between two names
///
/// Identical normalized names score 1.0, two empty names score 0.0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_grams = bigrams(&a);
    let b_grams = bigrams(&b);
    let union = a_grams.union(&b_grams).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a_grams.intersection(&b_grams).count();
    intersection as f64 / union as f64
}

/// Resolves mentions to entity ids under a similarity threshold
#[derive(Debug, Clone, Copy)]
pub struct SimilarityResolver {
    threshold: f64,
}

impl SimilarityResolver {
    /// Create a resolver; the threshold is validated by the configuration layer
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolve a typed candidate against entities of the same type
    ///
    /// An identical normalized name and type always matches. Otherwise the
    /// highest-scoring entity at or above the threshold wins, ties going to
    /// the most recently seen.
    pub fn resolve(&self, candidate: &CandidateEntity, graph: &SessionGraph) -> Resolution {
        let exact = EntityId::derive(&candidate.name, candidate.entity_type);
        if graph.contains(&exact) {
            return Resolution::Existing(exact);
        }

        self.best_match(&candidate.name, graph, Some(candidate.entity_type))
            .map(Resolution::Existing)
            .unwrap_or(Resolution::New)
    }

    /// Resolve a bare name against entities of any type
    ///
    /// Exact normalized-name matches win (most recently seen, then most
    /// important); otherwise the best similarity match above threshold.
    pub fn resolve_name(&self, name: &str, graph: &SessionGraph) -> Option<EntityId> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return None;
        }

        let exact = graph
            .entities()
            .filter(|e| normalize_name(&e.name) == normalized)
            .max_by(|a, b| {
                a.last_seen
                    .cmp(&b.last_seen)
                    .then(a.importance.total_cmp(&b.importance))
                    .then(b.id.cmp(&a.id))
            });
        if let Some(entity) = exact {
            return Some(entity.id.clone());
        }

        self.best_match(name, graph, None)
    }

    fn best_match(
        &self,
        name: &str,
        graph: &SessionGraph,
        entity_type: Option<EntityType>,
    ) -> Option<EntityId> {
        let mut best: Option<(f64, &Entity)> = None;

        for entity in graph.entities() {
            if entity_type.is_some_and(|t| t != entity.entity_type) {
                continue;
            }
            let score = name_similarity(name, &entity.name);
            if score < self.threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_score, best_entity)) => {
                    score > best_score
                        || (score == best_score
                            && (entity.last_seen, &best_entity.id)
                                > (best_entity.last_seen, &entity.id))
                }
            };
            if better {
                best = Some((score, entity));
            }
        }

        best.map(|(_, entity)| entity.id.clone())
    }
}
