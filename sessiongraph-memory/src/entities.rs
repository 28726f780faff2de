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

//! Entity and Relationship Types
//!
//! Defines the core types stored in a session graph and the candidate
//! tuples produced by extraction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Logical timestamp, strictly increasing per applied turn within a graph
pub type Tick = u64;

/// Derived entity key: `"<type>:<normalized name>"`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Derive the key for a name and type
    pub fn derive(name: &str, entity_type: EntityType) -> Self {
        Self(format!("{}:{}", entity_type, normalize_name(name)))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity types in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Location,
    Organization,
    Concept,
    Skill,
    Technology,
    Other,
}

impl EntityType {
    /// Every entity type, in declaration order
    pub const ALL: [EntityType; 7] = [
        EntityType::Person,
        EntityType::Location,
        EntityType::Organization,
        EntityType::Concept,
        EntityType::Skill,
        EntityType::Technology,
        EntityType::Other,
    ];

    /// Parse an English or Chinese label; unknown labels map to `Other`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "person" | "people" | "name" | "人名" | "人物" | "人" => EntityType::Person,
            "location" | "place" | "地点" | "位置" | "地址" => EntityType::Location,
            "organization" | "organisation" | "org" | "company" | "组织" | "机构" | "公司" => {
                EntityType::Organization
            }
            "concept" | "idea" | "topic" | "概念" => EntityType::Concept,
            "skill" | "技能" => EntityType::Skill,
            "technology" | "tech" | "技术" => EntityType::Technology,
            _ => EntityType::Other,
        }
    }

    /// Lowercase label used in ids, stats and rendered text
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Location => "location",
            EntityType::Organization => "organization",
            EntityType::Concept => "concept",
            EntityType::Skill => "skill",
            EntityType::Technology => "technology",
            EntityType::Other => "other",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    /// A is located in B
    LocatedIn,
    /// A belongs to B
    BelongsTo,
    /// A works at B
    WorksAt,
    /// A uses B
    Uses,
    /// A knows B
    Knows,
    /// A is related to B (generic)
    RelatedTo,
}

impl RelationType {
    /// Every relation type, in declaration order
    pub const ALL: [RelationType; 6] = [
        RelationType::LocatedIn,
        RelationType::BelongsTo,
        RelationType::WorksAt,
        RelationType::Uses,
        RelationType::Knows,
        RelationType::RelatedTo,
    ];

    /// Parse a label; unknown labels map to `RelatedTo`
    pub fn parse(s: &str) -> Self {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect();
        match key.as_str() {
            "locatedin" | "in" | "位于" => RelationType::LocatedIn,
            "belongsto" | "partof" | "memberof" | "属于" => RelationType::BelongsTo,
            "worksat" | "worksfor" | "employedby" | "就职于" | "工作于" => RelationType::WorksAt,
            "uses" | "utilizes" | "使用" => RelationType::Uses,
            "knows" | "认识" => RelationType::Knows,
            _ => RelationType::RelatedTo,
        }
    }

    /// camelCase label used in stats and rendered text
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::LocatedIn => "locatedIn",
            RelationType::BelongsTo => "belongsTo",
            RelationType::WorksAt => "worksAt",
            RelationType::Uses => "uses",
            RelationType::Knows => "knows",
            RelationType::RelatedTo => "relatedTo",
        }
    }

    /// Type implied for the target of this relation when nothing else labels it
    pub fn implied_target_type(&self) -> EntityType {
        match self {
            RelationType::LocatedIn => EntityType::Location,
            RelationType::BelongsTo | RelationType::WorksAt => EntityType::Organization,
            RelationType::Uses => EntityType::Technology,
            RelationType::Knows => EntityType::Person,
            RelationType::RelatedTo => EntityType::Other,
        }
    }

    /// Type implied for the source of this relation when nothing else labels it
    pub fn implied_source_type(&self) -> EntityType {
        match self {
            RelationType::WorksAt | RelationType::Knows => EntityType::Person,
            _ => EntityType::Other,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knowledge graph entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Derived key
    pub id: EntityId,
    /// Display name (first spelling seen)
    pub name: String,
    /// Entity type
    pub entity_type: EntityType,
    /// Value score used by eviction; only ever grows
    pub importance: f64,
    /// Number of mentions merged into this entity (>= 1)
    pub mention_count: u64,
    /// Logical time of the first mention
    pub first_seen: Tick,
    /// Logical time of the latest mention or relation
    pub last_seen: Tick,
}

/// A directed relation between two entities of the same graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: RelationType,
    /// Number of times this (source, target, type) triple was observed
    pub weight: u64,
    pub last_seen: Tick,
}

impl Relation {
    /// Identity of the relation within a graph
    pub fn key(&self) -> RelationKey {
        RelationKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation_type: self.relation_type,
        }
    }

    /// The endpoint opposite `id`, if `id` is an endpoint
    pub fn other_end(&self, id: &EntityId) -> Option<&EntityId> {
        if &self.source == id {
            Some(&self.target)
        } else if &self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Identity of a directed relation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: RelationType,
}

/// An entity mention produced by extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntity {
    pub name: String,
    pub entity_type: EntityType,
    /// The type was guessed from context (e.g. a relation endpoint), so an
    /// existing entity with the same name but another type is preferred
    #[serde(default)]
    pub type_inferred: bool,
}

impl CandidateEntity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            type_inferred: false,
        }
    }

    /// A mention whose type was guessed rather than stated
    pub fn inferred(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            type_inferred: true,
            ..Self::new(name, entity_type)
        }
    }
}

/// A relation mention produced by extraction, referring to entities by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRelation {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
}

impl CandidateRelation {
    pub fn new(
        source: impl Into<String>,
        relation_type: RelationType,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type,
        }
    }
}

/// One item of extractor output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Candidate {
    Entity(CandidateEntity),
    Relation(CandidateRelation),
}

impl Candidate {
    /// Shorthand for an entity candidate
    pub fn entity(name: impl Into<String>, entity_type: EntityType) -> Self {
        Candidate::Entity(CandidateEntity::new(name, entity_type))
    }

    /// Shorthand for a relation candidate
    pub fn relation(
        source: impl Into<String>,
        relation_type: RelationType,
        target: impl Into<String>,
    ) -> Self {
        Candidate::Relation(CandidateRelation::new(source, relation_type, target))
    }
}

/// Statistics about a session graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of entities
    pub total_entities: usize,
    /// Total number of directed relations
    pub total_relations: usize,
    /// Entity count per type label
    pub type_distribution: HashMap<String, usize>,
    /// Relation count per type label
    pub relation_type_distribution: HashMap<String, usize>,
    /// Average relations per entity
    pub avg_degree: f64,
}

/// Normalize a name for keying and comparison: trim, lowercase, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
