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

//! Sessiongraph Memory
//!
//! A session-scoped knowledge graph memory for conversational agents:
//! - **Extraction**: turns each conversational turn into candidate entities
//!   and relations (pluggable `Extractor`)
//! - **Resolution**: merges near-duplicate mentions under a similarity threshold
//! - **Capacity**: bounds each session graph, evicting least-valuable entities
//! - **Queries**: related entities, shortest paths, entity info, statistics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   KnowledgeGraphMemory                        │
//! │  save_context ──► Extractor ──► SimilarityResolver            │
//! │                                   │                           │
//! │                         SessionGraph upserts                  │
//! │                                   │                           │
//! │                           CapacityManager                     │
//! │                                                               │
//! │  load_memory_variables / queries ──► GraphQueryEngine         │
//! │                                        └──► GraphRenderer     │
//! │  ┌─────────────────────────────────────────────────────────┐ │
//! │  │ SessionRegistry: session id -> RwLock<SessionGraph>     │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use sessiongraph_memory::{KnowledgeGraphConfig, KnowledgeGraphMemory, TurnValues};
//! use serde_json::json;
//!
//! let memory = KnowledgeGraphMemory::new(KnowledgeGraphConfig::default()).unwrap();
//!
//! let inputs = TurnValues::from([("input".to_string(), json!("人名：张三 地点：北京"))]);
//! let outputs = TurnValues::from([("output".to_string(), json!("张三位于北京"))]);
//! memory.save_context("session-1", &inputs, &outputs);
//!
//! assert_eq!(memory.find_path("张三", "北京"), vec!["张三", "北京"]);
//! let vars = memory.load_memory_variables("session-1", &TurnValues::new());
//! assert!(vars.knowledge_graph.contains("张三"));
//! ```

pub mod capacity;
pub mod config;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod memory;
pub mod queries;
pub mod registry;
pub mod render;
pub mod similarity;

pub use capacity::CapacityManager;
pub use config::{KnowledgeGraphConfig, DEFAULT_SIMILARITY_THRESHOLD};
pub use entities::{
    normalize_name, Candidate, CandidateEntity, CandidateRelation, Entity, EntityId, EntityType,
    GraphStats, Relation, RelationType, Tick,
};
pub use error::{MemoryError, MemoryResult};
pub use extractor::{Extractor, PatternExtractor};
pub use graph::{ImportancePolicy, SessionGraph};
pub use memory::{
    KnowledgeGraphMemory, MemoryVariables, TurnValues, WriteOutcome, ENTITY_INFO_KEY,
    KNOWLEDGE_GRAPH_KEY,
};
pub use queries::{EntityInfo, GraphQueryEngine, RelatedEntity};
pub use registry::SessionRegistry;
pub use render::{GraphRenderer, NO_GRAPH_PLACEHOLDER};
pub use similarity::{name_similarity, Resolution, SimilarityResolver};
