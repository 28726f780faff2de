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

//! Candidate extraction
//!
//! Turns one conversational turn into candidate entities and relations.
//! The memory treats extraction as a pluggable boundary: any `Extractor`
//! (including a plain closure) can replace the default `PatternExtractor`,
//! e.g. an LLM-backed extractor or a test double.
//!
//! ## Patterns
//!
//! - Labelled mentions: `person: Alice`, `人名：张三`, `技术：Java`
//! - Relation phrases: `Alice located in Paris`, `张三位于北京`,
//!   `张三属于技术部`, `Bob works at Acme`, `Carol uses Rust`
//!
//! Relation endpoints that are not labelled elsewhere in the same text are
//! emitted as entities whose type is inferred from the relation.

use crate::entities::{
    normalize_name, Candidate, CandidateEntity, CandidateRelation, EntityType, RelationType,
};
use crate::error::MemoryResult;
use regex::Regex;
use std::collections::HashSet;

/// Source of candidate entities and relations for a turn
pub trait Extractor: Send + Sync {
    /// Extract candidates from the text of one turn, in text order
    ///
    /// Text with nothing recognisable yields an empty vector. An `Err`
    /// aborts the whole turn without touching the graph.
    fn extract(&self, text: &str) -> MemoryResult<Vec<Candidate>>;
}

impl<F> Extractor for F
where
    F: Fn(&str) -> MemoryResult<Vec<Candidate>> + Send + Sync,
{
    fn extract(&self, text: &str) -> MemoryResult<Vec<Candidate>> {
        self(text)
    }
}

/// Characters allowed in a single extracted name
const NAME: &str = r#"[^\s,，.。;；:：!！?？、()（）"“”'‘’]+"#;

/// Lexical pattern extractor for English and Chinese turns
pub struct PatternExtractor {
    label_re: Regex,
    relation_res: Vec<(Regex, RelationType)>,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        let label_re = Regex::new(&format!(
            r"(?i)(?:\b(person|people|location|place|organization|organisation|org|company|concept|topic|skill|technology|tech)\b|(人名|人物|地点|位置|地址|组织|机构|公司|概念|技能|技术))\s*[:：]\s*({NAME})"
        ))
        .expect("label pattern is valid");

        let relation_patterns: [(&str, RelationType); 10] = [
            (r"(?:is\s+|are\s+)?located\s+in", RelationType::LocatedIn),
            (r"belongs?\s+to", RelationType::BelongsTo),
            (r"works?\s+(?:at|for)", RelationType::WorksAt),
            (r"uses", RelationType::Uses),
            (r"knows", RelationType::Knows),
            ("位于", RelationType::LocatedIn),
            ("属于", RelationType::BelongsTo),
            ("(?:就职于|工作于)", RelationType::WorksAt),
            ("使用", RelationType::Uses),
            ("认识", RelationType::Knows),
        ];

        let relation_res = relation_patterns
            .iter()
            .map(|(phrase, relation_type)| {
                let pattern = if phrase.is_ascii() {
                    format!(r"(?i)({NAME})\s+{phrase}\s+({NAME})")
                } else {
                    // CJK phrases sit between names without spaces
                    format!(r"({NAME}?){phrase}\s*({NAME})")
                };
                let re = Regex::new(&pattern).expect("relation pattern is valid");
                (re, *relation_type)
            })
            .collect();

        Self {
            label_re,
            relation_res,
        }
    }

    /// Labelled mentions with their byte offsets
    fn labelled(&self, text: &str) -> Vec<(usize, CandidateEntity)> {
        self.label_re
            .captures_iter(text)
            .filter_map(|caps| {
                let label = caps.get(1).or_else(|| caps.get(2))?;
                let name = caps.get(3)?;
                Some((
                    label.start(),
                    CandidateEntity::new(name.as_str(), EntityType::parse(label.as_str())),
                ))
            })
            .collect()
    }

    /// Relation phrases with their byte offsets
    fn relations(&self, text: &str) -> Vec<(usize, CandidateRelation)> {
        let mut found = Vec::new();
        for (re, relation_type) in &self.relation_res {
            for caps in re.captures_iter(text) {
                let (Some(whole), Some(source), Some(target)) =
                    (caps.get(0), caps.get(1), caps.get(2))
                else {
                    continue;
                };
                if normalize_name(source.as_str()) == normalize_name(target.as_str()) {
                    continue;
                }
                found.push((
                    whole.start(),
                    CandidateRelation::new(source.as_str(), *relation_type, target.as_str()),
                ));
            }
        }
        found
    }
}

impl Extractor for PatternExtractor {
    fn extract(&self, text: &str) -> MemoryResult<Vec<Candidate>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let labelled = self.labelled(text);
        let relations = self.relations(text);

        let labelled_names: HashSet<String> = labelled
            .iter()
            .map(|(_, entity)| normalize_name(&entity.name))
            .collect();

        let mut ordered: Vec<(usize, usize, Candidate)> = Vec::new();
        for (offset, entity) in labelled {
            ordered.push((offset, 0, Candidate::Entity(entity)));
        }
        for (offset, relation) in relations {
            // Endpoints first so the relation can resolve them
            for (name, entity_type) in [
                (&relation.source, relation.relation_type.implied_source_type()),
                (&relation.target, relation.relation_type.implied_target_type()),
            ] {
                if !labelled_names.contains(&normalize_name(name)) {
                    ordered.push((
                        offset,
                        0,
                        Candidate::Entity(CandidateEntity::inferred(name.clone(), entity_type)),
                    ));
                }
            }
            ordered.push((offset, 1, Candidate::Relation(relation)));
        }

        // Stable sort keeps endpoint entities ahead of their relation
        ordered.sort_by_key(|(offset, rank, _)| (*offset, *rank));
        Ok(ordered.into_iter().map(|(_, _, c)| c).collect())
    }
}
