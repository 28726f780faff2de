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

//! Integration tests for the knowledge graph memory

use serde_json::json;
use sessiongraph_memory::{
    Candidate, EntityType, KnowledgeGraphConfig, KnowledgeGraphMemory, MemoryError,
    MemoryResult, RelationType, TurnValues, NO_GRAPH_PLACEHOLDER,
};

fn turn(text: &str) -> TurnValues {
    TurnValues::from([("input".to_string(), json!(text))])
}

fn none() -> TurnValues {
    TurnValues::new()
}

fn memory() -> KnowledgeGraphMemory {
    KnowledgeGraphMemory::new(KnowledgeGraphConfig::default()).unwrap()
}

/// Saving the same text twice counts mentions instead of duplicating entities
#[test]
fn test_idempotent_mention_counting() {
    let memory = memory();
    memory.save_context("s1", &turn("人名：张三 概念：人工智能"), &none());
    memory.save_context("s1", &turn("人名：张三 概念：人工智能"), &none());

    let stats = memory.get_graph_stats("s1");
    assert_eq!(stats["total_entities"], 2);

    let info = memory.get_entity_info("张三");
    assert_eq!(info["mentionCount"], 2);
    assert_eq!(info["type"], "person");
}

/// A name recurring within one turn still counts once per save
#[test]
fn test_recurring_name_counts_once_per_turn() {
    let memory = memory();
    let text = "张三位于北京 李四位于上海 张三属于技术部 李四属于技术部";
    memory.save_context("s1", &turn(text), &none());
    memory.save_context("s1", &turn(text), &none());

    for name in ["张三", "李四", "技术部", "北京"] {
        assert_eq!(memory.get_entity_info(name)["mentionCount"], 2, "{}", name);
    }
    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 5);
}

/// Similar concepts stay apart at threshold 0.3, exact repeats always merge
#[test]
fn test_similarity_merge() {
    let memory = memory();
    memory.set_similarity_threshold(0.3).unwrap();

    memory.save_context("s1", &turn("概念：机器学习"), &none());
    memory.save_context("s1", &turn("概念：机器视觉"), &none());
    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 2);

    memory.save_context("s1", &turn("概念：机器学习"), &none());
    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 2);
    assert_eq!(memory.get_entity_info("机器学习")["mentionCount"], 2);
}

/// A low threshold merges near-duplicates into the first spelling
#[test]
fn test_low_threshold_merges_variants() {
    let memory = memory();
    memory.set_similarity_threshold(0.2).unwrap();

    memory.save_context("s1", &turn("概念：机器学习"), &none());
    memory.save_context("s1", &turn("概念：机器视觉"), &none());

    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 1);
    assert_eq!(memory.get_entity_info("机器视觉")["name"], "机器学习");
}

/// Three distinct entities under a ceiling of two leave the least important out
#[test]
fn test_capacity_bound() {
    let memory = memory();
    memory.set_max_graph_nodes(Some(2)).unwrap();

    memory.save_context("s1", &turn("人名：张三"), &none());
    memory.save_context("s1", &turn("人名：张三 人名：李四"), &none());
    let outcome = memory.save_context("s1", &turn("人名：王五 人名：张三"), &none());

    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 2);
    // 李四 and 王五 tie on importance; 李四 was seen earlier
    assert_eq!(outcome.evicted, vec!["李四"]);
    assert!(memory.get_entity_info("李四").is_empty());
    assert!(!memory.get_entity_info("张三").is_empty());
}

/// Writes to one session never show up in another
#[test]
fn test_session_isolation() {
    let memory = memory();
    memory.save_context("s1", &turn("人名：张三 地点：北京"), &none());

    assert_eq!(memory.get_graph_stats("s1")["total_entities"], 2);
    assert!(memory.get_graph_stats("s2").is_empty());
    assert!(memory.find_path_in("s2", "张三", "北京").is_empty());
    assert!(memory.entity_info_in("s2", "张三").is_none());
    assert_eq!(
        memory.load_memory_variables("s2", &turn("张三")).knowledge_graph,
        NO_GRAPH_PLACEHOLDER
    );
}

/// Clearing one session or all of them empties their stats
#[test]
fn test_clear_semantics() {
    let memory = memory();
    memory.save_context("s1", &turn("人名：张三"), &none());
    memory.save_context("s2", &turn("人名：李四"), &none());
    memory.save_context("s3", &turn("人名：王五"), &none());

    memory.clear(Some("s1"));
    assert!(memory.get_graph_stats("s1").is_empty());
    assert_eq!(memory.get_graph_stats("s2")["total_entities"], 1);

    memory.clear(None);
    for session in ["s1", "s2", "s3"] {
        assert!(memory.get_graph_stats(session).is_empty());
    }
    assert!(memory.session_ids().is_empty());

    // A cleared session starts over on the next write
    memory.save_context("s1", &turn("人名：张三"), &none());
    assert_eq!(memory.get_entity_info("张三")["mentionCount"], 1);
}

/// Paths follow relations in either direction
#[test]
fn test_path_finding() {
    let extractor = |text: &str| -> MemoryResult<Vec<Candidate>> {
        Ok(match text {
            "ab" => vec![
                Candidate::entity("A", EntityType::Concept),
                Candidate::entity("B", EntityType::Concept),
                Candidate::relation("A", RelationType::RelatedTo, "B"),
            ],
            "bc" => vec![
                Candidate::entity("B", EntityType::Concept),
                Candidate::entity("C", EntityType::Concept),
                Candidate::relation("B", RelationType::RelatedTo, "C"),
            ],
            _ => Vec::new(),
        })
    };
    let memory =
        KnowledgeGraphMemory::with_extractor(KnowledgeGraphConfig::default(), extractor).unwrap();
    memory.save_context("s1", &turn("ab"), &none());
    memory.save_context("s1", &turn("bc"), &none());

    assert_eq!(memory.find_path("A", "C"), vec!["A", "B", "C"]);
    assert_eq!(memory.find_path("C", "A"), vec!["C", "B", "A"]);
    assert!(memory.find_path("A", "Z").is_empty());
    assert_eq!(memory.find_path_in("s1", "A", "C"), vec!["A", "B", "C"]);
}

/// Related entities come back strongest first
#[test]
fn test_related_entities() {
    let memory = memory();
    memory.save_context("s1", &turn("人名：张三 地点：北京 组织：技术部"), &none());
    memory.save_context("s1", &turn("张三位于北京 张三属于技术部"), &none());
    memory.save_context("s1", &turn("张三位于北京"), &none());

    assert_eq!(memory.get_related_entities("张三", 5), vec!["北京", "技术部"]);
    assert_eq!(memory.get_related_entities("张三", 1), vec!["北京"]);
    assert!(memory.get_related_entities("不存在", 5).is_empty());

    let related = memory.related_entities_in("s1", "北京", 5);
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].name, "张三");
    assert_eq!(related[0].weight, 2);
}

/// Name-only queries answer from the most recently updated session
#[test]
fn test_name_queries_prefer_recent_session() {
    let memory = memory();
    memory.save_context("old", &turn("人名：张三"), &none());
    std::thread::sleep(std::time::Duration::from_millis(5));
    memory.save_context("new", &turn("人名：张三"), &none());
    memory.save_context("new", &turn("人名：张三"), &none());

    assert_eq!(memory.get_entity_info("张三")["mentionCount"], 2);
    assert_eq!(
        memory.entity_info_in("old", "张三").map(|i| i.mention_count),
        Some(1)
    );
}

/// Stats carry counts and type distributions
#[test]
fn test_graph_stats() {
    let memory = memory();
    memory.save_context(
        "s1",
        &turn("人名：张三 人名：李四 地点：北京"),
        &turn("张三位于北京"),
    );

    let stats = memory.get_graph_stats("s1");
    assert_eq!(stats["total_entities"], 3);
    assert_eq!(stats["total_relations"], 1);
    assert_eq!(stats["type_distribution"]["person"], 2);
    assert_eq!(stats["type_distribution"]["location"], 1);
    assert_eq!(stats["relation_type_distribution"]["locatedIn"], 1);

    let typed = memory.graph_stats("s1").unwrap();
    assert!((typed.avg_degree - 2.0 / 3.0).abs() < 1e-9);
}

/// Memory variables describe the graph and the entities a query mentions
#[test]
fn test_memory_variables() {
    let memory = memory();
    assert_eq!(memory.memory_variables(), vec!["knowledge_graph", "entity_info"]);

    memory.save_context(
        "s1",
        &turn("人名：张三 技术：Rust"),
        &turn("张三 uses Rust"),
    );
    let vars = memory.load_memory_variables("s1", &turn("What does 张三 use?"));
    assert!(vars.knowledge_graph.contains("2 entities, 1 relations"));
    assert!(vars.knowledge_graph.contains("张三 -[uses]-> Rust (x1)"));
    assert_eq!(
        vars.entity_info,
        "张三 (person): mentioned 1 times; related to Rust"
    );

    let unrelated = memory.load_memory_variables("s1", &turn("weather"));
    assert_eq!(unrelated.entity_info, "");
}

/// Invalid settings fail eagerly and leave the configuration unchanged
#[test]
fn test_configuration_errors() {
    let memory = memory();
    assert!(matches!(
        memory.set_similarity_threshold(1.01),
        Err(MemoryError::Config(_))
    ));
    assert!(matches!(
        memory.set_max_graph_nodes(Some(0)),
        Err(MemoryError::Config(_))
    ));
    assert_eq!(memory.config(), KnowledgeGraphConfig::default());

    assert!(memory.set_max_graph_nodes(None).is_ok());
    assert_eq!(memory.entity_types().len(), 7);
    assert_eq!(memory.relation_types().len(), 6);
}
