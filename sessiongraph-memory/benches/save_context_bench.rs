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

//! Benchmark for the write path and graph queries
//!
//! Run with: cargo bench -p sessiongraph-memory --bench save_context_bench

use serde_json::json;
use sessiongraph_memory::{KnowledgeGraphConfig, KnowledgeGraphMemory, TurnValues};
use std::time::Instant;

fn generate_turn(seed: usize) -> TurnValues {
    let person = format!("person{}", seed % 97);
    let place = format!("city{}", (seed * 7) % 31);
    let org = format!("team{}", (seed * 13) % 17);
    let text = format!(
        "person: {person}, location: {place}. {person} located in {place}. {person} works at {org}."
    );
    TurnValues::from([("input".to_string(), json!(text))])
}

fn benchmark_save_context(max_nodes: Option<usize>) {
    println!("\n=== save_context (max_graph_nodes = {:?}) ===", max_nodes);
    let turns = 5_000;

    let mut config = KnowledgeGraphConfig::default();
    config.max_graph_nodes = max_nodes;
    let memory = match KnowledgeGraphMemory::new(config) {
        Ok(memory) => memory,
        Err(e) => {
            println!("invalid config: {}", e);
            return;
        }
    };
    let inputs: Vec<TurnValues> = (0..turns).map(generate_turn).collect();
    let outputs = TurnValues::new();

    let start = Instant::now();
    for turn in &inputs {
        memory.save_context("bench", turn, &outputs);
    }
    let elapsed = start.elapsed();

    let stats = memory.get_graph_stats("bench");
    println!(
        "{} turns in {:?} ({} turns/sec)",
        turns,
        elapsed,
        (turns as f64 / elapsed.as_secs_f64()) as u64
    );
    println!(
        "Graph: {} entities, {} relations",
        stats["total_entities"], stats["total_relations"]
    );
}

fn benchmark_queries() {
    println!("\n=== Queries ===");
    let config = KnowledgeGraphConfig::default().traversal_depth(2);
    let memory = match KnowledgeGraphMemory::new(config) {
        Ok(memory) => memory,
        Err(e) => {
            println!("invalid config: {}", e);
            return;
        }
    };
    for seed in 0..2_000 {
        memory.save_context("bench", &generate_turn(seed), &TurnValues::new());
    }

    let iterations = 1_000;

    let start = Instant::now();
    for i in 0..iterations {
        let _ = memory.get_related_entities(&format!("person{}", i % 97), 10);
    }
    let related_time = start.elapsed();

    let start = Instant::now();
    for i in 0..iterations {
        let _ = memory.find_path(&format!("person{}", i % 97), &format!("team{}", i % 17));
    }
    let path_time = start.elapsed();

    let query = TurnValues::from([("input".to_string(), json!("where is person3?"))]);
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = memory.load_memory_variables("bench", &query);
    }
    let render_time = start.elapsed();

    println!("related_entities:      {:?} per query", related_time / iterations);
    println!("find_path:             {:?} per query", path_time / iterations);
    println!("load_memory_variables: {:?} per call", render_time / iterations);
}

fn main() {
    println!("Sessiongraph Memory Benchmarks");
    println!("==============================");

    benchmark_save_context(None);
    benchmark_save_context(Some(64));
    benchmark_queries();
}
