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

//! JSON-lines conversation transcripts
//!
//! One turn per line: `{"session": "s1", "inputs": {...}, "outputs": {...}}`.
//! Blank lines are skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sessiongraph_memory::{KnowledgeGraphMemory, TurnValues};
use std::path::Path;
use tracing::info;

/// One recorded conversational turn
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscriptTurn {
    pub session: String,
    #[serde(default)]
    pub inputs: TurnValues,
    #[serde(default)]
    pub outputs: TurnValues,
}

/// Totals over a replayed transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub turns: usize,
    pub entities_upserted: usize,
    pub entities_created: usize,
    pub relations_upserted: usize,
    pub evicted: usize,
}

/// Parse transcript text, reporting the first bad line by number
pub fn parse(content: &str) -> Result<Vec<TranscriptTurn>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("malformed transcript line {}", index + 1))
        })
        .collect()
}

/// Read and parse a transcript file
pub fn read(path: &Path) -> Result<Vec<TranscriptTurn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    parse(&content).with_context(|| format!("in transcript {}", path.display()))
}

/// Feed every turn to the memory in order
pub fn replay(memory: &KnowledgeGraphMemory, turns: &[TranscriptTurn]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for turn in turns {
        let outcome = memory.save_context(&turn.session, &turn.inputs, &turn.outputs);
        summary.turns += 1;
        summary.entities_upserted += outcome.entities_upserted;
        summary.entities_created += outcome.entities_created;
        summary.relations_upserted += outcome.relations_upserted;
        summary.evicted += outcome.evicted.len();
    }
    info!(
        "Replayed {} turns: {} entities created, {} relations, {} evicted",
        summary.turns, summary.entities_created, summary.relations_upserted, summary.evicted
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiongraph_memory::KnowledgeGraphConfig;
    use std::io::Write;

    const TRANSCRIPT: &str = r#"{"session": "s1", "inputs": {"input": "人名：张三 地点：北京"}, "outputs": {"output": "张三位于北京"}}

{"session": "s2", "inputs": {"input": "person: Alice"}}
"#;

    #[test]
    fn test_parse_skips_blank_lines() {
        let turns = parse(TRANSCRIPT).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].session, "s1");
        assert!(turns[1].outputs.is_empty());
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse("{\"session\": \"s1\"}\n\n{oops").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_read_and_replay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRANSCRIPT.as_bytes()).unwrap();

        let turns = read(file.path()).unwrap();
        let memory = KnowledgeGraphMemory::new(KnowledgeGraphConfig::default()).unwrap();
        let summary = replay(&memory, &turns);

        assert_eq!(summary.turns, 2);
        assert_eq!(summary.entities_created, 3);
        assert_eq!(summary.relations_upserted, 1);
        assert_eq!(memory.session_ids(), vec!["s1", "s2"]);
    }
}
