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

mod config;
mod transcript;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::CliConfig;
use serde_json::{json, Value};
use sessiongraph_memory::{KnowledgeGraphMemory, TurnValues};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay conversations into a session knowledge graph and query it",
    long_about = None
)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "SESSIONGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a transcript and print stats and memory variables per session
    Replay {
        /// JSON-lines transcript
        transcript: PathBuf,
        /// Query text used for the entity_info variable
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Replay a transcript and list entities related to NAME
    Related {
        transcript: PathBuf,
        name: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        /// Restrict the lookup to one session
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Replay a transcript and print the shortest path between two names
    Path {
        transcript: PathBuf,
        from: String,
        to: String,
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Replay a transcript and describe one entity
    Info {
        transcript: PathBuf,
        name: String,
        #[arg(short, long)]
        session: Option<String>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessiongraph_memory=info,sessiongraph=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = CliConfig::load(args.config)?;
    tracing::debug!("Configuration: {:#?}", config);

    let memory = KnowledgeGraphMemory::new(config.memory)?;
    let output = run(&memory, args.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(memory: &KnowledgeGraphMemory, command: Command) -> Result<Value> {
    let output = match command {
        Command::Replay { transcript, query } => {
            let turns = transcript::read(&transcript)?;
            let summary = transcript::replay(memory, &turns);

            let query = TurnValues::from([(
                "query".to_string(),
                Value::String(query.unwrap_or_default()),
            )]);
            let sessions: Vec<Value> = memory
                .session_ids()
                .into_iter()
                .map(|session| {
                    let variables = memory.load_memory_variables(&session, &query);
                    json!({
                        "session": session,
                        "stats": memory.get_graph_stats(&session),
                        "variables": variables.to_map(),
                    })
                })
                .collect();

            json!({ "replay": summary, "sessions": sessions })
        }
        Command::Related {
            transcript,
            name,
            limit,
            session,
        } => {
            transcript::replay(memory, &transcript::read(&transcript)?);
            match session {
                Some(session) => json!(memory.related_entities_in(&session, &name, limit)),
                None => json!(memory.get_related_entities(&name, limit)),
            }
        }
        Command::Path {
            transcript,
            from,
            to,
            session,
        } => {
            transcript::replay(memory, &transcript::read(&transcript)?);
            match session {
                Some(session) => json!(memory.find_path_in(&session, &from, &to)),
                None => json!(memory.find_path(&from, &to)),
            }
        }
        Command::Info {
            transcript,
            name,
            session,
        } => {
            transcript::replay(memory, &transcript::read(&transcript)?);
            match session {
                Some(session) => json!(memory.entity_info_in(&session, &name)),
                None => Value::Object(memory.get_entity_info(&name)),
            }
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiongraph_memory::KnowledgeGraphConfig;
    use std::io::Write;

    fn transcript() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"session": "s1", "inputs": {{"input": "人名：张三 地点：北京 组织：技术部"}}, "outputs": {{"output": "张三位于北京 张三属于技术部"}}}}"#
        )
        .unwrap();
        file
    }

    fn memory() -> KnowledgeGraphMemory {
        KnowledgeGraphMemory::new(KnowledgeGraphConfig::default()).unwrap()
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "sessiongraph",
            "--config",
            "memory.toml",
            "related",
            "chat.jsonl",
            "张三",
            "--limit",
            "3",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("memory.toml")));
        match args.command {
            Command::Related { name, limit, .. } => {
                assert_eq!(name, "张三");
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_replay_command() {
        let file = transcript();
        let output = run(
            &memory(),
            Command::Replay {
                transcript: file.path().to_path_buf(),
                query: Some("张三".into()),
            },
        )
        .unwrap();

        assert_eq!(output["replay"]["turns"], 1);
        assert_eq!(output["sessions"][0]["session"], "s1");
        assert_eq!(output["sessions"][0]["stats"]["total_entities"], 3);
        let info = output["sessions"][0]["variables"]["entity_info"]
            .as_str()
            .unwrap();
        assert!(info.starts_with("张三 (person)"));
    }

    #[test]
    fn test_path_and_info_commands() {
        let file = transcript();
        let path = run(
            &memory(),
            Command::Path {
                transcript: file.path().to_path_buf(),
                from: "北京".into(),
                to: "技术部".into(),
                session: None,
            },
        )
        .unwrap();
        assert_eq!(path, json!(["北京", "张三", "技术部"]));

        let info = run(
            &memory(),
            Command::Info {
                transcript: file.path().to_path_buf(),
                name: "张三".into(),
                session: Some("s1".into()),
            },
        )
        .unwrap();
        assert_eq!(info["type"], "person");
        assert_eq!(info["relations"], json!(["北京", "技术部"]));
    }

    #[test]
    fn test_malformed_transcript_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        let result = run(
            &memory(),
            Command::Info {
                transcript: file.path().to_path_buf(),
                name: "张三".into(),
                session: None,
            },
        );
        assert!(result.is_err());
    }
}
