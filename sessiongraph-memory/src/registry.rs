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

//! Session Registry
//!
//! Maps session ids to independent graphs.
//! - Sharded map (`DashMap`) so sessions never contend on one lock
//! - One reader/writer lock per graph
//! - Removing one session takes only that graph's write lock; a writer
//!   re-checks its graph is still mapped after locking and retries otherwise
//! - A registry-wide gate: writers hold it shared, clearing every session
//!   holds it exclusively
//!
//! Shard guards are never held while a graph lock is taken.

use crate::graph::SessionGraph;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// A graph shared between the registry and in-flight calls
pub type SharedGraph = Arc<RwLock<SessionGraph>>;

/// Concurrency-safe session id -> graph map
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SharedGraph>,
    gate: RwLock<()>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph for a session, if one was ever written
    pub fn get(&self, session_id: &str) -> Option<SharedGraph> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Run `apply` with exclusive access to a session's graph, creating the
    /// graph with `create` on first use
    pub fn write<R>(
        &self,
        session_id: &str,
        create: impl Fn() -> SessionGraph,
        apply: impl FnOnce(&mut SessionGraph) -> R,
    ) -> R {
        let _gate = self.gate.read();
        loop {
            let graph = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(create())))
                .value()
                .clone();
            let mut guard = graph.write();
            if self.is_mapped(session_id, &graph) {
                return apply(&mut guard);
            }
            // Removed while we waited for the lock
        }
    }

    fn is_mapped(&self, session_id: &str, graph: &SharedGraph) -> bool {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::ptr_eq(entry.value(), graph))
            .unwrap_or(false)
    }

    /// Run `apply` on every live graph, one exclusive lock at a time
    pub fn write_all(&self, mut apply: impl FnMut(&str, &mut SessionGraph)) {
        let _gate = self.gate.read();
        let snapshot: Vec<(String, SharedGraph)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        for (id, graph) in snapshot {
            apply(&id, &mut graph.write());
        }
    }

    /// Run `view` with shared access to a session's graph; `None` if the
    /// session has no graph
    pub fn read<R>(&self, session_id: &str, view: impl FnOnce(&SessionGraph) -> R) -> Option<R> {
        let graph = self.get(session_id)?;
        let guard = graph.read();
        Some(view(&guard))
    }

    /// Remove one session's graph; returns whether it existed
    ///
    /// Waits only for in-flight calls on that session.
    pub fn remove(&self, session_id: &str) -> bool {
        loop {
            let Some(graph) = self.get(session_id) else {
                return false;
            };
            let _guard = graph.write();
            let removed = self
                .sessions
                .remove_if(session_id, |_, current| Arc::ptr_eq(current, &graph))
                .is_some();
            if removed {
                info!("Cleared session graph {}", session_id);
                return true;
            }
        }
    }

    /// Remove every session; returns how many were dropped
    pub fn clear_all(&self) -> usize {
        let _gate = self.gate.write();
        let count = self.sessions.len();
        self.sessions.clear();
        info!("Cleared {} session graphs", count);
        count
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live session ids, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Live sessions, most recently updated first (ties by id)
    pub fn by_recency(&self) -> Vec<(String, SharedGraph)> {
        let snapshot: Vec<(String, SharedGraph)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let mut keyed: Vec<_> = snapshot
            .into_iter()
            .map(|(id, graph)| {
                let updated = graph.read().updated_at();
                (updated, id, graph)
            })
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        keyed.into_iter().map(|(_, id, graph)| (id, graph)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImportancePolicy;
    use std::sync::Barrier;
    use std::time::{Duration, Instant};

    fn empty() -> SessionGraph {
        SessionGraph::new(ImportancePolicy::default(), None)
    }

    #[test]
    fn test_create_on_first_write() {
        let registry = SessionRegistry::new();
        assert!(registry.get("s1").is_none());
        assert!(registry.read("s1", |g| g.len()).is_none());

        let tick = registry.write("s1", empty, |g| g.begin_turn());
        assert_eq!(tick, 1);
        let tick = registry.write("s1", empty, |g| g.begin_turn());
        assert_eq!(tick, 2);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.read("s1", |g| g.clock()), Some(2));
    }

    #[test]
    fn test_remove_and_clear_all() {
        let registry = SessionRegistry::new();
        for id in ["a", "b", "c"] {
            registry.write(id, empty, |g| g.begin_turn());
        }
        assert_eq!(registry.session_ids(), vec!["a", "b", "c"]);

        assert!(registry.remove("b"));
        assert!(!registry.remove("b"));
        assert_eq!(registry.session_ids(), vec!["a", "c"]);

        assert_eq!(registry.clear_all(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_ignores_writes_on_other_sessions() {
        let registry = SessionRegistry::new();
        registry.write("s1", empty, |g| g.begin_turn());
        let started = Barrier::new(2);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                registry.write("s2", empty, |g| {
                    started.wait();
                    std::thread::sleep(Duration::from_millis(500));
                    g.begin_turn()
                });
            });

            started.wait();
            let start = Instant::now();
            assert!(registry.remove("s1"));
            assert!(start.elapsed() < Duration::from_millis(250));
        });

        assert_eq!(registry.session_ids(), vec!["s2"]);
    }

    #[test]
    fn test_remove_waits_for_write_on_same_session() {
        let registry = SessionRegistry::new();
        let started = Barrier::new(2);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                registry.write("s1", empty, |g| {
                    started.wait();
                    std::thread::sleep(Duration::from_millis(100));
                    g.begin_turn()
                });
            });

            started.wait();
            let start = Instant::now();
            assert!(registry.remove("s1"));
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        // The write finished first, so the clear dropped it
        assert!(registry.get("s1").is_none());

        // A later write starts a fresh graph
        assert_eq!(registry.write("s1", empty, |g| g.begin_turn()), 1);
    }

    #[test]
    fn test_write_retries_on_detached_graph() {
        let registry = SessionRegistry::new();
        registry.write("s1", empty, |g| g.begin_turn());
        let detached = registry.get("s1").unwrap();
        let held = detached.write();

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| registry.write("s1", empty, |g| g.begin_turn()));
            std::thread::sleep(Duration::from_millis(50));
            // Detach the graph the writer is waiting on
            registry.sessions.remove("s1");
            drop(held);
            assert_eq!(writer.join().unwrap(), 1);
        });

        assert_eq!(detached.read().clock(), 1);
        assert_eq!(registry.read("s1", |g| g.clock()), Some(1));
    }

    #[test]
    fn test_recency_order() {
        let registry = SessionRegistry::new();
        registry.write("old", empty, |g| g.begin_turn());
        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.write("new", empty, |g| g.begin_turn());

        let ids: Vec<_> = registry.by_recency().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
