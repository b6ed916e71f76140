//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use stepmigrate::prelude::*;
use tempfile::TempDir;

/// SQL containing this marker makes [`MemoryStore::apply_step`] fail.
pub const FAIL_MARKER: &str = "-- FAIL";

#[derive(Debug, Default)]
pub struct StoreState {
    /// SQL bodies of committed steps, in commit order.
    pub executed: Vec<String>,
    pub log: Vec<AppliedStep>,
    pub ensured: bool,
    pub attempts: usize,
}

/// In-memory position store. Clones share state, so a test can keep a handle
/// after moving the store into a `Migrator`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// A store whose log already ends at `position`.
    pub fn at(position: i64) -> Self {
        let store = Self::default();
        if position != 0 {
            store.state.lock().unwrap().log.push(AppliedStep {
                id: 1,
                applied_at: Utc::now(),
                position,
                index: position,
                direction: Direction::Forward,
                label: Some("seed".to_string()),
            });
        }
        store
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn positions(&self) -> Vec<i64> {
        self.state.lock().unwrap().log.iter().map(|e| e.position).collect()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn ensure_store(&mut self) -> MigrateResult<()> {
        self.state.lock().unwrap().ensured = true;
        Ok(())
    }

    async fn latest_position(&mut self) -> MigrateResult<Option<i64>> {
        Ok(self.state.lock().unwrap().log.last().map(|e| e.position))
    }

    async fn apply_step(&mut self, sql: &str, record: &StepRecord) -> MigrateResult<()> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if sql.contains(FAIL_MARKER) {
            return Err(MigrateError::Database("syntax error at or near \"FAIL\"".to_string()));
        }
        state.executed.push(sql.trim().to_string());
        let id = state.log.len() as i64 + 1;
        state.log.push(AppliedStep {
            id,
            applied_at: Utc::now(),
            position: record.position as i64,
            index: record.index as i64,
            direction: record.direction,
            label: Some(record.label.clone()),
        });
        Ok(())
    }

    async fn history(&mut self) -> MigrateResult<Vec<AppliedStep>> {
        Ok(self.state.lock().unwrap().log.clone())
    }
}

/// Write `files` (name, content) into a fresh temporary directory.
pub fn migrations_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        write(dir.path(), name, content);
    }
    dir
}

pub fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// `n` complete steps whose bodies are `up <i>` and `down <i>`.
pub fn numbered_steps(n: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 1..=n {
        write(dir.path(), &format!("{i}_step{i}.up.sql"), &format!("up {i}"));
        write(dir.path(), &format!("{i}_step{i}.down.sql"), &format!("down {i}"));
    }
    dir
}
