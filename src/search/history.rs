use anyhow::{Context, Result};

use crate::storage::{read_json, write_json, SharedStore, SEARCH_HISTORY_KEY};

pub const HISTORY_LIMIT: usize = 5;

/// Recent queries, newest first, unique ignoring case.
pub struct SearchHistory {
    store: SharedStore,
    entries: Vec<String>,
}

impl SearchHistory {
    pub fn load(store: SharedStore) -> Self {
        let mut entries: Vec<String> =
            read_json(store.as_ref(), SEARCH_HISTORY_KEY).unwrap_or_default();
        normalize(&mut entries);
        Self { store, entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns false when the query is blank and nothing was recorded.
    pub fn record(&mut self, query: &str) -> Result<bool> {
        if query.trim().is_empty() {
            return Ok(false);
        }
        let lowered = query.to_lowercase();
        self.entries.retain(|entry| entry.to_lowercase() != lowered);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(HISTORY_LIMIT);
        self.persist()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        write_json(self.store.as_ref(), SEARCH_HISTORY_KEY, &self.entries)
            .context("persisting search history")
    }
}

// Stored lists written by older builds may break the invariants.
fn normalize(entries: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(entries.len());
    entries.retain(|entry| {
        let lowered = entry.to_lowercase();
        if entry.trim().is_empty() || seen.contains(&lowered) {
            return false;
        }
        seen.push(lowered);
        true
    });
    entries.truncate(HISTORY_LIMIT);
}
