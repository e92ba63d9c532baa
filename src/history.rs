//! Newest-first list of past generations, persisted as one JSON blob.
//!
//! Every mutation rewrites the whole blob immediately.

use crate::state::HistoryItem;
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;

pub const HISTORY_KEY: &str = "scriptHistory";

pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    items: Vec<HistoryItem>,
}

impl HistoryStore {
    /// Read the stored history once. A missing blob is an empty history; a
    /// corrupt one is logged and treated the same way.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let items = Self::load_all(store.as_ref())?;
        Ok(Self { store, items })
    }

    pub fn load_all(store: &dyn KeyValueStore) -> Result<Vec<HistoryItem>> {
        let Some(raw) = store.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::error!("ignoring unreadable history blob: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Prepend `item`. Its id is bumped past the newest entry's when both
    /// were stamped in the same millisecond.
    pub fn append(&mut self, mut item: HistoryItem) -> Result<&HistoryItem> {
        if self.items.iter().any(|existing| existing.id == item.id) {
            let newest = self
                .items
                .iter()
                .filter_map(|existing| existing.id.parse::<i64>().ok())
                .max()
                .unwrap_or(0);
            item.id = (newest + 1).to_string();
        }
        self.items.insert(0, item);
        self.persist()?;
        Ok(&self.items[0])
    }

    /// Remove the item with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    pub fn persist(&self) -> Result<()> {
        let content = serde_json::to_string(&self.items)?;
        self.store.set(HISTORY_KEY, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn item(id: &str) -> HistoryItem {
        HistoryItem {
            id: id.to_string(),
            date: "2024. 01. 01. 00:00:00".to_string(),
            topic: format!("topic {}", id),
            script: format!("script {}", id),
            analysis: format!("analysis {}", id),
        }
    }

    #[test]
    fn test_missing_blob_is_empty() -> Result<()> {
        let history = HistoryStore::load(Arc::new(MemoryStore::new()))?;
        assert!(history.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_blob_is_empty() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "{not json")?;
        let history = HistoryStore::load(store)?;
        assert!(history.is_empty());
        Ok(())
    }

    #[test]
    fn test_append_prepends_and_persists() -> Result<()> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut history = HistoryStore::load(store.clone())?;
        history.append(item("1"))?;
        history.append(item("2"))?;

        let ids: Vec<&str> = history.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);

        let reloaded = HistoryStore::load_all(store.as_ref())?;
        assert_eq!(reloaded, history.items());
        Ok(())
    }

    #[test]
    fn test_colliding_id_is_bumped() -> Result<()> {
        let mut history = HistoryStore::load(Arc::new(MemoryStore::new()))?;
        history.append(item("1000"))?;
        let appended = history.append(item("1000"))?.id.clone();
        assert_eq!(appended, "1001");
        assert_eq!(history.len(), 2);
        Ok(())
    }

    #[test]
    fn test_remove_keeps_others_in_order() -> Result<()> {
        let mut history = HistoryStore::load(Arc::new(MemoryStore::new()))?;
        for id in ["1", "2", "3", "4"] {
            history.append(item(id))?;
        }

        assert!(history.remove("2")?);
        assert!(!history.remove("missing")?);

        let ids: Vec<&str> = history.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3", "1"]);
        assert!(history.get("2").is_none());
        Ok(())
    }

    #[test]
    fn test_file_backed_history_survives_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));

        let mut history = HistoryStore::load(store.clone())?;
        history.append(item("1"))?;
        history.append(item("2"))?;
        history.remove("1")?;

        let reloaded = HistoryStore::load(store)?;
        assert_eq!(reloaded.items(), &[item("2")]);

        let mut reloaded = reloaded;
        reloaded.clear()?;
        assert!(HistoryStore::load_all(&FileStore::new(dir.path()))?.is_empty());
        Ok(())
    }
}
