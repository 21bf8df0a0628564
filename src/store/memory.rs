//! In-memory stores with an optional byte quota.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{DatasetStore, SnippetStore};
use crate::dataset::Dataset;
use crate::snippet::Snippet;
use crate::{ChartbookError, Result};

/// Serialized size of a record, the unit quotas are measured in
fn record_size<T: Serialize>(record: &T) -> Result<usize> {
    serde_json::to_vec(record)
        .map(|bytes| bytes.len())
        .map_err(|e| ChartbookError::InternalError(format!("Failed to serialize record: {}", e)))
}

/// Records keyed by id with per-record sizes for quota accounting
#[derive(Debug)]
struct Table<T> {
    rows: HashMap<String, (T, usize)>,
    quota: Option<usize>,
}

impl<T: Clone + Serialize> Table<T> {
    fn new(quota: Option<usize>) -> Self {
        Self {
            rows: HashMap::new(),
            quota,
        }
    }

    fn used(&self) -> usize {
        self.rows.values().map(|(_, size)| size).sum()
    }

    fn insert(&mut self, id: &str, record: &T) -> Result<()> {
        let size = record_size(record)?;
        if let Some(quota) = self.quota {
            let replaced = self.rows.get(id).map_or(0, |(_, old)| *old);
            let needed = self.used() - replaced + size;
            if needed > quota {
                return Err(ChartbookError::PersistenceQuotaExceeded(format!(
                    "storing {} bytes would use {} of {} bytes",
                    size, needed, quota
                )));
            }
        }
        self.rows.insert(id.to_string(), (record.clone(), size));
        Ok(())
    }

    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).map(|(record, _)| record.clone())
    }

    fn remove(&mut self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values().map(|(record, _)| record)
    }
}

// =============================================================================
// Snippets
// =============================================================================

#[derive(Debug)]
pub struct MemorySnippetStore {
    inner: RwLock<Table<Snippet>>,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    /// Store that rejects writes once `quota` serialized bytes would be exceeded
    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(Table::new(quota)),
        }
    }
}

impl Default for MemorySnippetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn get(&self, id: &str) -> Result<Option<Snippet>> {
        Ok(self.inner.read().await.get(id))
    }

    async fn put(&self, snippet: &Snippet) -> Result<()> {
        self.inner.write().await.insert(snippet.id(), snippet)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(id))
    }

    async fn list(&self) -> Result<Vec<Snippet>> {
        let table = self.inner.read().await;
        let mut snippets: Vec<Snippet> = table.values().cloned().collect();
        snippets.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        Ok(snippets)
    }
}

// =============================================================================
// Datasets
// =============================================================================

#[derive(Debug)]
pub struct MemoryDatasetStore {
    inner: RwLock<Table<Dataset>>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    /// Store that rejects writes once `quota` serialized bytes would be exceeded
    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(Table::new(quota)),
        }
    }
}

impl Default for MemoryDatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetStore for MemoryDatasetStore {
    async fn get(&self, id: &str) -> Result<Option<Dataset>> {
        Ok(self.inner.read().await.get(id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Dataset>> {
        let table = self.inner.read().await;
        let found = table.values().find(|d| d.name() == name).cloned();
        Ok(found)
    }

    async fn put(&self, dataset: &Dataset) -> Result<()> {
        let mut table = self.inner.write().await;
        let taken = table
            .values()
            .any(|other| other.name() == dataset.name() && other.id() != dataset.id());
        if taken {
            return Err(ChartbookError::DatasetNameConflict(dataset.name().to_string()));
        }
        table.insert(dataset.id(), dataset)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.inner.write().await.remove(id))
    }

    async fn list(&self) -> Result<Vec<Dataset>> {
        let table = self.inner.read().await;
        let mut datasets: Vec<Dataset> = table.values().cloned().collect();
        datasets.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetFormat;
    use crate::spec::VisualizationSpec;
    use serde_json::json;

    fn dataset(name: &str) -> Dataset {
        Dataset::inline(name, DatasetFormat::Json, json!([{"x": 1}])).unwrap()
    }

    #[tokio::test]
    async fn test_snippet_put_get_delete() {
        let store = MemorySnippetStore::new();
        let snippet = Snippet::new("a", VisualizationSpec::new());

        store.put(&snippet).await.unwrap();
        assert_eq!(store.get(snippet.id()).await.unwrap(), Some(snippet.clone()));
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert!(store.delete(snippet.id()).await.unwrap());
        assert!(!store.delete(snippet.id()).await.unwrap());
        assert_eq!(store.get(snippet.id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dataset_lookup_by_name() {
        let store = MemoryDatasetStore::new();
        let ds = dataset("sales");
        store.put(&ds).await.unwrap();

        let found = store.get_by_name("sales").await.unwrap().unwrap();
        assert_eq!(found.id(), ds.id());
        assert!(store.get_by_name("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dataset_name_conflict() {
        let store = MemoryDatasetStore::new();
        let first = dataset("sales");
        store.put(&first).await.unwrap();

        let err = store.put(&dataset("sales")).await.unwrap_err();
        assert!(matches!(err, ChartbookError::DatasetNameConflict(ref n) if n == "sales"));

        // Re-putting the same record is an update, not a conflict
        store.put(&first).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let snippet = Snippet::new("a", VisualizationSpec::new());
        let size = record_size(&snippet).unwrap();

        let store = MemorySnippetStore::with_quota(Some(size + 10));
        store.put(&snippet).await.unwrap();
        // Replacing a record only counts its new size
        store.put(&snippet).await.unwrap();

        let other = Snippet::new("b", VisualizationSpec::new());
        let err = store.put(&other).await.unwrap_err();
        assert!(matches!(err, ChartbookError::PersistenceQuotaExceeded(_)));
        assert!(store.get(other.id()).await.unwrap().is_none());
    }
}
