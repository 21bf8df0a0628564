//! Persistence collaborators
//!
//! The engine never owns storage; it reads and writes snippets and datasets
//! through these async traits. [`memory`] provides in-process implementations
//! used by the CLI and tests.

pub mod memory;

use async_trait::async_trait;

use crate::dataset::Dataset;
use crate::snippet::Snippet;
use crate::Result;

pub use memory::{MemoryDatasetStore, MemorySnippetStore};

/// Snippet records keyed by id
#[async_trait]
pub trait SnippetStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Snippet>>;

    /// Insert or replace the snippet with the same id
    async fn put(&self, snippet: &Snippet) -> Result<()>;

    /// Remove a snippet; returns whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Snippet>>;
}

/// Dataset records keyed by id with a unique index on name
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Dataset>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Dataset>>;

    /// Insert or replace the dataset with the same id
    ///
    /// Fails with `DatasetNameConflict` when another dataset already has the name.
    async fn put(&self, dataset: &Dataset) -> Result<()>;

    /// Remove a dataset; returns whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Dataset>>;
}
