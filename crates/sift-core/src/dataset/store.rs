//! DatasetStore implementation

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use super::{Dataset, DatasetSummary, StoreError};

/// In-memory dataset store, keyed by opaque id.
///
/// The store is an explicitly constructed object: create it at process
/// start and hand an `Arc` to whatever owns a conversation run. Mutation is
/// append-only; datasets are immutable once ingested and live for the
/// process lifetime, so readers share them via `Arc` without locking.
pub struct DatasetStore {
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Ingest decoded rows as a new dataset and return its summary.
    ///
    /// Assigns a fresh id and infers column types from a row sample. The
    /// returned summary reflects exactly the rows just stored.
    pub fn add_dataset(
        &self,
        name: impl Into<String>,
        rows: Vec<Map<String, Value>>,
    ) -> Result<DatasetSummary, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let dataset = Arc::new(Dataset::from_rows(id.clone(), name, rows));
        let summary = dataset.summary();

        let mut datasets = self
            .datasets
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        datasets.insert(id, dataset);

        tracing::info!(
            dataset_id = %summary.id,
            name = %summary.name,
            row_count = summary.row_count,
            column_count = summary.columns.len(),
            "dataset ingested"
        );
        Ok(summary)
    }

    /// Look up a dataset by id. Absence is a normal, expected outcome.
    pub fn get(&self, id: &str) -> Result<Option<Arc<Dataset>>, StoreError> {
        let datasets = self
            .datasets
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(datasets.get(id).cloned())
    }

    /// Enumerate dataset summaries without exposing row data
    pub fn list(&self) -> Result<Vec<DatasetSummary>, StoreError> {
        let datasets = self
            .datasets
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(datasets.values().map(|d| d.summary()).collect())
    }
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new()
    }
}
