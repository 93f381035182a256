//! Column metadata cache shared by every record of a model.
//!
//! Column information is fetched from the connection the first time a model
//! is used and kept until it is invalidated, either for one model
//! ([`ColumnCache::invalidate`]) or for all of them
//! ([`ColumnCache::invalidate_all`]). A fetch racing an invalidation simply
//! re-queries the database; the cache is not transactional.

use sqlrecord_core::{ColumnMeta, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The columns of one table, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableColumns {
    columns: Vec<ColumnMeta>,
    index: HashMap<String, usize>,
}

impl TableColumns {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self { columns, index }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnMeta> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnMeta> {
        self.columns.iter()
    }

    /// Column names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<'a> IntoIterator for &'a TableColumns {
    type Item = &'a ColumnMeta;
    type IntoIter = std::slice::Iter<'a, ColumnMeta>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Thread-safe cache of table columns, keyed by model name.
///
/// Cloning the cache yields another handle to the same entries.
#[derive(Debug, Clone, Default)]
pub struct ColumnCache {
    entries: Arc<RwLock<HashMap<String, Arc<TableColumns>>>>,
}

impl ColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached columns of `model`, if any.
    pub fn get(&self, model: &str) -> Option<Arc<TableColumns>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(model).cloned()
    }

    /// Store the columns of `model`, replacing any previous entry.
    pub fn insert(&self, model: impl Into<String>, columns: Vec<ColumnMeta>) -> Arc<TableColumns> {
        let columns = Arc::new(TableColumns::new(columns));
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(model.into(), Arc::clone(&columns));
        columns
    }

    /// Cached columns of `model`, fetching them with `load` on a miss.
    ///
    /// The lock is not held while `load` runs.
    pub fn get_or_load<F>(&self, model: &str, load: F) -> Result<Arc<TableColumns>>
    where
        F: FnOnce() -> Result<Vec<ColumnMeta>>,
    {
        if let Some(columns) = self.get(model) {
            tracing::trace!(model = model, "column cache hit");
            return Ok(columns);
        }

        tracing::trace!(model = model, "column cache miss");
        let columns = load()?;
        Ok(self.insert(model, columns))
    }

    /// Drop the entry of one model.
    pub fn invalidate(&self, model: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(model);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
