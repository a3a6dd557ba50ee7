use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::table::DataTable;
use crate::types::TableKind;

/// Rule tables of one kind, keyed by tag.
///
/// The lock only guards the map itself; a table reloads its own backing set
/// without touching the registry.
pub struct TableRegistry {
    kind: TableKind,
    tables: RwLock<HashMap<String, Arc<DataTable>>>,
}

impl TableRegistry {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn get(&self, tag: &str) -> Option<Arc<DataTable>> {
        self.tables.read().get(tag).cloned()
    }

    /// Register a table under its tag, returning the one it replaced
    pub fn insert(&self, table: Arc<DataTable>) -> Option<Arc<DataTable>> {
        let previous = self.tables.write().insert(table.tag().to_string(), table);
        if let Some(prev) = &previous {
            log::warn!("{} {}: replaced table from {}", self.kind, prev.tag(), prev.source());
        }
        previous
    }

    /// Snapshot of every table, sorted by tag
    pub fn tables(&self) -> Vec<Arc<DataTable>> {
        let mut tables: Vec<_> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.tag().cmp(b.tag()));
        tables
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self.tables.read().keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Geographic sets keyed by country/region code.
///
/// Sets are built outside the lock and swapped in per code.
pub struct GeoSets<T> {
    sets: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> GeoSets<T> {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<T>> {
        self.sets.read().get(code).cloned()
    }

    /// Replace the sets of the given codes; other codes are left alone
    pub fn replace_many(&self, fresh: HashMap<String, T>) -> usize {
        let fresh: Vec<(String, Arc<T>)> = fresh.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        let count = fresh.len();
        let mut sets = self.sets.write();
        for (code, set) in fresh {
            sets.insert(code, set);
        }
        count
    }

    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<_> = self.sets.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for GeoSets<T> {
    fn default() -> Self {
        Self::new()
    }
}
