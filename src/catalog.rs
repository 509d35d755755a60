use crate::access::schema::Schema;
use crate::access::{HeapFile, TableFile};
use crate::storage::error::{StorageError, StorageResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub use crate::storage::page::TableId;

/// Persisted description of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub path: PathBuf,
    pub schema: Schema,
}

/// Registry of tables: resolves ids and names to table files and schemas.
pub struct Catalog {
    files: DashMap<TableId, Arc<dyn TableFile>>,
    tables: DashMap<TableId, TableInfo>,
    names: DashMap<String, TableId>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            tables: DashMap::new(),
            names: DashMap::new(),
            next_table_id: AtomicU32::new(1),
        }
    }

    /// Registers a heap table stored at `path`, opening (or creating) the file.
    pub fn add_table(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        schema: Schema,
    ) -> StorageResult<TableId> {
        let Entry::Vacant(slot) = self.names.entry(name.to_string()) else {
            return Err(StorageError::TableExists(name.to_string()));
        };

        let table_id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let info = TableInfo {
            table_id,
            table_name: name.to_string(),
            path: path.as_ref().to_path_buf(),
            schema,
        };
        self.register(&info)?;
        slot.insert(table_id);

        debug!("registered table {} as {}", name, table_id);
        Ok(table_id)
    }

    fn register(&self, info: &TableInfo) -> StorageResult<()> {
        let file = HeapFile::open(info.table_id, &info.path, Arc::new(info.schema.clone()))?;
        self.files.insert(info.table_id, Arc::new(file));
        self.tables.insert(info.table_id, info.clone());
        Ok(())
    }

    pub fn table_file(&self, table_id: TableId) -> StorageResult<Arc<dyn TableFile>> {
        self.files
            .get(&table_id)
            .map(|file| Arc::clone(file.value()))
            .ok_or_else(|| StorageError::TableNotFound(table_id.to_string()))
    }

    pub fn schema(&self, table_id: TableId) -> StorageResult<Arc<Schema>> {
        Ok(Arc::clone(self.table_file(table_id)?.schema()))
    }

    pub fn table_id(&self, name: &str) -> StorageResult<TableId> {
        self.names
            .get(name)
            .map(|id| *id.value())
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    pub fn table_name(&self, table_id: TableId) -> StorageResult<String> {
        self.tables
            .get(&table_id)
            .map(|info| info.table_name.clone())
            .ok_or_else(|| StorageError::TableNotFound(table_id.to_string()))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn tables(&self) -> Vec<TableInfo> {
        let mut tables: Vec<TableInfo> = self.tables.iter().map(|e| e.value().clone()).collect();
        tables.sort_by_key(|info| info.table_id);
        tables
    }

    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &self.tables())?;
        Ok(())
    }

    /// Restores a catalog written by `save`, reopening every table file.
    pub fn load(path: &Path) -> StorageResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let tables: Vec<TableInfo> = bincode::deserialize_from(reader)?;

        let catalog = Self::new();
        for info in &tables {
            catalog.register(info)?;
            catalog.names.insert(info.table_name.clone(), info.table_id);
        }
        let next = tables.iter().map(|t| t.table_id).max().unwrap_or(0) + 1;
        catalog.next_table_id.store(next, Ordering::SeqCst);
        Ok(catalog)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
