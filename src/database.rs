use crate::access::schema::Schema;
use crate::access::tuple::{RecordId, Tuple};
use crate::access::value::Value;
use crate::catalog::{Catalog, TableId};
use crate::config::StorageConfig;
use crate::storage::buffer::BufferPool;
use crate::storage::error::{StorageError, StorageResult};
use crate::transaction::TransactionId;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File in the data directory holding the persisted catalog.
pub const CATALOG_FILE: &str = "catalog.bin";

/// Storage context: the catalog and the buffer pool for one data directory.
///
/// Dropping a `Database` writes nothing. Committed work is already on disk,
/// and uncommitted pages must never reach it.
pub struct Database {
    dir: PathBuf,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
}

impl Database {
    /// Initializes an empty database in `dir`, creating the directory if needed.
    pub fn create(dir: &Path, config: StorageConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        let catalog_path = dir.join(CATALOG_FILE);
        if catalog_path.exists() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("database already exists at {}", dir.display()),
            )));
        }

        let catalog = Arc::new(Catalog::new());
        catalog.save(&catalog_path)?;
        Ok(Self::with_catalog(dir, catalog, &config))
    }

    /// Opens the database previously created in `dir`.
    pub fn open(dir: &Path, config: StorageConfig) -> StorageResult<Self> {
        let catalog = Arc::new(Catalog::load(&dir.join(CATALOG_FILE))?);
        Ok(Self::with_catalog(dir, catalog, &config))
    }

    fn with_catalog(dir: &Path, catalog: Arc<Catalog>, config: &StorageConfig) -> Self {
        Self {
            dir: dir.to_path_buf(),
            buffer_pool: BufferPool::new(Arc::clone(&catalog), config),
            catalog,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Creates table `name`, stored in `<dir>/<name>.dat`.
    pub fn create_table(&self, name: &str, schema: Schema) -> StorageResult<TableId> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::InvalidValue(format!(
                "invalid table name {:?}",
                name
            )));
        }

        let path = self.dir.join(format!("{}.dat", name));
        let table_id = self.catalog.add_table(name, path, schema)?;
        self.catalog.save(&self.dir.join(CATALOG_FILE))?;
        Ok(table_id)
    }

    pub fn begin(&self) -> TransactionId {
        self.buffer_pool.begin_transaction()
    }

    pub fn commit(&self, tid: TransactionId) -> StorageResult<()> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> StorageResult<()> {
        self.buffer_pool.transaction_complete(tid, false)
    }

    /// Builds a row from `values` and inserts it into `table_id`.
    pub fn insert(
        &self,
        tid: TransactionId,
        table_id: TableId,
        values: Vec<Value>,
    ) -> StorageResult<RecordId> {
        let mut tuple = Tuple::new(self.catalog.schema(table_id)?, values)?;
        self.buffer_pool.insert_tuple(tid, table_id, &mut tuple)
    }

    /// Reads every live tuple of `table_id` in page and slot order.
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> StorageResult<Vec<Tuple>> {
        let file = self.catalog.table_file(table_id)?;
        let mut cursor = file.iterator(&self.buffer_pool, tid);
        cursor.open()?;

        let mut tuples = Vec::new();
        while cursor.has_next()? {
            tuples.push(cursor.next()?);
        }
        cursor.close();
        Ok(tuples)
    }
}
