//! Key-value storage backends for the Sigil node.
//!
//! Every table is a column family. Writes are applied as batches so that a
//! record and its index entries land together or not at all.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Column families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Dids,
    Operations,
    Pins,
    Verifications,
    Applications,
    Credentials,
    Jobs,
    /// Uniqueness and lookup indexes, keyed `<kind>:<value>`.
    Indexes,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Profiles,
        Table::Dids,
        Table::Operations,
        Table::Pins,
        Table::Verifications,
        Table::Applications,
        Table::Credentials,
        Table::Jobs,
        Table::Indexes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Dids => "dids",
            Table::Operations => "ion_operations",
            Table::Pins => "ipfs_pins",
            Table::Verifications => "verifications",
            Table::Applications => "issuer_applications",
            Table::Credentials => "verifiable_credentials",
            Table::Jobs => "anchor_jobs",
            Table::Indexes => "indexes",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One write in a batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        table: Table,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: String,
    },
}

/// Storage backend: column-family key-value store with atomic batches.
pub trait Backend: Send + Sync {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// All values in a table, in key order.
    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Apply every operation or none of them.
    fn write(&self, batch: Vec<BatchOp>) -> Result<(), StoreError>;
}

/// In-process backend.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<Table, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get(&table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn write(&self, batch: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        for op in batch {
            match op {
                BatchOp::Put { table, key, value } => {
                    tables.entry(table).or_default().insert(key, value);
                }
                BatchOp::Delete { table, key } => {
                    if let Some(t) = tables.get_mut(&table) {
                        t.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

/// RocksDB-backed storage, one column family per table.
pub struct RocksBackend {
    db: DB,
}

impl RocksBackend {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = Table::ALL
            .iter()
            .map(|t| ColumnFamilyDescriptor::new(t.name(), Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        tracing::info!(path = %path.display(), "storage opened");

        Ok(Self { db })
    }

    fn cf(&self, table: Table) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(table.name())
            .ok_or_else(|| StoreError::Backend(format!("column family '{}' not found", table)))
    }
}

impl Backend for RocksBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(table)?;
        Ok(self.db.get_cf(cf, key.as_bytes())?)
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let cf = self.cf(table)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| StoreError::Backend(format!("non-utf8 key in {}: {}", table, e)))?;
            out.push((key, value.to_vec()));
        }
        Ok(out)
    }

    fn write(&self, batch: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut wb = WriteBatch::default();
        for op in batch {
            match op {
                BatchOp::Put { table, key, value } => {
                    wb.put_cf(self.cf(table)?, key.as_bytes(), value);
                }
                BatchOp::Delete { table, key } => {
                    wb.delete_cf(self.cf(table)?, key.as_bytes());
                }
            }
        }
        self.db.write(wb)?;
        Ok(())
    }
}
