//! Embedded store with scoped transactions
//!
//! `view` and `update` wrap redb's read and write transactions in the
//! closure discipline the rest of the system relies on: an `update`
//! closure that returns an error leaves no trace, a closure that returns
//! `Ok` is committed as one atomic unit. The store is single-writer;
//! readers run against a snapshot and never block.

use crate::tables::{ALL, EntityTable};
use brickio_common::{Error, Result};
use redb::{Database, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;

/// Read access shared by both transaction kinds
pub trait StoreTxn {
    /// Fetch the raw record under `key`, if present
    fn get(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>>;

    /// All keys of `table` in store order (sorted)
    fn keys(&self, table: EntityTable) -> Result<Vec<String>>;
}

/// Snapshot-consistent read transaction
pub struct ViewTxn {
    inner: ReadTransaction,
}

impl StoreTxn for ViewTxn {
    fn get(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(table).map_err(Error::store)?;
        Ok(table
            .get(key)
            .map_err(Error::store)?
            .map(|guard| guard.value().to_vec()))
    }

    fn keys(&self, table: EntityTable) -> Result<Vec<String>> {
        let table = self.inner.open_table(table).map_err(Error::store)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(Error::store)? {
            let (key, _) = entry.map_err(Error::store)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

/// Exclusive read/write transaction
pub struct UpdateTxn {
    inner: WriteTransaction,
}

impl UpdateTxn {
    /// Write the raw record under `key`, replacing any prior value
    pub fn put(&self, table: EntityTable, key: &str, value: &[u8]) -> Result<()> {
        let mut table = self.inner.open_table(table).map_err(Error::store)?;
        table.insert(key, value).map_err(Error::store)?;
        Ok(())
    }

    /// Remove the record under `key`; removing a missing key is a no-op
    pub fn remove(&self, table: EntityTable, key: &str) -> Result<()> {
        let mut table = self.inner.open_table(table).map_err(Error::store)?;
        table.remove(key).map_err(Error::store)?;
        Ok(())
    }
}

impl StoreTxn for UpdateTxn {
    fn get(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.inner.open_table(table).map_err(Error::store)?;
        Ok(table
            .get(key)
            .map_err(Error::store)?
            .map(|guard| guard.value().to_vec()))
    }

    fn keys(&self, table: EntityTable) -> Result<Vec<String>> {
        let table = self.inner.open_table(table).map_err(Error::store)?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(Error::store)? {
            let (key, _) = entry.map_err(Error::store)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

/// Topology store handle
pub struct Db {
    db: Database,
}

impl Db {
    /// Open (or create) the store at `path`, bootstrapping every table
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(Error::store)?;

        let wtx = db.begin_write().map_err(Error::store)?;
        for table in ALL {
            wtx.open_table(table).map_err(Error::store)?;
        }
        wtx.commit().map_err(Error::store)?;

        Ok(Self { db })
    }

    /// Run `f` against a snapshot-consistent read transaction
    pub fn view<T>(&self, f: impl FnOnce(&ViewTxn) -> Result<T>) -> Result<T> {
        let txn = ViewTxn {
            inner: self.db.begin_read().map_err(Error::store)?,
        };
        f(&txn)
    }

    /// Run `f` against the exclusive write transaction. The transaction
    /// commits only when `f` returns `Ok`; on `Err` it is aborted and no
    /// mutation becomes visible.
    pub fn update<T>(&self, f: impl FnOnce(&UpdateTxn) -> Result<T>) -> Result<T> {
        let txn = UpdateTxn {
            inner: self.db.begin_write().map_err(Error::store)?,
        };
        match f(&txn) {
            Ok(value) => {
                txn.inner.commit().map_err(Error::store)?;
                Ok(value)
            }
            Err(err) => {
                let _ = txn.inner.abort();
                Err(err)
            }
        }
    }
}
