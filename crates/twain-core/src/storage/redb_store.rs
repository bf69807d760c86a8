//! # redb Store
//!
//! The [`Store`] handle plus the transaction-level helpers the auth, query
//! and reconciliation code build on.

use super::Record;
use super::records::{ALL_TABLES, AUTH_SESSIONS, CHECKOUT_INDEX, METADATA};
use crate::TwainError;
use crate::types::storage_err;
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Handle to the Twain database.
///
/// Cheap to share behind an `Arc`; redb allows concurrent readers and a
/// single writer.
pub struct Store {
    pub(crate) db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TwainError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::init(db)
    }

    /// A throwaway database held entirely in memory.
    pub fn in_memory() -> Result<Self, TwainError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, TwainError> {
        let txn = db.begin_write().map_err(storage_err)?;
        for table in ALL_TABLES {
            let _ = txn.open_table(*table).map_err(storage_err)?;
        }
        let _ = txn.open_table(METADATA).map_err(storage_err)?;
        let _ = txn.open_table(CHECKOUT_INDEX).map_err(storage_err)?;
        let _ = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
        txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    // =========================================================================
    // GENERIC CRUD
    // =========================================================================

    /// Validate, check uniqueness, allocate an id and store `record`.
    pub fn insert<R: Record>(&self, mut record: R) -> Result<R, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        insert_in(&txn, &mut record)?;
        txn.commit().map_err(storage_err)?;
        Ok(record)
    }

    pub fn get<R: Record>(&self, id: u64) -> Result<Option<R>, TwainError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(R::TABLE).map_err(storage_err)?;
        fetch(&table, id)
    }

    /// Like [`Store::get`] but missing rows are an error.
    pub fn require<R: Record>(&self, id: u64) -> Result<R, TwainError> {
        self.get(id)?
            .ok_or_else(|| TwainError::not_found(R::KIND, id))
    }

    /// Every row of a kind, in id order.
    pub fn list<R: Record>(&self) -> Result<Vec<R>, TwainError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(R::TABLE).map_err(storage_err)?;
        scan(&table)
    }

    /// Overwrite an existing row.
    pub fn update<R: Record>(&self, record: &R) -> Result<(), TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        if load::<R>(&txn, record.id())?.is_none() {
            return Err(TwainError::not_found(R::KIND, record.id()));
        }
        record.check()?;
        check_unique(&txn, record)?;
        put(&txn, record)?;
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    /// Remove a row and run its cascade. Returns the removed record.
    pub fn delete<R: Record>(&self, id: u64) -> Result<R, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let removed: R = {
            let mut table = txn.open_table(R::TABLE).map_err(storage_err)?;
            let guard = table.remove(id).map_err(storage_err)?;
            match guard {
                Some(bytes) => decode(bytes.value())?,
                None => return Err(TwainError::not_found(R::KIND, id)),
            }
        };
        removed.on_delete(&txn)?;
        txn.commit().map_err(storage_err)?;
        Ok(removed)
    }

    pub fn count<R: Record>(&self) -> Result<usize, TwainError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let table = txn.open_table(R::TABLE).map_err(storage_err)?;
        let len = table.len().map_err(storage_err)?;
        usize::try_from(len).map_err(storage_err)
    }
}

// =============================================================================
// TRANSACTION HELPERS
// =============================================================================

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TwainError> {
    postcard::to_allocvec(value).map_err(|e| TwainError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TwainError> {
    postcard::from_bytes(bytes).map_err(|e| TwainError::Serialization(e.to_string()))
}

/// Decode one row from any readable table.
pub(crate) fn fetch<R: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<R>, TwainError> {
    match table.get(id).map_err(storage_err)? {
        Some(bytes) => Ok(Some(decode(bytes.value())?)),
        None => Ok(None),
    }
}

/// Decode every row from any readable table.
pub(crate) fn scan<R: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> Result<Vec<R>, TwainError> {
    let mut rows = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (_, bytes) = entry.map_err(storage_err)?;
        rows.push(decode(bytes.value())?);
    }
    Ok(rows)
}

pub(crate) fn load<R: Record>(txn: &WriteTransaction, id: u64) -> Result<Option<R>, TwainError> {
    let table = txn.open_table(R::TABLE).map_err(storage_err)?;
    fetch(&table, id)
}

pub(crate) fn load_all<R: Record>(txn: &WriteTransaction) -> Result<Vec<R>, TwainError> {
    let table = txn.open_table(R::TABLE).map_err(storage_err)?;
    scan(&table)
}

/// Write `record` under its current id.
pub(crate) fn put<R: Record>(txn: &WriteTransaction, record: &R) -> Result<(), TwainError> {
    let bytes = encode(record)?;
    let mut table = txn.open_table(R::TABLE).map_err(storage_err)?;
    table
        .insert(record.id(), bytes.as_slice())
        .map_err(storage_err)?;
    Ok(())
}

/// Validate, check uniqueness, allocate an id and write.
pub(crate) fn insert_in<R: Record>(txn: &WriteTransaction, record: &mut R) -> Result<(), TwainError> {
    record.set_id(0);
    record.check()?;
    check_unique(txn, record)?;
    let id = next_id(txn, R::KIND)?;
    record.set_id(id);
    put(txn, record)
}

/// Allocate the next id for `kind`. The first id is 1.
pub(crate) fn next_id(txn: &WriteTransaction, kind: &str) -> Result<u64, TwainError> {
    let key = format!("next_id.{kind}");
    let mut table = txn.open_table(METADATA).map_err(storage_err)?;
    let current = table
        .get(key.as_str())
        .map_err(storage_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current.saturating_add(1);
    table.insert(key.as_str(), next).map_err(storage_err)?;
    Ok(next)
}

/// Reject `record` if any of its unique keys matches another row.
pub(crate) fn check_unique<R: Record>(txn: &WriteTransaction, record: &R) -> Result<(), TwainError> {
    let keys = record.unique_keys();
    if keys.is_empty() {
        return Ok(());
    }
    for other in load_all::<R>(txn)? {
        if other.id() == record.id() {
            continue;
        }
        let theirs = other.unique_keys();
        if let Some(clash) = keys
            .iter()
            .find(|mine| theirs.iter().any(|t| mine.collides_with(t)))
        {
            return Err(TwainError::Conflict(clash.message.to_string()));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
