//! # Storage
//!
//! redb-backed persistence for every Twain record.
//!
//! Each record kind lives in its own `u64 -> postcard bytes` table and
//! implements [`Record`], which tells the [`Store`] its table, its unique
//! keys and what to clean up when a row is deleted. IDs come from a
//! per-kind counter in the metadata table and start at 1.
//!
//! Anything that touches more than one row (uniqueness checks, cascades,
//! payment reconciliation) happens inside one write transaction.

mod auth;
mod queries;
mod records;
mod redb_store;

use crate::TwainError;
use redb::{TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use queries::{ArticleRow, StoreStats, SubscriptionAction, SubscriptionRow};
pub use redb_store::Store;

pub(crate) use records::CHECKOUT_INDEX;
pub(crate) use redb_store::{insert_in, load, load_all, put};

/// A field that must be unique (case-insensitively) across a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub field: &'static str,
    pub value: String,
    /// Conflict message shown to the user.
    pub message: &'static str,
}

impl UniqueKey {
    pub fn new(field: &'static str, value: impl Into<String>, message: &'static str) -> Self {
        Self {
            field,
            value: value.into(),
            message,
        }
    }

    fn collides_with(&self, other: &Self) -> bool {
        self.field == other.field && self.value.to_lowercase() == other.value.to_lowercase()
    }
}

/// A persisted record kind.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Human name used in not-found errors.
    const KIND: &'static str;

    /// Backing table.
    const TABLE: TableDefinition<'static, u64, &'static [u8]>;

    fn id(&self) -> u64;

    fn set_id(&mut self, id: u64);

    /// Field-level validation run before every write.
    fn check(&self) -> Result<(), TwainError>;

    /// Values that must not collide with any other row of this kind.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }

    /// Cascade hook, run in the deleting transaction after the row is gone.
    fn on_delete(&self, _txn: &WriteTransaction) -> Result<(), TwainError> {
        Ok(())
    }
}
