//! The transaction table.
//!
//! Shards of a [`DashMap`] map keys to `Arc<Mutex<Transaction>>`. Lookups
//! clone the `Arc` and drop the shard guard before locking the transaction,
//! so a shard lock is never held while transaction logic runs. That lets the
//! runtime remove a transaction from the table while holding its lock.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use tracing::{debug, trace};
use voxcore_sip_core::{Request, SipMessage};

use super::core::Transaction;
use super::key::TransactionKey;
use super::timer::TimerSettings;
use crate::errors::{Error, Result};

/// Owned lock on a transaction, independent of the table's borrow
pub type TransactionGuard = ArcMutexGuard<RawMutex, Transaction>;

pub type SharedTransaction = Arc<Mutex<Transaction>>;

#[derive(Debug, Default)]
pub struct TransactionTable {
    map: DashMap<TransactionKey, SharedTransaction>,
    limit: Option<usize>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that refuses new transactions once `limit` are live
    pub fn with_limit(limit: Option<usize>) -> Self {
        TransactionTable {
            map: DashMap::new(),
            limit,
        }
    }

    /// Create and register a client transaction for `request`
    pub fn create_uac(
        &self,
        request: Request,
        destination: SocketAddr,
        reliable: bool,
        settings: TimerSettings,
    ) -> Result<SharedTransaction> {
        self.insert(Transaction::new_uac(request, destination, reliable, settings)?)
    }

    /// Create and register a server transaction for a received `request`
    pub fn create_uas(
        &self,
        request: Request,
        source: SocketAddr,
        reliable: bool,
        settings: TimerSettings,
    ) -> Result<SharedTransaction> {
        self.insert(Transaction::new_uas(request, source, reliable, settings)?)
    }

    /// Register an already built transaction.
    ///
    /// Fails with `BadArgument` if the key is taken, and with
    /// `CapacityExceeded` if the table is full.
    pub fn insert(&self, transaction: Transaction) -> Result<SharedTransaction> {
        if let Some(limit) = self.limit {
            if self.map.len() >= limit {
                return Err(Error::CapacityExceeded("transaction table is full"));
            }
        }
        match self.map.entry(transaction.key().clone()) {
            Entry::Occupied(entry) => Err(Error::bad_argument(format!(
                "transaction {} already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                trace!(key = %entry.key(), "transaction registered");
                let shared = Arc::new(Mutex::new(transaction));
                entry.insert(shared.clone());
                Ok(shared)
            }
        }
    }

    pub fn find(&self, key: &TransactionKey) -> Option<SharedTransaction> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    /// Lock the transaction stored under `key`
    pub fn lock(&self, key: &TransactionKey) -> Option<TransactionGuard> {
        self.find(key).map(|shared| shared.lock_arc())
    }

    /// Find the transaction an incoming message belongs to and lock it.
    ///
    /// `Ok(None)` means no match: a request then needs a new server
    /// transaction, a response is stray. A message whose key cannot be
    /// computed is rejected with `BadArgument`.
    pub fn find_and_lock(&self, message: &SipMessage) -> Result<Option<TransactionGuard>> {
        let key = TransactionKey::for_incoming(message)?;
        Ok(self.lock(&key))
    }

    pub fn remove(&self, key: &TransactionKey) -> Option<SharedTransaction> {
        let removed = self.map.remove(key).map(|(_, shared)| shared);
        if removed.is_some() {
            debug!(key = %key, remaining = self.map.len(), "transaction removed");
        }
        removed
    }

    pub fn contains(&self, key: &TransactionKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> Vec<TransactionKey> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop terminated transactions that are still registered.
    ///
    /// Transactions locked by someone else are skipped; whoever holds the
    /// lock is responsible for them.
    pub fn collect_garbage(&self) -> usize {
        let before = self.map.len();
        self.map.retain(|_, shared| {
            shared
                .try_lock()
                .map_or(true, |transaction| !transaction.is_terminated())
        });
        let collected = before.saturating_sub(self.map.len());
        if collected > 0 {
            debug!(collected, "terminated transactions collected");
        }
        collected
    }
}
