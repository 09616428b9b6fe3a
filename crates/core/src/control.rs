use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::CollectionId;
use crate::error::{Error, Result};

/// Cooperative abort flag, checked between photos and between group units.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Registry of collections that currently have a clustering pass in flight.
#[derive(Debug, Clone, Default)]
pub struct CollectionLocks {
    held: Arc<Mutex<HashSet<CollectionId>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the exclusivity token for `collection`, or fail with
    /// `CollectionBusy` if another pass holds it.
    pub fn acquire(&self, collection: CollectionId) -> Result<CollectionGuard> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(collection) {
            return Err(Error::CollectionBusy(collection));
        }
        Ok(CollectionGuard {
            collection,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, collection: CollectionId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&collection)
    }
}

/// Proof that the holder owns the clustering pass for one collection.
/// Released on drop.
#[derive(Debug)]
pub struct CollectionGuard {
    collection: CollectionId,
    held: Arc<Mutex<HashSet<CollectionId>>>,
}

impl CollectionGuard {
    pub fn collection(&self) -> CollectionId {
        self.collection
    }
}

impl Drop for CollectionGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.collection);
    }
}
