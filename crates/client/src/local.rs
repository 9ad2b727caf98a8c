//! Device-local cart persistence.
//!
//! The anonymous cart is a JSON array of line items stored under a single
//! key. This layer is plain data access: no identity awareness, no network,
//! no business rules beyond "absent or garbled means empty".

use std::sync::Arc;

use cartsync_core::Cart;
use tracing::warn;

use crate::config::DEFAULT_STORAGE_KEY;
use crate::storage::{KeyValueStorage, StorageError};

/// Reads and writes the serialized cart under a fixed storage key.
#[derive(Clone)]
pub struct LocalCartStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl LocalCartStore {
    /// Create a store over `storage` using `key`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Create a store using the default storage key.
    #[must_use]
    pub fn with_default_key(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::new(storage, DEFAULT_STORAGE_KEY)
    }

    /// Read the stored cart.
    ///
    /// Never fails: a missing value, an unreadable backend and malformed JSON
    /// all yield an empty cart.
    #[must_use]
    pub fn read(&self) -> Cart {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Local cart storage unreadable, using empty cart");
                return Cart::new();
            }
        };

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => cart,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding malformed local cart");
                Cart::new()
            }
        }
    }

    /// Replace the stored cart in full.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the backend write fails.
    pub fn write(&self, cart: &Cart) -> Result<(), StorageError> {
        let raw = serde_json::to_string(cart)?;
        self.storage.set(&self.key, &raw)
    }

    /// Remove the stored cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend write fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }
}

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
