//! Session Persistence
//!
//! The checkout aggregate and the cart survive a restart as one JSON
//! snapshot under a fixed key. Reducers stay pure; the orchestrator saves a
//! snapshot after every mutation through [`CheckoutStore`].

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::error::{CheckoutError, Result};
use crate::state::CheckoutState;

/// Fixed key the session is stored under
pub const STORAGE_KEY: &str = "storefront.checkout";

/// Everything that must survive a reload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub checkout: CheckoutState,
    #[serde(default)]
    pub cart: Cart,
}

/// Session store trait for persistence
pub trait CheckoutStore: Send + Sync {
    /// Load the saved snapshot, if any
    fn load(&self) -> Result<Option<SessionSnapshot>>;

    /// Save (overwrite) the snapshot
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Forget the snapshot
    fn clear(&self) -> Result<()>;
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct MemoryCheckoutStore {
    snapshot: RwLock<Option<String>>,
}

impl MemoryCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot, as if left behind by a previous run
    pub fn with_snapshot(snapshot: &SessionSnapshot) -> Result<Self> {
        let store = Self::new();
        store.save(snapshot)?;
        Ok(store)
    }
}

fn poisoned<T>(_: T) -> CheckoutError {
    CheckoutError::Storage("store lock poisoned".into())
}

impl CheckoutStore for MemoryCheckoutStore {
    fn load(&self) -> Result<Option<SessionSnapshot>> {
        let guard = self.snapshot.read().map_err(poisoned)?;
        guard
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(CheckoutError::from)
    }

    // stored serialized so tests exercise the same encoding as the file store
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        *self.snapshot.write().map_err(poisoned)? = Some(json);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.snapshot.write().map_err(poisoned)? = None;
        Ok(())
    }
}

/// JSON file store: `<dir>/storefront.checkout.json`
pub struct FileCheckoutStore {
    path: PathBuf,
}

impl FileCheckoutStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Directory from `CHECKOUT_STATE_DIR`, defaulting to `.checkout`
    pub fn from_env() -> Self {
        let dir = std::env::var("CHECKOUT_STATE_DIR").unwrap_or_else(|_| ".checkout".into());
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckoutStore for FileCheckoutStore {
    fn load(&self) -> Result<Option<SessionSnapshot>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // write-then-rename so a crash never leaves a truncated snapshot
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved checkout snapshot");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CheckoutStep, PaymentStatus};

    fn pending_snapshot() -> SessionSnapshot {
        let mut checkout = CheckoutState::new();
        checkout.go_to_step(CheckoutStep::CardAndDelivery).unwrap();
        checkout.go_to_step(CheckoutStep::Summary).unwrap();
        checkout.set_transaction_id("tx_123".into());
        checkout.go_to_step(CheckoutStep::Processing).unwrap();
        checkout.set_payment_result(Some(PaymentStatus::Pending), None, None);
        SessionSnapshot { checkout, cart: Cart::new() }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCheckoutStore::new();
        assert!(store.load().unwrap().is_none());

        let snapshot = pending_snapshot();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = pending_snapshot();

        FileCheckoutStore::new(dir.path()).save(&snapshot).unwrap();

        let reopened = FileCheckoutStore::new(dir.path());
        assert!(reopened.path().ends_with("storefront.checkout.json"));
        assert_eq!(reopened.load().unwrap(), Some(snapshot));

        reopened.clear().unwrap();
        reopened.clear().unwrap();
        assert!(reopened.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckoutStore::new(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(CheckoutError::Serialization(_))));
    }
}
