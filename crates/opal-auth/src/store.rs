use std::sync::{Arc, RwLock};

use crate::account::{Account, AccountCollection};
use crate::errors::{AuthError, Result};

/// Result of loading the account collection
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub collection: AccountCollection,
    /// True when a corrupt or unreadable file was replaced with an empty,
    /// schema-valid collection; surface this to the user.
    pub reinitialized: bool,
}

/// Durable persistence of all known accounts and the active-account
/// pointer.
///
/// Passed explicitly to callers rather than living in a process-wide
/// singleton, so tests can substitute an in-memory or temp-directory
/// backed store.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Load the full collection, creating an empty one if the backing
    /// storage is absent or unreadable
    async fn load(&self) -> Result<LoadReport>;

    /// Insert or replace an account keyed by its local id
    async fn upsert(&self, account: Account) -> Result<()>;

    /// Remove an account; clears the active pointer if it pointed there
    async fn remove(&self, local_id: &str) -> Result<()>;

    /// Mark one account active. At most one account is active at a time.
    async fn set_active(&self, local_id: &str) -> Result<()>;

    /// The currently active account, if any
    async fn get_active(&self) -> Result<Option<Account>>;

    /// All known accounts
    async fn list(&self) -> Result<Vec<Account>>;
}

/// In-memory account store for tests and previews
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    collection: Arc<RwLock<AccountCollection>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            collection: Arc::new(RwLock::new(AccountCollection::new())),
        }
    }
}

fn poisoned() -> AuthError {
    AuthError::InvalidResponse("Account store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl AccountStore for MemoryAccountStore {
    async fn load(&self) -> Result<LoadReport> {
        let collection = self.collection.read().map_err(|_| poisoned())?.clone();
        Ok(LoadReport {
            collection,
            reinitialized: false,
        })
    }

    async fn upsert(&self, account: Account) -> Result<()> {
        let mut collection = self.collection.write().map_err(|_| poisoned())?;
        collection
            .accounts
            .insert(account.local_id.clone(), account);
        Ok(())
    }

    async fn remove(&self, local_id: &str) -> Result<()> {
        let mut collection = self.collection.write().map_err(|_| poisoned())?;
        collection.accounts.remove(local_id);
        if collection.active_account_local_id.as_deref() == Some(local_id) {
            collection.active_account_local_id = None;
        }
        Ok(())
    }

    async fn set_active(&self, local_id: &str) -> Result<()> {
        let mut collection = self.collection.write().map_err(|_| poisoned())?;
        if !collection.accounts.contains_key(local_id) {
            return Err(AuthError::AccountNotFound(local_id.to_string()));
        }
        collection.active_account_local_id = Some(local_id.to_string());
        Ok(())
    }

    async fn get_active(&self) -> Result<Option<Account>> {
        let collection = self.collection.read().map_err(|_| poisoned())?;
        Ok(collection.active().cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let collection = self.collection.read().map_err(|_| poisoned())?;
        Ok(collection.accounts.values().cloned().collect())
    }
}
