//! File-backed account store, schema-compatible with the official
//! launcher's `launcher_accounts.json`.
//!
//! The backing file is shared with the official launcher between runs, so
//! there is no in-process lock: every mutation re-reads the file, applies
//! the change, and atomically replaces the file (serialize to a temp
//! sibling, fsync, rename). Concurrent writers are last-writer-wins at
//! the file level, but a write is never observable half-done.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::account::{Account, AccountCollection};
use crate::errors::{AuthError, Result};
use crate::store::{AccountStore, LoadReport};

pub const ACCOUNTS_FILE: &str = "launcher_accounts.json";

/// Account store backed by `launcher_accounts.json`
#[derive(Debug, Clone)]
pub struct FileAccountStore {
    path: PathBuf,
}

impl FileAccountStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The official launcher's accounts file inside the platform's
    /// `.minecraft` directory
    pub fn default_path() -> Result<PathBuf> {
        let base = directories::BaseDirs::new().ok_or_else(|| {
            AuthError::InvalidResponse("Could not determine home directory".to_string())
        })?;

        let minecraft_dir = if cfg!(target_os = "macos") {
            base.home_dir().join("Library/Application Support/minecraft")
        } else if cfg!(target_os = "windows") {
            base.data_dir().join(".minecraft")
        } else {
            base.home_dir().join(".minecraft")
        };

        Ok(minecraft_dir.join(ACCOUNTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the collection from disk. A missing file yields a fresh empty
    /// collection; a corrupt file is replaced with one (flagged so the
    /// caller can notify the user).
    async fn read_collection(&self) -> Result<(AccountCollection, bool)> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Accounts file absent, starting with an empty collection");
                return Ok((AccountCollection::new(), false));
            }
            Err(e) => {
                warn!("Accounts file unreadable ({}), reinitializing", e);
                let fresh = AccountCollection::new();
                self.write_collection(&fresh).await?;
                return Ok((fresh, true));
            }
        };

        match serde_json::from_str(&content) {
            Ok(collection) => Ok((collection, false)),
            Err(e) => {
                warn!("Accounts file corrupt ({}), reinitializing", e);
                let fresh = AccountCollection::new();
                self.write_collection(&fresh).await?;
                Ok((fresh, true))
            }
        }
    }

    /// Serialize to a temp sibling, sync, then atomically rename over the
    /// real file so partial writes are never observable.
    async fn write_collection(&self, collection: &AccountCollection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(collection)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json).await?;

        let file = std::fs::File::open(&temp_path)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for FileAccountStore {
    async fn load(&self) -> Result<LoadReport> {
        let (collection, reinitialized) = self.read_collection().await?;
        Ok(LoadReport {
            collection,
            reinitialized,
        })
    }

    async fn upsert(&self, account: Account) -> Result<()> {
        let (mut collection, _) = self.read_collection().await?;
        collection
            .accounts
            .insert(account.local_id.clone(), account);
        self.write_collection(&collection).await
    }

    async fn remove(&self, local_id: &str) -> Result<()> {
        let (mut collection, _) = self.read_collection().await?;
        collection.accounts.remove(local_id);
        if collection.active_account_local_id.as_deref() == Some(local_id) {
            collection.active_account_local_id = None;
        }
        self.write_collection(&collection).await
    }

    async fn set_active(&self, local_id: &str) -> Result<()> {
        let (mut collection, _) = self.read_collection().await?;
        if !collection.accounts.contains_key(local_id) {
            return Err(AuthError::AccountNotFound(local_id.to_string()));
        }
        collection.active_account_local_id = Some(local_id.to_string());
        self.write_collection(&collection).await
    }

    async fn get_active(&self) -> Result<Option<Account>> {
        let (collection, _) = self.read_collection().await?;
        Ok(collection.active().cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let (collection, _) = self.read_collection().await?;
        Ok(collection.accounts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::McProfile;
    use crate::session::McToken;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> FileAccountStore {
        FileAccountStore::new(temp.path().join(ACCOUNTS_FILE))
    }

    fn account(name: &str) -> Account {
        Account::from_login(
            &McToken::new("token".to_string(), 86400),
            McProfile {
                id: format!("{name}-id"),
                name: name.to_string(),
            },
            Some("refresh".to_string()),
        )
    }

    #[tokio::test]
    async fn missing_file_loads_empty_without_reinit_flag() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let report = store.load().await.unwrap();
        assert!(report.collection.accounts.is_empty());
        assert!(!report.reinitialized);
        // A plain load must not create the file
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn upsert_then_list_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let account = account("Steve");
        let local_id = account.local_id.clone();
        store.upsert(account.clone()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], account);

        // The client token persists across loads
        let first = store.load().await.unwrap().collection.mojang_client_token;
        store.set_active(&local_id).await.unwrap();
        let second = store.load().await.unwrap().collection.mojang_client_token;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced_and_flagged() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        tokio::fs::write(store.path(), "not json {{{").await.unwrap();

        let report = store.load().await.unwrap();
        assert!(report.reinitialized);
        assert!(report.collection.accounts.is_empty());

        // A second load sees the replacement file, now valid
        let report = store.load().await.unwrap();
        assert!(!report.reinitialized);
    }

    #[tokio::test]
    async fn active_pointer_survives_restart() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(ACCOUNTS_FILE);

        let account = account("Steve");
        let local_id = account.local_id.clone();
        {
            let store = FileAccountStore::new(&path);
            store.upsert(account).await.unwrap();
            store.set_active(&local_id).await.unwrap();
        }

        let store = FileAccountStore::new(&path);
        let active = store.get_active().await.unwrap().unwrap();
        assert_eq!(active.local_id, local_id);
    }

    #[tokio::test]
    async fn remove_clears_active_pointer() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let account = account("Steve");
        let local_id = account.local_id.clone();
        store.upsert(account).await.unwrap();
        store.set_active(&local_id).await.unwrap();

        store.remove(&local_id).await.unwrap();
        assert!(store.get_active().await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn external_edits_between_operations_are_respected() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let ours = account("Ours");
        store.upsert(ours.clone()).await.unwrap();

        // Another launcher rewrites the file, adding an account
        let mut collection = store.load().await.unwrap().collection;
        let theirs = account("Theirs");
        let theirs_id = theirs.local_id.clone();
        collection.accounts.insert(theirs_id.clone(), theirs);
        let json = serde_json::to_string_pretty(&collection).unwrap();
        tokio::fs::write(store.path(), json).await.unwrap();

        // Our next mutation keeps their account
        store.set_active(&theirs_id).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.upsert(account("Steve")).await.unwrap();

        let mut entries = tokio::fs::read_dir(temp.path()).await.unwrap();
        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![ACCOUNTS_FILE.to_string()]);
    }
}
