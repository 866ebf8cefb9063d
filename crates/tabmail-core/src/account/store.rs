//! JSON-file account store.
//!
//! Keeps every known account plus the id of the selected one in a single
//! file. An unreadable or corrupt file is treated as empty.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::AccountInfo;
use crate::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountInfo>,
    #[serde(default)]
    current: Option<String>,
}

/// Persistent list of accounts and the current selection.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    file: AccountsFile,
}

impl AccountStore {
    /// Default location: `<data_dir>/tabmail/accounts.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("accounts.json")
    }

    /// Opens the store at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt account file");
                AccountsFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AccountsFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable account file");
                AccountsFile::default()
            }
        };

        debug!(path = %path.display(), accounts = file.accounts.len(), "opened account store");
        Self { path, file }
    }

    /// File backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All accounts in insertion order.
    #[must_use]
    pub fn list(&self) -> &[AccountInfo] {
        &self.file.accounts
    }

    /// Looks up an account by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AccountInfo> {
        self.file.accounts.iter().find(|a| a.id == id)
    }

    /// Inserts `account`, or updates the record with the same username and
    /// host (ignoring case).
    ///
    /// An update replaces display name, port, security and secret but keeps
    /// the stored id. Returns the id of the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn add_or_update(&mut self, account: AccountInfo) -> Result<String> {
        let id = if let Some(existing) = self
            .file
            .accounts
            .iter_mut()
            .find(|a| a.same_login(&account))
        {
            existing.display_name = account.display_name;
            existing.port = account.port;
            existing.security = account.security;
            existing.secret = account.secret;
            existing.id.clone()
        } else {
            let id = self.next_id();
            self.file.accounts.push(AccountInfo {
                id: id.clone(),
                ..account
            });
            id
        };

        self.save().await?;
        Ok(id)
    }

    /// Selects the account with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] for an unknown id, or an error if
    /// the file cannot be written.
    pub async fn set_current(&mut self, id: &str) -> Result<()> {
        if self.get(id).is_none() {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        self.file.current = Some(id.to_string());
        self.save().await
    }

    /// The selected account, if any.
    #[must_use]
    pub fn current(&self) -> Option<&AccountInfo> {
        self.file.current.as_deref().and_then(|id| self.get(id))
    }

    /// Deletes an account. Removing the selected account clears the
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] for an unknown id, or an error if
    /// the file cannot be written.
    pub async fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.file.accounts.len();
        self.file.accounts.retain(|a| a.id != id);
        if self.file.accounts.len() == before {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        if self.file.current.as_deref() == Some(id) {
            self.file.current = None;
        }
        self.save().await
    }

    fn next_id(&self) -> String {
        let max = self
            .file
            .accounts
            .iter()
            .filter_map(|a| a.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(&self.file)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::account::Security;
    use tempfile::TempDir;

    fn account(user: &str, host: &str, secret: &str) -> AccountInfo {
        AccountInfo::new(host, 995, Security::Tls, user, secret)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.json")).await;
        assert!(store.list().is_empty());
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        tokio::fs::write(&path, "[[[").await.unwrap();

        let store = AccountStore::open(&path).await;
        assert!(store.list().is_empty());
    }

    #[tokio::test]
    async fn test_add_or_update_keeps_one_record_per_login() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let mut store = AccountStore::open(&path).await;

        let first = store
            .add_or_update(account("Bob@Example.com", "pop.example.com", "old"))
            .await
            .unwrap();

        let mut changed = account("bob@example.com", "POP.EXAMPLE.COM", "new");
        changed.port = 110;
        changed.display_name = "Bob".to_string();
        let second = store.add_or_update(changed).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list().len(), 1);
        let stored = &store.list()[0];
        assert_eq!(stored.secret, "new");
        assert_eq!(stored.port, 110);
        assert_eq!(stored.display_name, "Bob");
        // Identity fields keep their original spelling
        assert_eq!(stored.username, "Bob@Example.com");
    }

    #[tokio::test]
    async fn test_distinct_logins_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let mut store = AccountStore::open(dir.path().join("a.json")).await;

        let a = store.add_or_update(account("a", "h", "1")).await.unwrap();
        let b = store.add_or_update(account("b", "h", "1")).await.unwrap();
        let c = store.add_or_update(account("a", "other", "1")).await.unwrap();

        assert_eq!(store.list().len(), 3);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[tokio::test]
    async fn test_current_persists_across_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("accounts.json");

        let mut store = AccountStore::open(&path).await;
        let id = store.add_or_update(account("a", "h", "1")).await.unwrap();
        store.set_current(&id).await.unwrap();

        let reopened = AccountStore::open(&path).await;
        assert_eq!(reopened.current().unwrap().username, "a");
    }

    #[tokio::test]
    async fn test_set_current_unknown() {
        let dir = TempDir::new().unwrap();
        let mut store = AccountStore::open(dir.path().join("a.json")).await;
        assert!(matches!(
            store.set_current("42").await,
            Err(Error::AccountNotFound(id)) if id == "42"
        ));
    }

    #[tokio::test]
    async fn test_remove_clears_current() {
        let dir = TempDir::new().unwrap();
        let mut store = AccountStore::open(dir.path().join("a.json")).await;
        let id = store.add_or_update(account("a", "h", "1")).await.unwrap();
        store.set_current(&id).await.unwrap();

        store.remove(&id).await.unwrap();
        assert!(store.list().is_empty());
        assert!(store.current().is_none());
        assert!(store.remove(&id).await.is_err());
    }
}
