//! In-memory session store and the password vault.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portalchat_core::{CredentialVault, SessionStore};
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local session store. Last writer wins.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}

struct VaultEntry {
    password: String,
    expires_at: DateTime<Utc>,
}

/// Holds the password for silent re-login. Never written to disk; entries
/// vanish after their TTL or on `clear`.
#[derive(Default, Clone)]
pub struct MemoryCredentialVault {
    entries: Arc<RwLock<HashMap<String, VaultEntry>>>,
}

impl MemoryCredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_at(&self, username: &str, now: DateTime<Utc>) -> Option<String> {
        let mut entries = self.entries.write().await;
        let entry = entries.get(username)?;
        if now < entry.expires_at {
            return Some(entry.password.clone());
        }
        debug!(username = %username, "Vault entry expired");
        entries.remove(username);
        None
    }
}

#[async_trait]
impl CredentialVault for MemoryCredentialVault {
    async fn store(&self, username: &str, password: &str, ttl: Duration) -> Result<()> {
        self.entries.write().await.insert(
            username.to_string(),
            VaultEntry {
                password: password.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }

    async fn load(&self, username: &str) -> Result<Option<String>> {
        Ok(self.load_at(username, Utc::now()).await)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_set_get_remove() {
        let store = MemorySessionStore::new();
        store.set("username", "alice").await.unwrap();
        assert_eq!(store.get("username").await.unwrap().as_deref(), Some("alice"));
        store.remove("username").await.unwrap();
        assert!(store.get("username").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_many_overwrites() {
        let store = MemorySessionStore::new();
        store.set("a", "old").await.unwrap();
        store
            .set_many(&[("a", "new".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn vault_entries_expire() {
        let vault = MemoryCredentialVault::new();
        vault.store("alice", "s3cret", Duration::hours(1)).await.unwrap();
        assert_eq!(vault.load("alice").await.unwrap().as_deref(), Some("s3cret"));

        let later = Utc::now() + Duration::hours(2);
        assert!(vault.load_at("alice", later).await.is_none());
        assert!(vault.load("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vault_clear_forgets_everything() {
        let vault = MemoryCredentialVault::new();
        vault.store("alice", "pw", Duration::hours(1)).await.unwrap();
        vault.clear().await.unwrap();
        assert!(vault.load("alice").await.unwrap().is_none());
    }
}
