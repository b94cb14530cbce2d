//! In-memory credential backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::backend::{SecretBackend, MAX_SECRET_SIZE};
use wslss_common::{Error, Result};

/// In-memory backend.
///
/// Useful for tests and development. All payloads are stored in memory
/// and lost on drop. Enforces the same size bound as the real bridge.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.storage.read().unwrap().len()
    }

    /// Whether no payloads are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    async fn get(&self, target: &str) -> Result<Vec<u8>> {
        self.storage
            .read()
            .unwrap()
            .get(target)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("secret {target:?}")))
    }

    async fn set(&self, target: &str, secret: &[u8]) -> Result<()> {
        if secret.len() > MAX_SECRET_SIZE {
            return Err(Error::TooLarge {
                size: secret.len(),
                limit: MAX_SECRET_SIZE,
            });
        }
        self.storage
            .write()
            .unwrap()
            .insert(target.to_string(), secret.to_vec());
        Ok(())
    }

    async fn delete(&self, target: &str) -> Result<()> {
        match self.storage.write().unwrap().remove(target) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("secret {target:?}"))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .storage
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MemoryBackend::new();
        backend.set("wsl-ss/login/a", b"secret-a").await.unwrap();

        assert_eq!(backend.get("wsl-ss/login/a").await.unwrap(), b"secret-a");
        backend.delete("wsl-ss/login/a").await.unwrap();
        assert!(backend.get("wsl-ss/login/a").await.unwrap_err().is_not_found());
        assert!(backend.delete("wsl-ss/login/a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let backend = MemoryBackend::new();
        backend.set("t", b"one").await.unwrap();
        backend.set("t", b"two").await.unwrap();
        assert_eq!(backend.get("t").await.unwrap(), b"two");
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_size_bound_is_exact() {
        let backend = MemoryBackend::new();
        backend
            .set("t", &vec![0u8; MAX_SECRET_SIZE])
            .await
            .unwrap();
        let err = backend
            .set("t2", &vec![0u8; MAX_SECRET_SIZE + 1])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let backend = MemoryBackend::new();
        backend.set("wsl-ss/login/a", b"1").await.unwrap();
        backend.set("wsl-ss/work/b", b"2").await.unwrap();
        backend.set("other/c", b"3").await.unwrap();

        let mut targets = backend.list("wsl-ss/").await.unwrap();
        targets.sort();
        assert_eq!(targets, vec!["wsl-ss/login/a", "wsl-ss/work/b"]);
    }
}
