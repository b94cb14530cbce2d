//! Credential backend trait definition.

use async_trait::async_trait;

use wslss_common::Result;

/// Hard ceiling on a stored secret payload. The Windows Credential
/// Manager rejects credential blobs larger than this.
pub const MAX_SECRET_SIZE: usize = 2560;

/// Stores and retrieves raw secret bytes keyed by a target string.
///
/// Implementations hold only payloads; labels, attributes, and
/// timestamps are managed separately by the metadata store.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Returns the raw secret bytes for the given target.
    ///
    /// # Errors
    /// - `Error::NotFound` when the target does not exist
    /// - Transport or backend failure
    async fn get(&self, target: &str) -> Result<Vec<u8>>;

    /// Stores raw secret bytes under the target.
    ///
    /// Creates the entry if it does not exist; replaces it if it does.
    ///
    /// # Errors
    /// - `Error::TooLarge` when the payload exceeds [`MAX_SECRET_SIZE`]
    /// - Transport or backend failure
    async fn set(&self, target: &str, secret: &[u8]) -> Result<()>;

    /// Removes the secret for the target.
    ///
    /// # Errors
    /// - `Error::NotFound` when the target does not exist
    async fn delete(&self, target: &str) -> Result<()>;

    /// Returns every known target with the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Vault target under which an item's payload is stored.
///
/// Hyphens in the UUID are kept as-is; the underscore substitution
/// applies to bus paths only.
pub fn item_target(collection: &str, uuid: &str) -> String {
    format!("wsl-ss/{collection}/{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_target_keeps_hyphens() {
        let target = item_target("login", "ab-cd-ef");
        assert_eq!(target, "wsl-ss/login/ab-cd-ef");
    }
}
