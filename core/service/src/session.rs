//! Session objects and the in-memory session registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;
use zbus::object_server::ObjectServer;
use zbus::zvariant::OwnedObjectPath;

use crate::error::{Error, Result};
use crate::state::ServiceState;
use wslss_common::Result as CommonResult;
use wslss_crypto::{decrypt, encrypt, SessionKey};

/// Transport context negotiated by OpenSession.
///
/// `key` is absent for plain sessions. Dropping a record (or any clone
/// of it) wipes the key bytes.
#[derive(Clone, Default)]
pub struct SessionRecord {
    key: Option<SessionKey>,
}

impl SessionRecord {
    /// A cleartext session.
    pub fn plain() -> Self {
        Self { key: None }
    }

    /// A session encrypting with the negotiated AES-128 key.
    pub fn encrypted(key: SessionKey) -> Self {
        Self { key: Some(key) }
    }

    /// Whether this session encrypts its payloads.
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }

    /// Encodes plaintext for the bus.
    ///
    /// Identity for plain sessions; AES-128-CBC under a fresh IV for DH
    /// sessions. Returns `(parameters, value)`.
    pub fn encode(&self, plaintext: &[u8]) -> CommonResult<(Vec<u8>, Vec<u8>)> {
        match &self.key {
            None => Ok((Vec::new(), plaintext.to_vec())),
            Some(key) => encrypt(key, plaintext),
        }
    }

    /// Decodes a secret received from the bus.
    pub fn decode(&self, parameters: &[u8], value: &[u8]) -> CommonResult<Vec<u8>> {
        match &self.key {
            None => Ok(value.to_vec()),
            Some(key) => decrypt(key, parameters, value),
        }
    }
}

/// Open sessions keyed by their bus path.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an open session.
    pub fn insert(&self, path: String, record: SessionRecord) {
        self.sessions.lock().unwrap().insert(path, record);
    }

    /// Returns a copy of the session record; the clone wipes its key
    /// independently when dropped.
    pub fn get(&self, path: &str) -> Option<SessionRecord> {
        self.sessions.lock().unwrap().get(path).cloned()
    }

    /// Removes a session, wiping its key. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.sessions.lock().unwrap().remove(path).is_some()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Whether no sessions are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The org.freedesktop.Secret.Session object.
pub struct Session {
    path: OwnedObjectPath,
    state: Arc<ServiceState>,
}

impl Session {
    pub(crate) fn new(path: OwnedObjectPath, state: Arc<ServiceState>) -> Self {
        Self { path, state }
    }
}

#[zbus::interface(name = "org.freedesktop.Secret.Session")]
impl Session {
    /// Closes the session, wiping its transport key and removing the
    /// object from the bus.
    async fn close(&self, #[zbus(object_server)] server: &ObjectServer) -> Result<()> {
        self.state.activity.touch();
        self.state.sessions.remove(self.path.as_str());
        server
            .remove::<Self, _>(self.path.as_str())
            .await
            .map_err(Error::ZBus)?;
        debug!(session = %self.path, "session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wslss_crypto::SESSION_KEY_LENGTH;

    fn key(byte: u8) -> SessionKey {
        SessionKey::from_bytes([byte; SESSION_KEY_LENGTH])
    }

    #[test]
    fn test_plain_record_passes_bytes_through() {
        let record = SessionRecord::plain();
        let (parameters, value) = record.encode(b"raw").unwrap();
        assert!(parameters.is_empty());
        assert_eq!(value, b"raw");
        assert_eq!(record.decode(&parameters, &value).unwrap(), b"raw");
    }

    #[test]
    fn test_encrypted_record_round_trips() {
        let record = SessionRecord::encrypted(key(1));
        let (parameters, value) = record.encode(b"my-secure-password-123").unwrap();
        assert_eq!(parameters.len(), 16);
        assert_ne!(value, b"my-secure-password-123");
        assert_eq!(
            record.decode(&parameters, &value).unwrap(),
            b"my-secure-password-123"
        );
    }

    #[test]
    fn test_records_from_different_sessions_are_isolated() {
        let one = SessionRecord::encrypted(key(1));
        let two = SessionRecord::encrypted(key(2));
        let plaintext = b"encrypted-test-value".to_vec();
        let (parameters, value) = one.encode(&plaintext).unwrap();
        assert_ne!(two.decode(&parameters, &value).ok(), Some(plaintext));
    }

    #[test]
    fn test_encrypted_record_requires_full_iv() {
        let record = SessionRecord::encrypted(key(3));
        let (_, value) = record.encode(b"x").unwrap();
        assert!(record.decode(&[], &value).is_err());
        assert!(record.decode(&[0u8; 15], &value).is_err());
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let registry = SessionRegistry::new();
        let path = "/org/freedesktop/secrets/session/abc".to_string();
        registry.insert(path.clone(), SessionRecord::plain());

        assert!(registry.get(&path).is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&path));
        assert!(registry.get(&path).is_none());
        assert!(!registry.remove(&path));
        assert!(registry.is_empty());
    }
}
