//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a session transport key in bytes (AES-128).
pub const SESSION_KEY_LENGTH: usize = 16;

/// AES-128 key negotiated for one session.
///
/// Derived from the DH shared secret on `OpenSession` and wiped when the
/// session record is dropped. Clones zeroize independently.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_LENGTH],
}

impl SessionKey {
    /// Create a session key from raw bytes.
    pub fn from_bytes(key: [u8; SESSION_KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key_bytes() {
        let key = SessionKey::from_bytes([0xAB; SESSION_KEY_LENGTH]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("ab"));
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_round_trip() {
        let bytes = [7u8; SESSION_KEY_LENGTH];
        let key = SessionKey::from_bytes(bytes);
        assert_eq!(key.as_bytes(), &bytes);
    }
}
