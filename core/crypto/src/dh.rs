//! Key agreement for `dh-ietf1024-sha256-aes128-cbc-pkcs7`.
//!
//! The group is RFC 2409 Oakley Group 2: a 1024-bit prime with generator
//! 2. Public values and shared secrets travel as 128 big-endian bytes
//! with leading zero padding, and the AES-128 session key is the first 16
//! bytes of SHA-256 over the padded shared secret.

use num_bigint::BigUint;
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::keys::{SessionKey, SESSION_KEY_LENGTH};
use wslss_common::{Error, Result};

/// Byte length of the group prime; the fixed serialization width for
/// public values and shared secrets.
pub const GROUP_SIZE: usize = 128;

// RFC 2409 Oakley Group 2 prime.
static PRIME: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(
        b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
          29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
          EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
          E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
          EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381\
          FFFFFFFFFFFFFFFF",
        16,
    )
    .expect("group prime constant parses")
});

static GENERATOR: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));

/// One side of a Diffie-Hellman exchange.
///
/// The private exponent lives in a zeroizing buffer and is consumed by
/// [`DhKeyPair::derive_session_key`], so it cannot outlive the agreement.
pub struct DhKeyPair {
    private: Zeroizing<Vec<u8>>,
    public: Vec<u8>,
}

impl DhKeyPair {
    /// Generates a key pair.
    ///
    /// The private exponent is 256 random bits reduced into `[2, p-2]`
    /// by `((x mod (p-2)) + 2)`.
    pub fn generate() -> Self {
        let mut raw = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut raw[..]);

        let x = BigUint::from_bytes_be(&raw[..]);
        let x = x % (&*PRIME - 2u32) + 2u32;
        let public = to_group_bytes(&GENERATOR.modpow(&x, &PRIME));

        Self {
            private: Zeroizing::new(x.to_bytes_be()),
            public,
        }
    }

    /// The public value `g^x mod p`, zero-padded to [`GROUP_SIZE`] bytes.
    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    /// Computes the shared secret against the peer's public value and
    /// derives the session key, consuming the private exponent.
    ///
    /// # Errors
    /// - Peer public key is empty.
    pub fn derive_session_key(self, peer_public: &[u8]) -> Result<SessionKey> {
        if peer_public.is_empty() {
            return Err(Error::InvalidInput("empty peer public key".to_string()));
        }

        let x = BigUint::from_bytes_be(&self.private);
        let peer = BigUint::from_bytes_be(peer_public);
        let shared = Zeroizing::new(to_group_bytes(&peer.modpow(&x, &PRIME)));

        let digest = Sha256::digest(shared.as_slice());
        let mut key = [0u8; SESSION_KEY_LENGTH];
        key.copy_from_slice(&digest[..SESSION_KEY_LENGTH]);
        Ok(SessionKey::from_bytes(key))
    }
}

/// Serializes a group element as [`GROUP_SIZE`] big-endian bytes with
/// leading zero padding.
fn to_group_bytes(n: &BigUint) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    let mut out = vec![0u8; GROUP_SIZE];
    out[GROUP_SIZE - bytes.len()..].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_value_is_group_sized() {
        let pair = DhKeyPair::generate();
        assert_eq!(pair.public_bytes().len(), GROUP_SIZE);
    }

    #[test]
    fn test_both_sides_derive_the_same_key() {
        let ours = DhKeyPair::generate();
        let theirs = DhKeyPair::generate();
        let our_public = ours.public_bytes().to_vec();
        let their_public = theirs.public_bytes().to_vec();

        let our_key = ours.derive_session_key(&their_public).unwrap();
        let their_key = theirs.derive_session_key(&our_public).unwrap();

        assert_eq!(our_key.as_bytes(), their_key.as_bytes());
    }

    #[test]
    fn test_independent_exchanges_disagree() {
        let first = {
            let a = DhKeyPair::generate();
            let b = DhKeyPair::generate();
            let b_public = b.public_bytes().to_vec();
            a.derive_session_key(&b_public).unwrap()
        };
        let second = {
            let a = DhKeyPair::generate();
            let b = DhKeyPair::generate();
            let b_public = b.public_bytes().to_vec();
            a.derive_session_key(&b_public).unwrap()
        };
        assert_ne!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_empty_peer_key_is_rejected() {
        let pair = DhKeyPair::generate();
        assert!(pair.derive_session_key(&[]).is_err());
    }

    #[test]
    fn test_group_serialization_pads_small_values() {
        let encoded = to_group_bytes(&BigUint::from(1u32));
        assert_eq!(encoded.len(), GROUP_SIZE);
        assert!(encoded[..GROUP_SIZE - 1].iter().all(|&b| b == 0));
        assert_eq!(encoded[GROUP_SIZE - 1], 1);
    }
}
