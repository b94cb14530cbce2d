//! AES-128-CBC transport encryption with PKCS#7 padding.
//!
//! Every encryption draws a fresh random IV, which travels in the
//! Secret's `parameters` field. Unpadding is strict: any malformed
//! padding pattern is rejected.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::keys::SessionKey;
use wslss_common::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block size in bytes; IVs are exactly this long.
pub const BLOCK_SIZE: usize = 16;

/// Encrypts plaintext under a fresh random IV.
///
/// Returns `(iv, ciphertext)`.
pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes128CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| Error::Crypto(format!("init cipher: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    Ok((iv.to_vec(), ciphertext))
}

/// Decrypts AES-128-CBC ciphertext and strips its PKCS#7 padding.
///
/// # Errors
/// - IV is not exactly [`BLOCK_SIZE`] bytes
/// - Ciphertext is empty or not a multiple of the block size
/// - Padding is malformed
pub fn decrypt(key: &SessionKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != BLOCK_SIZE {
        return Err(Error::Crypto(format!(
            "expected {BLOCK_SIZE}-byte IV, got {}",
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto(
            "ciphertext length is not a positive multiple of the block size".to_string(),
        ));
    }

    let cipher = Aes128CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|e| Error::Crypto(format!("init cipher: {e}")))?;
    let padded = cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| Error::Crypto("decrypt ciphertext".to_string()))?;
    pkcs7_unpad(padded)
}

/// Strips PKCS#7 padding.
///
/// Rejects a pad length of zero, longer than a block, or longer than the
/// buffer, and any padding byte that does not equal the pad length.
pub fn pkcs7_unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let Some(&last) = data.last() else {
        return Err(Error::Crypto("empty padded data".to_string()));
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return Err(Error::Crypto("invalid PKCS#7 padding".to_string()));
    }
    if data[data.len() - pad..].iter().any(|&b| b != last) {
        return Err(Error::Crypto("invalid PKCS#7 padding byte".to_string()));
    }
    data.truncate(data.len() - pad);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SESSION_KEY_LENGTH;

    fn test_key(byte: u8) -> SessionKey {
        SessionKey::from_bytes([byte; SESSION_KEY_LENGTH])
    }

    #[test]
    fn test_round_trip() {
        let key = test_key(1);
        for plaintext in [
            b"".as_slice(),
            b"a".as_slice(),
            b"exactly sixteen!".as_slice(),
            b"my-secure-password-123".as_slice(),
        ] {
            let (iv, ciphertext) = encrypt(&key, plaintext).unwrap();
            assert_eq!(iv.len(), BLOCK_SIZE);
            assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
            let decrypted = decrypt(&key, &iv, &ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_each_encryption_uses_a_fresh_iv() {
        let key = test_key(2);
        let (iv1, _) = encrypt(&key, b"same input").unwrap();
        let (iv2, _) = encrypt(&key, b"same input").unwrap();
        assert_ne!(iv1, iv2);
    }

    #[test]
    fn test_other_session_key_cannot_recover_plaintext() {
        let plaintext = b"encrypted-test-value".to_vec();
        let (iv, ciphertext) = encrypt(&test_key(3), &plaintext).unwrap();

        // Either the padding check fails or the output is garbage; it
        // must never be the original plaintext.
        let result = decrypt(&test_key(4), &iv, &ciphertext).ok();
        assert_ne!(result, Some(plaintext));
    }

    #[test]
    fn test_rejects_bad_ciphertext_length() {
        let key = test_key(5);
        assert!(decrypt(&key, &[0u8; 16], &[]).is_err());
        assert!(decrypt(&key, &[0u8; 16], &[1u8; 15]).is_err());
        assert!(decrypt(&key, &[0u8; 16], &[1u8; 17]).is_err());
    }

    #[test]
    fn test_rejects_bad_iv_length() {
        let key = test_key(6);
        let (_, ciphertext) = encrypt(&key, b"x").unwrap();
        assert!(decrypt(&key, &[0u8; 15], &ciphertext).is_err());
        assert!(decrypt(&key, &[], &ciphertext).is_err());
    }

    #[test]
    fn test_unpad_accepts_valid_patterns() {
        assert_eq!(pkcs7_unpad(vec![b'a', b'b', 2, 2]).unwrap(), b"ab");
        // A full block of padding is what an aligned plaintext produces.
        assert_eq!(pkcs7_unpad(vec![16u8; 16]).unwrap(), b"");
    }

    #[test]
    fn test_unpad_rejects_invalid_patterns() {
        assert!(pkcs7_unpad(vec![]).is_err());
        assert!(pkcs7_unpad(vec![b'a', 0]).is_err());
        assert!(pkcs7_unpad(vec![b'a', 17]).is_err());
        assert!(pkcs7_unpad(vec![b'a', 3]).is_err());
        assert!(pkcs7_unpad(vec![b'a', 1, 2]).is_err());
        assert!(pkcs7_unpad(vec![2, 3, 3, 2]).is_err());
    }
}
