//! Cryptographic primitives for the Secret Service transport.
//!
//! This module provides:
//! - Key agreement for dh-ietf1024-sha256-aes128-cbc-pkcs7 (RFC 2409
//!   Oakley Group 2, SHA-256 key derivation)
//! - AES-128-CBC transport encryption with PKCS#7 padding
//! - Session key management with automatic zeroization
//!
//! # Security Guarantees
//! - Private exponents, shared secrets, and session keys are zeroized
//!   when released
//! - No key material is ever logged or exposed through Debug output

pub mod cipher;
pub mod dh;
pub mod keys;

pub use cipher::{decrypt, encrypt, pkcs7_unpad, BLOCK_SIZE};
pub use dh::{DhKeyPair, GROUP_SIZE};
pub use keys::{SessionKey, SESSION_KEY_LENGTH};
