//! Credential backend bridge.
//!
//! The daemon keeps secret payloads outside its own metadata store, in
//! the Windows Credential Manager reached through a short-lived helper
//! process. This crate defines the backend seam, the JSON wire messages,
//! the spawn-per-call helper bridge, and an in-memory backend for tests.

pub mod backend;
pub mod ipc;
pub mod memory;
pub mod wincred;

pub use backend::{item_target, SecretBackend, MAX_SECRET_SIZE};
pub use memory::MemoryBackend;
pub use wincred::{WincredBridge, HELPER_NAME};
