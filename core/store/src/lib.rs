//! Persistent metadata for Secret Service collections and items.
//!
//! Only metadata (labels, attributes, timestamps, content type) lives
//! here. The actual secret payloads are stored by the credential backend
//! under `wsl-ss/<collection>/<uuid>` targets.

pub mod store;

pub use store::{CollectionMeta, ItemMeta, ItemRef, Store, METADATA_FILENAME};
