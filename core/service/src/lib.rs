//! D-Bus surface of the secret service daemon.
//!
//! Implements the org.freedesktop.Secret.Service interface and its
//! sub-objects (Collection, Item, Session, Prompt) as required by the
//! Freedesktop.org Secret Service specification version 0.2. Metadata
//! flows through the store crate; payloads flow through the credential
//! backend; everything else lives here: sessions and their transport
//! keys, the exported object graph, change signals, and the idle
//! supervisor.

pub mod collection;
pub mod error;
pub mod item;
pub mod prompt;
pub mod secret;
pub mod service;
pub mod session;
pub mod state;
pub mod supervisor;

pub use error::{Error, Result};
pub use secret::Secret;
pub use service::{init, Service};
pub use state::ServiceState;
pub use supervisor::{spawn_idle_monitor, Activity, Shutdown};
