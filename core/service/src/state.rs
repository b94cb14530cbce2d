//! Shared daemon state behind the exported objects.

use std::sync::Arc;

use crate::session::SessionRegistry;
use crate::supervisor::Activity;
use wslss_bridge::SecretBackend;
use wslss_store::Store;

/// State shared by every exported object.
///
/// The store and the session registry carry their own locks; the
/// activity tracker is lock-free. Exported objects hold an `Arc` of
/// this and are otherwise stateless beyond their identity.
pub struct ServiceState {
    pub store: Store,
    pub backend: Arc<dyn SecretBackend>,
    pub sessions: SessionRegistry,
    pub activity: Arc<Activity>,
}

impl ServiceState {
    pub fn new(store: Store, backend: Arc<dyn SecretBackend>) -> Arc<Self> {
        Arc::new(Self {
            store,
            backend,
            sessions: SessionRegistry::new(),
            activity: Arc::new(Activity::new()),
        })
    }
}
