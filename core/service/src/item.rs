//! Item objects.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;
use zbus::object_server::{ObjectServer, SignalEmitter};
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

use crate::collection::{self, Collection};
use crate::error::{Error, Result};
use crate::secret::{Secret, DEFAULT_CONTENT_TYPE};
use crate::service::owned_path;
use crate::state::ServiceState;
use wslss_bridge::item_target;
use wslss_common::paths;

/// An org.freedesktop.Secret.Item object at
/// `/org/freedesktop/secrets/collection/<name>/<uuid>`.
///
/// Holds a connection handle so property writes can emit ItemChanged at
/// the owning collection's path.
pub struct Item {
    collection: String,
    uuid: String,
    state: Arc<ServiceState>,
    connection: Connection,
}

impl Item {
    pub(crate) fn new(
        collection: &str,
        uuid: &str,
        state: Arc<ServiceState>,
        connection: Connection,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            uuid: uuid.to_string(),
            state,
            connection,
        }
    }

    /// Vault target of this item's payload.
    fn target(&self) -> String {
        item_target(&self.collection, &self.uuid)
    }
}

#[zbus::interface(name = "org.freedesktop.Secret.Item")]
impl Item {
    /// Deletes this item from the vault (best effort) and the store,
    /// then removes it from the bus. The prompt position is always `/`.
    async fn delete(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<OwnedObjectPath> {
        self.state.activity.touch();

        let target = self.target();
        if let Err(e) = self.state.backend.delete(&target).await {
            // Metadata may exist without a payload ever being written.
            if !e.is_not_found() {
                warn!("delete vault entry {target:?}: {e}");
            }
        }

        self.state
            .store
            .delete_item(&self.collection, &self.uuid)
            .map_err(|e| Error::NoSuchObject(e.to_string()))?;

        unexport_item(server, &self.collection, &self.uuid).await;

        let item_path = owned_path(&paths::item_path(&self.collection, &self.uuid))?;
        notify_item_deleted(server, &self.connection, &self.collection, item_path).await;

        owned_path(paths::NO_PROMPT)
    }

    /// Returns this item's secret, encoded for the given session.
    async fn get_secret(&self, session: ObjectPath<'_>) -> Result<Secret> {
        self.state.activity.touch();

        let record = self
            .state
            .sessions
            .get(session.as_str())
            .ok_or_else(|| Error::NoSession(format!("session {session} is not open")))?;

        let meta = self
            .state
            .store
            .get_item(&self.collection, &self.uuid)
            .ok_or_else(|| {
                Error::NoSuchObject(format!(
                    "item {}/{} not found",
                    self.collection, self.uuid
                ))
            })?;

        let payload = self
            .state
            .backend
            .get(&self.target())
            .await
            .map_err(|e| Error::IsLocked(format!("retrieve secret: {e}")))?;

        let content_type = if meta.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            meta.content_type
        };

        let (parameters, value) = record
            .encode(&payload)
            .map_err(|e| Error::failed(format!("encrypt secret: {e}")))?;

        Ok(Secret {
            session: session.into(),
            parameters,
            value,
            content_type,
        })
    }

    /// Replaces this item's secret and content type, bumping the
    /// modified timestamps.
    async fn set_secret(&self, secret: Secret) -> Result<()> {
        self.state.activity.touch();

        let record = self
            .state
            .sessions
            .get(secret.session.as_str())
            .ok_or_else(|| {
                Error::NoSession(format!("session {} is not open", secret.session))
            })?;

        let plaintext = record
            .decode(&secret.parameters, &secret.value)
            .map_err(|e| Error::failed(format!("decrypt secret: {e}")))?;

        self.state
            .backend
            .set(&self.target(), &plaintext)
            .await
            .map_err(|e| Error::failed(format!("store secret: {e}")))?;

        if let Some(mut meta) = self.state.store.get_item(&self.collection, &self.uuid) {
            meta.content_type = secret.content_type.clone();
            if let Err(e) = self.state.store.update_item(&self.collection, &self.uuid, meta) {
                warn!("update item metadata after SetSecret: {e}");
            }
        }

        let item_path = owned_path(&paths::item_path(&self.collection, &self.uuid))?;
        notify_item_changed(&self.connection, &self.collection, item_path).await;
        Ok(())
    }

    /// Items are never locked.
    #[zbus(property)]
    async fn locked(&self) -> bool {
        false
    }

    /// Lookup attributes. Writes persist through the store before the
    /// properties-changed signal goes out.
    #[zbus(property)]
    async fn attributes(&self) -> HashMap<String, String> {
        self.state
            .store
            .get_item(&self.collection, &self.uuid)
            .map(|m| m.attributes)
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn set_attributes(
        &self,
        attributes: HashMap<String, String>,
    ) -> zbus::fdo::Result<()> {
        self.state.activity.touch();

        let mut meta = self
            .state
            .store
            .get_item(&self.collection, &self.uuid)
            .ok_or_else(|| {
                zbus::fdo::Error::Failed(format!(
                    "item {}/{} not found",
                    self.collection, self.uuid
                ))
            })?;
        meta.attributes = attributes;
        self.state
            .store
            .update_item(&self.collection, &self.uuid, meta)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        if let Ok(item_path) = owned_path(&paths::item_path(&self.collection, &self.uuid)) {
            notify_item_changed(&self.connection, &self.collection, item_path).await;
        }
        Ok(())
    }

    /// Display label.
    #[zbus(property)]
    async fn label(&self) -> String {
        self.state
            .store
            .get_item(&self.collection, &self.uuid)
            .map(|m| m.label)
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn set_label(&self, label: String) -> zbus::fdo::Result<()> {
        self.state.activity.touch();

        let mut meta = self
            .state
            .store
            .get_item(&self.collection, &self.uuid)
            .ok_or_else(|| {
                zbus::fdo::Error::Failed(format!(
                    "item {}/{} not found",
                    self.collection, self.uuid
                ))
            })?;
        meta.label = label;
        self.state
            .store
            .update_item(&self.collection, &self.uuid, meta)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        if let Ok(item_path) = owned_path(&paths::item_path(&self.collection, &self.uuid)) {
            notify_item_changed(&self.connection, &self.collection, item_path).await;
        }
        Ok(())
    }

    #[zbus(property)]
    async fn created(&self) -> u64 {
        self.state
            .store
            .get_item(&self.collection, &self.uuid)
            .map(|m| m.created)
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn modified(&self) -> u64 {
        self.state
            .store
            .get_item(&self.collection, &self.uuid)
            .map(|m| m.modified)
            .unwrap_or_default()
    }
}

/// Exports an item object onto the bus.
pub(crate) async fn export_item(
    connection: &Connection,
    state: &Arc<ServiceState>,
    collection: &str,
    uuid: &str,
) -> zbus::Result<bool> {
    let path = paths::item_path(collection, uuid);
    connection
        .object_server()
        .at(
            path.as_str(),
            Item::new(collection, uuid, state.clone(), connection.clone()),
        )
        .await
}

/// Removes an item object from the bus.
pub(crate) async fn unexport_item(server: &ObjectServer, collection: &str, uuid: &str) {
    let path = paths::item_path(collection, uuid);
    let _ = server.remove::<Item, _>(path.as_str()).await;
}

/// Emits Collection.ItemDeleted and refreshes the Items property.
pub(crate) async fn notify_item_deleted(
    server: &ObjectServer,
    connection: &Connection,
    collection: &str,
    item_path: OwnedObjectPath,
) {
    match SignalEmitter::new(connection, paths::collection_path(collection)) {
        Ok(emitter) => {
            if let Err(e) = Collection::item_deleted(&emitter, item_path).await {
                warn!("emit ItemDeleted: {e}");
            }
        }
        Err(e) => warn!("signal emitter for collection {collection:?}: {e}"),
    }
    collection::refresh_items_property(server, collection).await;
}

/// Emits Collection.ItemChanged.
pub(crate) async fn notify_item_changed(
    connection: &Connection,
    collection: &str,
    item_path: OwnedObjectPath,
) {
    match SignalEmitter::new(connection, paths::collection_path(collection)) {
        Ok(emitter) => {
            if let Err(e) = Collection::item_changed(&emitter, item_path).await {
                warn!("emit ItemChanged: {e}");
            }
        }
        Err(e) => warn!("signal emitter for collection {collection:?}: {e}"),
    }
}
