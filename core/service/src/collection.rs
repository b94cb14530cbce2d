//! Collection objects.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use zbus::object_server::{ObjectServer, SignalEmitter};
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::Connection;

use crate::error::{Error, Result};
use crate::item;
use crate::secret::{self, Secret};
use crate::service::{owned_path, Service};
use crate::state::ServiceState;
use wslss_bridge::item_target;
use wslss_common::paths;

/// An org.freedesktop.Secret.Collection object.
///
/// Exported at `/org/freedesktop/secrets/collection/<name>` and, when
/// aliased, additionally under `/org/freedesktop/secrets/aliases/<alias>`.
pub struct Collection {
    name: String,
    state: Arc<ServiceState>,
}

impl Collection {
    pub(crate) fn new(name: &str, state: Arc<ServiceState>) -> Self {
        Self {
            name: name.to_string(),
            state,
        }
    }
}

#[zbus::interface(name = "org.freedesktop.Secret.Collection")]
impl Collection {
    /// Deletes this collection, every item in it, and (best effort) the
    /// vault entries behind them. The prompt position is always `/`.
    async fn delete(
        &self,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<OwnedObjectPath> {
        self.state.activity.touch();

        // Vault deletes are best effort; not-found just means the
        // payload was never written.
        for uuid in self.state.store.list_items(&self.name) {
            let target = item_target(&self.name, &uuid);
            if let Err(e) = self.state.backend.delete(&target).await {
                if !e.is_not_found() {
                    warn!("delete vault entry {target:?}: {e}");
                }
            }
            item::unexport_item(server, &self.name, &uuid).await;
        }

        // The store commit is authoritative; it also drops every alias
        // pointing here.
        let removed_aliases = self
            .state
            .store
            .delete_collection(&self.name)
            .map_err(|e| Error::NoSuchObject(e.to_string()))?;

        let col_path = owned_path(&paths::collection_path(&self.name))?;
        let _ = server.remove::<Self, _>(col_path.as_str()).await;
        for alias in removed_aliases {
            unexport_alias(server, &alias).await;
        }

        let service_ref = server
            .interface::<_, Service>(paths::SERVICE_PATH)
            .await
            .map_err(Error::ZBus)?;
        Service::collection_deleted(service_ref.signal_emitter(), col_path)
            .await
            .map_err(Error::ZBus)?;
        service_ref
            .get()
            .await
            .collections_changed(service_ref.signal_emitter())
            .await
            .map_err(Error::ZBus)?;

        info!(collection = %self.name, "collection deleted");
        owned_path(paths::NO_PROMPT)
    }

    /// Finds items in this collection matching the attribute query.
    async fn search_items(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<Vec<OwnedObjectPath>> {
        self.state.activity.touch();

        let refs = self
            .state
            .store
            .search_items_in_collection(&self.name, &attributes);
        let mut found = Vec::with_capacity(refs.len());
        for item_ref in refs {
            found.push(owned_path(&paths::item_path(
                &item_ref.collection,
                &item_ref.uuid,
            ))?);
        }
        Ok(found)
    }

    /// Creates an item, or replaces an existing one when `replace` is
    /// set and an attribute match exists. The prompt position is always
    /// `/`.
    async fn create_item(
        &self,
        properties: HashMap<String, OwnedValue>,
        secret: Secret,
        replace: bool,
        #[zbus(connection)] connection: &Connection,
    ) -> Result<(OwnedObjectPath, OwnedObjectPath)> {
        self.state.activity.touch();

        let record = self
            .state
            .sessions
            .get(secret.session.as_str())
            .ok_or_else(|| {
                Error::NoSession(format!("session {} is not open", secret.session))
            })?;

        let mut meta = secret::item_meta_from_properties(&properties);
        if !secret.content_type.is_empty() {
            meta.content_type = secret.content_type.clone();
        }

        // Replace reuses the first attribute match's identity.
        let uuid = if replace && !meta.attributes.is_empty() {
            self.state
                .store
                .search_items_in_collection(&self.name, &meta.attributes)
                .into_iter()
                .next()
                .map(|item_ref| item_ref.uuid)
        } else {
            None
        };
        let uuid = uuid.unwrap_or_else(|| Uuid::new_v4().to_string());

        let plaintext = record
            .decode(&secret.parameters, &secret.value)
            .map_err(|e| Error::failed(format!("decrypt secret: {e}")))?;

        // Payload first, metadata second: a failed vault write must not
        // leave a catalog entry pointing at nothing.
        let target = item_target(&self.name, &uuid);
        self.state
            .backend
            .set(&target, &plaintext)
            .await
            .map_err(|e| Error::failed(format!("store secret: {e}")))?;

        if self.state.store.get_item(&self.name, &uuid).is_some() {
            self.state
                .store
                .update_item(&self.name, &uuid, meta)
                .map_err(Error::from_internal)?;
        } else {
            self.state
                .store
                .create_item(&self.name, &uuid, meta)
                .map_err(Error::from_internal)?;
        }

        item::export_item(connection, &self.state, &self.name, &uuid)
            .await
            .map_err(|e| Error::failed(format!("export item: {e}")))?;

        let item_path = owned_path(&paths::item_path(&self.name, &uuid))?;

        // Emit at the canonical collection path even when this call came
        // in through an alias path.
        let emitter = SignalEmitter::new(connection, paths::collection_path(&self.name))
            .map_err(Error::ZBus)?;
        Self::item_created(&emitter, item_path.clone())
            .await
            .map_err(Error::ZBus)?;
        self.items_changed(&emitter).await.map_err(Error::ZBus)?;

        Ok((item_path, owned_path(paths::NO_PROMPT)?))
    }

    /// Object paths of the items in this collection.
    #[zbus(property)]
    async fn items(&self) -> Vec<OwnedObjectPath> {
        self.state
            .store
            .list_items(&self.name)
            .iter()
            .filter_map(|uuid| owned_path(&paths::item_path(&self.name, uuid)).ok())
            .collect()
    }

    /// Display label. Writes persist through the store before the
    /// properties-changed signal goes out.
    #[zbus(property)]
    async fn label(&self) -> String {
        self.state
            .store
            .get_collection(&self.name)
            .map(|c| c.label)
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn set_label(&self, label: String) -> zbus::fdo::Result<()> {
        self.state.activity.touch();
        self.state
            .store
            .update_collection_label(&self.name, &label)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Collections are permanently unlocked.
    #[zbus(property)]
    async fn locked(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn created(&self) -> u64 {
        self.state
            .store
            .get_collection(&self.name)
            .map(|c| c.created)
            .unwrap_or_default()
    }

    #[zbus(property)]
    async fn modified(&self) -> u64 {
        self.state
            .store
            .get_collection(&self.name)
            .map(|c| c.modified)
            .unwrap_or_default()
    }

    #[zbus(signal)]
    pub(crate) async fn item_created(
        emitter: &SignalEmitter<'_>,
        item: OwnedObjectPath,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn item_deleted(
        emitter: &SignalEmitter<'_>,
        item: OwnedObjectPath,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn item_changed(
        emitter: &SignalEmitter<'_>,
        item: OwnedObjectPath,
    ) -> zbus::Result<()>;
}

/// Exports a collection at its canonical path.
pub(crate) async fn export_collection(
    server: &ObjectServer,
    state: &Arc<ServiceState>,
    name: &str,
) -> zbus::Result<bool> {
    let path = paths::collection_path(name);
    server
        .at(path.as_str(), Collection::new(name, state.clone()))
        .await
}

/// Additionally exports a collection under an alias path, replacing any
/// previous binding there. Failure is logged, not fatal; the canonical
/// path keeps working.
pub(crate) async fn export_alias(
    server: &ObjectServer,
    state: &Arc<ServiceState>,
    alias: &str,
    name: &str,
) {
    let path = paths::alias_path(alias);
    let _ = server.remove::<Collection, _>(path.as_str()).await;
    if let Err(e) = server
        .at(path.as_str(), Collection::new(name, state.clone()))
        .await
    {
        warn!("export collection at alias path {path}: {e}");
    }
}

/// Removes the alias-path binding of a collection.
pub(crate) async fn unexport_alias(server: &ObjectServer, alias: &str) {
    let path = paths::alias_path(alias);
    let _ = server.remove::<Collection, _>(path.as_str()).await;
}

/// Re-announces the Items property of a collection after a change.
pub(crate) async fn refresh_items_property(server: &ObjectServer, collection: &str) {
    let path = paths::collection_path(collection);
    if let Ok(iface) = server.interface::<_, Collection>(path.as_str()).await {
        if let Err(e) = iface
            .get()
            .await
            .items_changed(iface.signal_emitter())
            .await
        {
            warn!("emit Items property change for {path}: {e}");
        }
    }
}
