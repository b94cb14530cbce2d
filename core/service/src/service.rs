//! The root Service object and object-graph management.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zbus::object_server::{ObjectServer, SignalEmitter};
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::Connection;

use crate::collection;
use crate::error::{Error, Result};
use crate::item;
use crate::prompt::Prompt;
use crate::secret::{self, Secret, DEFAULT_CONTENT_TYPE};
use crate::session::{Session, SessionRecord};
use crate::state::ServiceState;
use wslss_bridge::item_target;
use wslss_common::paths;
use wslss_crypto::DhKeyPair;

/// Session algorithms accepted by OpenSession.
pub const ALGORITHM_PLAIN: &str = "plain";
pub const ALGORITHM_DH: &str = "dh-ietf1024-sha256-aes128-cbc-pkcs7";

/// Label recorded for collections created without one.
const FALLBACK_COLLECTION_LABEL: &str = "Secrets";

/// The org.freedesktop.Secret.Service object at `/org/freedesktop/secrets`.
pub struct Service {
    state: Arc<ServiceState>,
}

impl Service {
    pub fn new(state: Arc<ServiceState>) -> Self {
        Self { state }
    }
}

#[zbus::interface(name = "org.freedesktop.Secret.Service")]
impl Service {
    /// Opens a session with the given algorithm.
    ///
    /// `plain` returns an empty output; the DH algorithm expects the
    /// peer's public key as a byte array and returns the daemon's
    /// 128-byte public value.
    async fn open_session(
        &self,
        algorithm: &str,
        input: Value<'_>,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<(OwnedValue, OwnedObjectPath)> {
        self.state.activity.touch();

        let (record, output) = match algorithm {
            ALGORITHM_PLAIN => (SessionRecord::plain(), owned_value(Value::from(""))?),
            ALGORITHM_DH => {
                let peer_public: Vec<u8> = input.try_into().map_err(|_| {
                    Error::invalid_args("expected client DH public key as byte array")
                })?;
                if peer_public.is_empty() {
                    return Err(Error::invalid_args(
                        "expected client DH public key as byte array",
                    ));
                }
                let pair = DhKeyPair::generate();
                let public = pair.public_bytes().to_vec();
                let key = pair
                    .derive_session_key(&peer_public)
                    .map_err(|e| Error::failed(format!("derive session key: {e}")))?;
                (
                    SessionRecord::encrypted(key),
                    owned_value(Value::from(public))?,
                )
            }
            other => {
                return Err(Error::not_supported(format!(
                    "unsupported session algorithm {other:?}"
                )))
            }
        };

        let path = paths::session_path(&Uuid::new_v4().to_string());
        server
            .at(
                path.as_str(),
                Session::new(owned_path(&path)?, self.state.clone()),
            )
            .await
            .map_err(Error::ZBus)?;
        self.state.sessions.insert(path.clone(), record);

        debug!(session = %path, algorithm, "session opened");
        Ok((output, owned_path(&path)?))
    }

    /// Creates a collection, or returns the existing one when the alias
    /// already resolves. The prompt position is always `/`.
    async fn create_collection(
        &self,
        properties: HashMap<String, OwnedValue>,
        alias: &str,
        #[zbus(object_server)] server: &ObjectServer,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> Result<(OwnedObjectPath, OwnedObjectPath)> {
        self.state.activity.touch();

        let no_prompt = owned_path(paths::NO_PROMPT)?;

        if !alias.is_empty() {
            if let Some(existing) = self.state.store.get_alias(alias) {
                return Ok((owned_path(&paths::collection_path(&existing))?, no_prompt));
            }
        }

        let label = secret::string_prop(&properties, secret::COLLECTION_LABEL_KEY)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| FALLBACK_COLLECTION_LABEL.to_string());

        // Slug the label, then append digits until the name is free.
        let base = paths::collection_slug(&label);
        let mut name = base.clone();
        let mut suffix = 2;
        while self.state.store.contains_collection(&name) {
            name = format!("{base}{suffix}");
            suffix += 1;
        }

        self.state
            .store
            .create_collection(&name, &label)
            .map_err(Error::from_internal)?;

        if !alias.is_empty() {
            if let Err(e) = self.state.store.set_alias(alias, Some(&name)) {
                warn!("set alias {alias:?}: {e}");
            }
        }

        collection::export_collection(server, &self.state, &name)
            .await
            .map_err(|e| Error::failed(format!("export collection: {e}")))?;
        if !alias.is_empty() {
            collection::export_alias(server, &self.state, alias, &name).await;
        }

        let col_path = owned_path(&paths::collection_path(&name))?;
        Self::collection_created(&emitter, col_path.clone())
            .await
            .map_err(Error::ZBus)?;
        self.collections_changed(&emitter).await.map_err(Error::ZBus)?;

        info!(collection = %name, "collection created");
        Ok((col_path, no_prompt))
    }

    /// Finds items matching the attribute query across every collection.
    /// The locked bucket is always empty.
    async fn search_items(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(Vec<OwnedObjectPath>, Vec<OwnedObjectPath>)> {
        self.state.activity.touch();

        let refs = self.state.store.search_items(&attributes);
        let mut unlocked = Vec::with_capacity(refs.len());
        for item_ref in refs {
            unlocked.push(owned_path(&paths::item_path(
                &item_ref.collection,
                &item_ref.uuid,
            ))?);
        }
        Ok((unlocked, Vec::new()))
    }

    /// Everything is always unlocked; returns the input unchanged.
    async fn unlock(
        &self,
        objects: Vec<OwnedObjectPath>,
    ) -> Result<(Vec<OwnedObjectPath>, OwnedObjectPath)> {
        self.state.activity.touch();
        Ok((objects, owned_path(paths::NO_PROMPT)?))
    }

    /// Locking is not supported; returns an empty list.
    async fn lock(
        &self,
        objects: Vec<OwnedObjectPath>,
    ) -> Result<(Vec<OwnedObjectPath>, OwnedObjectPath)> {
        self.state.activity.touch();
        let _ = objects;
        Ok((Vec::new(), owned_path(paths::NO_PROMPT)?))
    }

    /// Fetches the secrets of the given items in one call.
    ///
    /// Items that do not resolve or whose payload cannot be read are
    /// omitted from the result.
    async fn get_secrets(
        &self,
        items: Vec<OwnedObjectPath>,
        session: OwnedObjectPath,
    ) -> Result<HashMap<OwnedObjectPath, Secret>> {
        self.state.activity.touch();

        let record = self
            .state
            .sessions
            .get(session.as_str())
            .ok_or_else(|| Error::NoSession(format!("session {session} is not open")))?;

        let mut secrets = HashMap::new();
        for item_path in items {
            let Some((collection, uuid)) = paths::item_from_path(item_path.as_str()) else {
                continue;
            };
            let collection = collection.to_string();
            let Some(meta) = self.state.store.get_item(&collection, &uuid) else {
                continue;
            };
            let Ok(payload) = self.state.backend.get(&item_target(&collection, &uuid)).await
            else {
                continue;
            };
            let content_type = if meta.content_type.is_empty() {
                DEFAULT_CONTENT_TYPE.to_string()
            } else {
                meta.content_type
            };
            match record.encode(&payload) {
                Ok((parameters, value)) => {
                    secrets.insert(
                        item_path,
                        Secret {
                            session: session.clone(),
                            parameters,
                            value,
                            content_type,
                        },
                    );
                }
                Err(e) => warn!("encrypt secret for {item_path}: {e}"),
            }
        }
        Ok(secrets)
    }

    /// Resolves an alias to a collection path, or `/` when unset.
    async fn read_alias(&self, name: &str) -> Result<OwnedObjectPath> {
        self.state.activity.touch();

        match self.state.store.get_alias(name) {
            Some(collection) => owned_path(&paths::collection_path(&collection)),
            None => owned_path(paths::NO_PROMPT),
        }
    }

    /// Points an alias at a collection, or removes it when the path is
    /// `/` or empty.
    async fn set_alias(
        &self,
        name: &str,
        collection: ObjectPath<'_>,
        #[zbus(object_server)] server: &ObjectServer,
    ) -> Result<()> {
        self.state.activity.touch();

        let col_str = collection.as_str();
        if col_str == paths::NO_PROMPT || col_str.is_empty() {
            self.state
                .store
                .set_alias(name, None)
                .map_err(Error::from_internal)?;
            collection::unexport_alias(server, name).await;
            return Ok(());
        }

        let col_name = paths::collection_name_from_path(col_str)
            .filter(|n| self.state.store.contains_collection(n))
            .ok_or_else(|| Error::invalid_args(format!("invalid collection path: {col_str}")))?
            .to_string();

        self.state
            .store
            .set_alias(name, Some(&col_name))
            .map_err(Error::from_internal)?;
        collection::export_alias(server, &self.state, name, &col_name).await;
        Ok(())
    }

    /// Object paths of all collections.
    #[zbus(property)]
    async fn collections(&self) -> Vec<OwnedObjectPath> {
        self.state
            .store
            .list_collections()
            .iter()
            .filter_map(|name| {
                ObjectPath::try_from(paths::collection_path(name))
                    .map(OwnedObjectPath::from)
                    .ok()
            })
            .collect()
    }

    #[zbus(signal)]
    pub(crate) async fn collection_created(
        emitter: &SignalEmitter<'_>,
        collection: OwnedObjectPath,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn collection_deleted(
        emitter: &SignalEmitter<'_>,
        collection: OwnedObjectPath,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub(crate) async fn collection_changed(
        emitter: &SignalEmitter<'_>,
        collection: OwnedObjectPath,
    ) -> zbus::Result<()>;
}

/// Exports the full object graph and starts the name-owner watcher.
///
/// Persisted collections or items that fail to export are logged and
/// skipped; a single bad object must not keep the daemon down.
pub async fn init(connection: &Connection, state: Arc<ServiceState>) -> zbus::Result<()> {
    let server = connection.object_server();

    server
        .at(paths::SERVICE_PATH, Service::new(state.clone()))
        .await?;
    server.at(paths::PROMPT_STUB_PATH, Prompt).await?;

    for name in state.store.list_collections() {
        if let Err(e) = collection::export_collection(server, &state, &name).await {
            warn!("could not load collection {name:?}: {e}");
            continue;
        }
        for uuid in state.store.list_items(&name) {
            if let Err(e) = item::export_item(connection, &state, &name, &uuid).await {
                warn!("could not export item {name}/{uuid}: {e}");
            }
        }
    }

    for (alias, col_name) in state.store.list_aliases() {
        collection::export_alias(server, &state, &alias, &col_name).await;
    }

    spawn_name_owner_watcher(connection.clone());

    info!("secret service object graph exported");
    Ok(())
}

/// Watches for clients dropping off the bus.
///
/// Per-sender session teardown is not wired up; sessions persist until
/// an explicit Close. The subscription keeps the cleanup hook in place.
fn spawn_name_owner_watcher(connection: Connection) {
    tokio::spawn(async move {
        let proxy = match zbus::fdo::DBusProxy::new(&connection).await {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!("subscribe to NameOwnerChanged: {e}");
                return;
            }
        };
        let mut stream = match proxy.receive_name_owner_changed().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("subscribe to NameOwnerChanged: {e}");
                return;
            }
        };
        while let Some(signal) = stream.next().await {
            let Ok(args) = signal.args() else { continue };
            if args.new_owner().is_none() {
                debug!(name = %args.name(), "bus client disconnected");
            }
        }
    });
}

/// Builds an owned object path from a string produced by the path codec.
pub(crate) fn owned_path(path: &str) -> Result<OwnedObjectPath> {
    ObjectPath::try_from(path)
        .map(OwnedObjectPath::from)
        .map_err(|e| Error::failed(format!("invalid object path {path:?}: {e}")))
}

/// Converts a value into its owned form for a variant return.
fn owned_value(value: Value<'_>) -> Result<OwnedValue> {
    value
        .try_to_owned()
        .map_err(|e| Error::failed(format!("encode variant: {e}")))
}
