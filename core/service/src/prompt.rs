//! Stub prompt object.

use zbus::fdo;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Value};

/// No-op implementation of org.freedesktop.Secret.Prompt.
///
/// Every collection is permanently unlocked, so no operation ever needs
/// user interaction: methods return `/` in the prompt position and
/// clients are not expected to call this object. It is exported because
/// the Secret Service specification requires a Prompt interface, and it
/// completes immediately when poked.
pub struct Prompt;

#[zbus::interface(name = "org.freedesktop.Secret.Prompt")]
impl Prompt {
    /// Completes immediately with `dismissed = false`.
    async fn prompt(
        &self,
        window_id: &str,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        let _ = window_id;
        Self::completed(&emitter, false, empty_result()?)
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    /// Reports dismissal with `dismissed = true`.
    async fn dismiss(
        &self,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<()> {
        Self::completed(&emitter, true, empty_result()?)
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    #[zbus(signal)]
    async fn completed(
        emitter: &SignalEmitter<'_>,
        dismissed: bool,
        result: OwnedValue,
    ) -> zbus::Result<()>;
}

fn empty_result() -> fdo::Result<OwnedValue> {
    Value::from("")
        .try_to_owned()
        .map_err(|e| fdo::Error::Failed(e.to_string()))
}
