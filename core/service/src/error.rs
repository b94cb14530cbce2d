//! Errors raised on the bus.

use zbus::fdo;

/// D-Bus error surface of the daemon.
///
/// Variants in the `org.freedesktop.Secret.Error` namespace are declared
/// directly; the generic `org.freedesktop.DBus.Error.*` classes are
/// wrapped through zbus and keep their own names on the wire.
#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.freedesktop.Secret.Error")]
pub enum Error {
    #[zbus(error)]
    ZBus(zbus::Error),

    /// Referenced session path is not in the registry.
    NoSession(String),

    /// Item or collection metadata is absent.
    NoSuchObject(String),

    /// Backend read failed while fetching an item's payload.
    IsLocked(String),
}

impl Error {
    /// org.freedesktop.DBus.Error.Failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self::ZBus(zbus::Error::FDO(Box::new(fdo::Error::Failed(
            message.into(),
        ))))
    }

    /// org.freedesktop.DBus.Error.InvalidArgs
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::ZBus(zbus::Error::FDO(Box::new(fdo::Error::InvalidArgs(
            message.into(),
        ))))
    }

    /// org.freedesktop.DBus.Error.NotSupported
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::ZBus(zbus::Error::FDO(Box::new(fdo::Error::NotSupported(
            message.into(),
        ))))
    }

    /// Maps a store or backend failure onto the generic Failed class.
    pub fn from_internal(err: wslss_common::Error) -> Self {
        Self::failed(err.to_string())
    }
}

/// Result type for bus method handlers.
pub type Result<T> = std::result::Result<T, Error>;
