//! The Secret wire structure and property map handling.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Type};

use wslss_store::ItemMeta;

/// Property keys used by CreateCollection and CreateItem.
pub const COLLECTION_LABEL_KEY: &str = "org.freedesktop.Secret.Collection.Label";
pub const ITEM_LABEL_KEY: &str = "org.freedesktop.Secret.Item.Label";
pub const ITEM_ATTRIBUTES_KEY: &str = "org.freedesktop.Secret.Item.Attributes";

/// Content type recorded for payloads whose creator did not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=utf8";

/// A secret as it travels across the bus, D-Bus signature `(oayays)`.
///
/// For plain sessions `parameters` is empty and `value` is the raw
/// payload. For DH sessions `parameters` is the 16-byte IV and `value`
/// is the AES-128-CBC ciphertext.
#[derive(Clone, Deserialize, Serialize, Type)]
pub struct Secret {
    /// Session that encoded this secret.
    pub session: OwnedObjectPath,
    /// Cipher parameters.
    pub parameters: Vec<u8>,
    /// Raw or encrypted payload.
    pub value: Vec<u8>,
    /// MIME content type of the payload.
    pub content_type: String,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("session", &self.session)
            .field("parameters", &format_args!("[{} bytes]", self.parameters.len()))
            .field("value", &format_args!("[REDACTED; {} bytes]", self.value.len()))
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Extracts a string-typed entry from a properties map.
pub(crate) fn string_prop(props: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    props.get(key).and_then(|v| String::try_from(v.clone()).ok())
}

/// Extracts an attribute map from a properties map.
pub(crate) fn attrs_prop(
    props: &HashMap<String, OwnedValue>,
    key: &str,
) -> Option<HashMap<String, String>> {
    props
        .get(key)
        .and_then(|v| HashMap::<String, String>::try_from(v.clone()).ok())
}

/// Builds item metadata from a CreateItem properties map.
///
/// The label is read from the Item interface key; the Collection
/// interface key is tolerated as a fallback for sloppy callers.
/// Timestamps are left zero for the store to fill in.
pub(crate) fn item_meta_from_properties(props: &HashMap<String, OwnedValue>) -> ItemMeta {
    let label = string_prop(props, ITEM_LABEL_KEY)
        .or_else(|| string_prop(props, COLLECTION_LABEL_KEY))
        .unwrap_or_default();
    let attributes = attrs_prop(props, ITEM_ATTRIBUTES_KEY).unwrap_or_default();
    ItemMeta {
        label,
        attributes,
        created: 0,
        modified: 0,
        content_type: DEFAULT_CONTENT_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zbus::zvariant::Value;

    fn owned(value: Value<'_>) -> OwnedValue {
        value.try_to_owned().unwrap()
    }

    #[test]
    fn test_secret_signature() {
        assert_eq!(Secret::SIGNATURE.to_string(), "(oayays)");
    }

    #[test]
    fn test_debug_redacts_value() {
        let secret = Secret {
            session: OwnedObjectPath::try_from("/org/freedesktop/secrets/session/s1").unwrap(),
            parameters: vec![],
            value: b"hunter2".to_vec(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        };
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_item_meta_from_properties() {
        let mut props = HashMap::new();
        props.insert(ITEM_LABEL_KEY.to_string(), owned(Value::from("Test Password")));
        let mut attrs = HashMap::new();
        attrs.insert("service".to_string(), "github.com".to_string());
        attrs.insert("username".to_string(), "testuser".to_string());
        props.insert(ITEM_ATTRIBUTES_KEY.to_string(), owned(Value::from(attrs)));

        let meta = item_meta_from_properties(&props);
        assert_eq!(meta.label, "Test Password");
        assert_eq!(
            meta.attributes.get("service").map(String::as_str),
            Some("github.com")
        );
        assert_eq!(meta.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(meta.created, 0);
    }

    #[test]
    fn test_item_meta_tolerates_collection_label_key() {
        let mut props = HashMap::new();
        props.insert(
            COLLECTION_LABEL_KEY.to_string(),
            owned(Value::from("Fallback")),
        );
        let meta = item_meta_from_properties(&props);
        assert_eq!(meta.label, "Fallback");
        assert!(meta.attributes.is_empty());
    }

    #[test]
    fn test_item_meta_defaults_when_empty() {
        let meta = item_meta_from_properties(&HashMap::new());
        assert_eq!(meta.label, "");
        assert!(meta.attributes.is_empty());
        assert_eq!(meta.content_type, DEFAULT_CONTENT_TYPE);
    }
}
