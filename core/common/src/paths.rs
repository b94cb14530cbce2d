//! Bus path layout for the Secret Service object graph.
//!
//! All exported objects live under `/org/freedesktop/secrets`. Item and
//! session identifiers are UUIDs, which contain hyphens; D-Bus path
//! elements cannot, so the codec maps `-` to `_` on the way out and back
//! on the way in. Vault target strings keep their hyphens; the
//! substitution applies to bus paths only.

/// Well-known bus name claimed by the daemon.
pub const BUS_NAME: &str = "org.freedesktop.secrets";

/// Path of the root Service object.
pub const SERVICE_PATH: &str = "/org/freedesktop/secrets";

/// Prefix under which collections are exported.
pub const COLLECTION_PREFIX: &str = "/org/freedesktop/secrets/collection/";

/// Prefix under which aliased collections are additionally exported.
pub const ALIAS_PREFIX: &str = "/org/freedesktop/secrets/aliases/";

/// Prefix under which sessions are exported.
pub const SESSION_PREFIX: &str = "/org/freedesktop/secrets/session/";

/// Path of the no-op prompt object.
pub const PROMPT_STUB_PATH: &str = "/org/freedesktop/secrets/prompt/stub";

/// Sentinel returned in the prompt position when no user interaction is
/// needed.
pub const NO_PROMPT: &str = "/";

/// Name of the always-present collection seeded on first start.
pub const LOGIN_COLLECTION: &str = "login";

/// Name of the alias that must always resolve.
pub const DEFAULT_ALIAS: &str = "default";

/// Bus path for a named collection.
pub fn collection_path(name: &str) -> String {
    format!("{COLLECTION_PREFIX}{name}")
}

/// Bus path for an aliased collection.
pub fn alias_path(alias: &str) -> String {
    format!("{ALIAS_PREFIX}{alias}")
}

/// Bus path for an item within a collection.
pub fn item_path(collection: &str, uuid: &str) -> String {
    format!("{COLLECTION_PREFIX}{collection}/{}", uuid.replace('-', "_"))
}

/// Bus path for a session.
pub fn session_path(id: &str) -> String {
    format!("{SESSION_PREFIX}{}", id.replace('-', "_"))
}

/// Extracts the collection name from a collection or item path.
///
/// Returns `None` when the path is not under the collection prefix or the
/// name segment is empty.
pub fn collection_name_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(COLLECTION_PREFIX)?;
    let name = match rest.find('/') {
        Some(i) => &rest[..i],
        None => rest,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Extracts `(collection, uuid)` from an item path, mapping the path's
/// underscores back to the hyphens used in the store and the vault.
///
/// Returns `None` for anything that is not an item path.
pub fn item_from_path(path: &str) -> Option<(&str, String)> {
    let rest = path.strip_prefix(COLLECTION_PREFIX)?;
    let (collection, encoded) = rest.split_once('/')?;
    if collection.is_empty() || encoded.is_empty() {
        return None;
    }
    Some((collection, encoded.replace('_', "-")))
}

/// Converts a human-readable label into a collection name.
///
/// Lowercases the label and keeps only `[a-z0-9]`; an empty result falls
/// back to `"collection"`. Uniqueness is the caller's concern.
pub fn collection_slug(label: &str) -> String {
    let slug: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if slug.is_empty() {
        "collection".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path() {
        assert_eq!(
            collection_path("login"),
            "/org/freedesktop/secrets/collection/login"
        );
    }

    #[test]
    fn test_item_path_substitutes_hyphens() {
        let path = item_path("login", "ab-cd-ef");
        assert_eq!(path, "/org/freedesktop/secrets/collection/login/ab_cd_ef");
        assert!(!path.contains('-'));
    }

    #[test]
    fn test_item_round_trip() {
        let uuid = "0f2d3c4b-5a69-4878-9796-a5b4c3d2e1f0";
        let path = item_path("work", uuid);
        let (collection, decoded) = item_from_path(&path).unwrap();
        assert_eq!(collection, "work");
        assert_eq!(decoded, uuid);
    }

    #[test]
    fn test_collection_name_from_item_path() {
        let path = item_path("login", "ab-cd");
        assert_eq!(collection_name_from_path(&path), Some("login"));
    }

    #[test]
    fn test_foreign_paths_yield_nothing() {
        assert_eq!(collection_name_from_path("/org/freedesktop/secrets"), None);
        assert_eq!(collection_name_from_path("/something/else"), None);
        assert_eq!(item_from_path("/org/freedesktop/secrets/collection/login"), None);
        assert_eq!(item_from_path("/"), None);
    }

    #[test]
    fn test_session_path() {
        assert_eq!(
            session_path("ab-cd"),
            "/org/freedesktop/secrets/session/ab_cd"
        );
    }

    #[test]
    fn test_slug_keeps_lower_alphanumerics() {
        assert_eq!(collection_slug("My Secrets 2"), "mysecrets2");
        assert_eq!(collection_slug("LOGIN"), "login");
    }

    #[test]
    fn test_slug_fallback() {
        assert_eq!(collection_slug(""), "collection");
        assert_eq!(collection_slug("!!! ---"), "collection");
    }
}
