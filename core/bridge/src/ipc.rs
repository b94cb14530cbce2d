//! Wire messages exchanged with the credential helper.
//!
//! One JSON request line on the helper's stdin, one JSON response line
//! on its stdout. Secret payloads travel base64-encoded to keep the wire
//! text 7-bit clean.

use serde::{Deserialize, Serialize};

/// Message written to the helper's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// "get", "set", "delete", or "list".
    pub action: String,
    /// Credential target name.
    #[serde(default)]
    pub target: String,
    /// Base64-encoded secret, present only for "set".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Target prefix, present only for "list".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Message read from the helper's stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    /// Base64-encoded secret, present only on a successful "get".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Matched targets, present only on a successful "list".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    /// Human-readable error, present only when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
