//! Spawn-per-call bridge to the wincred helper.
//!
//! Every operation spawns a fresh helper process, writes one JSON
//! request line on its stdin, reads one JSON response line from its
//! stdout, and waits for it to exit. A zero exit with `ok=false` is a
//! logical error from the credential API; a non-zero exit is a transport
//! failure and is surfaced with the helper's stderr text.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::backend::{SecretBackend, MAX_SECRET_SIZE};
use crate::ipc::{Request, Response};
use wslss_common::{Error, Result};

/// File name of the helper executable.
pub const HELPER_NAME: &str = "wincred-helper.exe";

/// Talks to the Windows Credential Manager through a short-lived helper
/// process, one spawn per call.
pub struct WincredBridge {
    helper_path: PathBuf,
}

impl WincredBridge {
    /// Creates a bridge using the helper at `helper_path`, or discovers
    /// one in the standard locations when `None`.
    ///
    /// # Errors
    /// - No helper candidate exists
    pub fn new(helper_path: Option<PathBuf>) -> Result<Self> {
        let helper_path = match helper_path {
            Some(path) => path,
            None => find_helper()?,
        };
        debug!(helper = %helper_path.display(), "credential helper selected");
        Ok(Self { helper_path })
    }

    /// The helper executable in use.
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// Runs one helper invocation.
    async fn call(&self, request: &Request) -> Result<Response> {
        let mut line =
            serde_json::to_vec(request).map_err(|e| Error::Serialization(e.to_string()))?;
        line.push(b'\n');

        let mut child = Command::new(&self.helper_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Backend(format!("spawn {}: {e}", self.helper_path.display()))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Backend("helper stdin unavailable".to_string()))?;
        stdin.write_all(&line).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Backend(format!(
                "helper exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Serialization(format!("decode helper response: {e}")))
    }

    /// Maps a logical helper failure onto the common error classes.
    fn logical_error(op: &str, target: &str, response: Response) -> Error {
        let message = response
            .error
            .unwrap_or_else(|| "unknown helper error".to_string());
        if is_not_found(&message) {
            Error::NotFound(format!("{op} {target:?}: {message}"))
        } else {
            Error::Backend(format!("{op} {target:?}: {message}"))
        }
    }
}

#[async_trait::async_trait]
impl SecretBackend for WincredBridge {
    async fn get(&self, target: &str) -> Result<Vec<u8>> {
        let response = self
            .call(&Request {
                action: "get".to_string(),
                target: target.to_string(),
                secret: None,
                filter: None,
            })
            .await?;
        if !response.ok {
            return Err(Self::logical_error("get", target, response));
        }
        let encoded = response.secret.unwrap_or_default();
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| Error::Backend(format!("decode secret: {e}")))
    }

    async fn set(&self, target: &str, secret: &[u8]) -> Result<()> {
        if secret.len() > MAX_SECRET_SIZE {
            return Err(Error::TooLarge {
                size: secret.len(),
                limit: MAX_SECRET_SIZE,
            });
        }
        let response = self
            .call(&Request {
                action: "set".to_string(),
                target: target.to_string(),
                secret: Some(BASE64.encode(secret)),
                filter: None,
            })
            .await?;
        if !response.ok {
            return Err(Self::logical_error("set", target, response));
        }
        Ok(())
    }

    async fn delete(&self, target: &str) -> Result<()> {
        let response = self
            .call(&Request {
                action: "delete".to_string(),
                target: target.to_string(),
                secret: None,
                filter: None,
            })
            .await?;
        if !response.ok {
            return Err(Self::logical_error("delete", target, response));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .call(&Request {
                action: "list".to_string(),
                target: String::new(),
                secret: None,
                filter: Some(prefix.to_string()),
            })
            .await?;
        if !response.ok {
            return Err(Self::logical_error("list", prefix, response));
        }
        Ok(response.targets.unwrap_or_default())
    }
}

/// Searches the standard locations for the helper, first hit wins.
///
/// Order: directory of the running binary, `$XDG_DATA_HOME`,
/// `~/.local/share`, then `$PATH` (which includes Windows paths under
/// WSL2 interop).
fn find_helper() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join(HELPER_NAME));
        }
    }

    if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
        if !xdg_data.is_empty() {
            candidates.push(
                Path::new(&xdg_data)
                    .join("wsl-secret-service")
                    .join(HELPER_NAME),
            );
        }
    }

    if let Some(base) = directories::BaseDirs::new() {
        candidates.push(
            base.home_dir()
                .join(".local")
                .join("share")
                .join("wsl-secret-service")
                .join(HELPER_NAME),
        );
    }

    if let Ok(path_var) = env::var("PATH") {
        for dir in env::split_paths(&path_var) {
            candidates.push(dir.join(HELPER_NAME));
        }
    }

    candidates.into_iter().find(|c| c.is_file()).ok_or_else(|| {
        Error::Backend(format!(
            "{HELPER_NAME} not found; place it alongside wsl-secret-service \
             or in ~/.local/share/wsl-secret-service/"
        ))
    })
}

/// Whether a helper error message indicates a missing credential.
fn is_not_found(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["not found", "element not found", "no such"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for the helper.
    fn fake_helper(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-helper");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn bridge_with(dir: &TempDir, body: &str) -> WincredBridge {
        WincredBridge::new(Some(fake_helper(dir, body))).unwrap()
    }

    #[tokio::test]
    async fn test_get_decodes_base64_payload() {
        let dir = TempDir::new().unwrap();
        // "dGVzdC1zZWNyZXQ=" is base64("test-secret").
        let bridge = bridge_with(
            &dir,
            r#"cat > /dev/null; echo '{"ok":true,"secret":"dGVzdC1zZWNyZXQ="}'"#,
        );
        let secret = bridge.get("wsl-ss/login/existing").await.unwrap();
        assert_eq!(secret, b"test-secret");
    }

    #[tokio::test]
    async fn test_get_missing_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge_with(
            &dir,
            r#"cat > /dev/null; echo '{"ok":false,"error":"Element not found."}'"#,
        );
        let err = bridge.get("wsl-ss/login/absent").await.unwrap_err();
        assert!(err.is_not_found(), "unexpected error class: {err}");
    }

    #[tokio::test]
    async fn test_other_logical_errors_are_backend_failures() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge_with(
            &dir,
            r#"cat > /dev/null; echo '{"ok":false,"error":"access denied"}'"#,
        );
        let err = bridge.get("wsl-ss/login/x").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge_with(&dir, r#"cat > /dev/null; echo 'boom' >&2; exit 3"#);
        let err = bridge.get("wsl-ss/login/x").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_set_round_trips_request_fields() {
        let dir = TempDir::new().unwrap();
        let capture = dir.path().join("request.json");
        let bridge = bridge_with(
            &dir,
            &format!(r#"cat > {}; echo '{{"ok":true}}'"#, capture.display()),
        );

        bridge.set("wsl-ss/login/new", b"payload").await.unwrap();

        let captured: Request =
            serde_json::from_slice(&std::fs::read(&capture).unwrap()).unwrap();
        assert_eq!(captured.action, "set");
        assert_eq!(captured.target, "wsl-ss/login/new");
        assert_eq!(captured.secret.as_deref(), Some(BASE64.encode(b"payload").as_str()));
        assert!(captured.filter.is_none());
    }

    #[tokio::test]
    async fn test_set_enforces_size_bound_without_spawning() {
        // The helper path does not exist; the size check must fire first.
        let bridge = WincredBridge::new(Some(PathBuf::from("/nonexistent/helper"))).unwrap();
        let err = bridge
            .set("wsl-ss/login/big", &vec![0u8; MAX_SECRET_SIZE + 1])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooLarge { size: 2561, .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_maps_to_not_found() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge_with(
            &dir,
            r#"cat > /dev/null; echo '{"ok":false,"error":"no such credential"}'"#,
        );
        let err = bridge.delete("wsl-ss/login/gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_returns_targets() {
        let dir = TempDir::new().unwrap();
        let bridge = bridge_with(
            &dir,
            r#"cat > /dev/null; echo '{"ok":true,"targets":["wsl-ss/login/a","wsl-ss/login/b"]}'"#,
        );
        let targets = bridge.list("wsl-ss/").await.unwrap();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_not_found_classifier() {
        assert!(is_not_found("Element not found."));
        assert!(is_not_found("credential NOT FOUND"));
        assert!(is_not_found("no such credential"));
        assert!(!is_not_found("access denied"));
        assert!(!is_not_found(""));
    }
}
