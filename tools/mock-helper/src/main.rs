//! mock-wincred-helper - Linux-native stand-in for wincred-helper.exe.
//!
//! Used during development and testing in environments without the
//! Windows side. Stores secrets as a JSON map in a file named by the
//! `MOCK_WINCRED_STORE` environment variable (default:
//! `/tmp/mock-wincred-store.json`).
//!
//! Protocol: identical to wincred-helper.exe. Reads one JSON request
//! line from stdin, writes one JSON response line to stdout, then
//! exits. Exit code 0 means a response was written (including `ok=false`
//! responses); non-zero means a fatal error.
//!
//! Usage:
//!
//!     MOCK_WINCRED_STORE=/path/to/store.json wsl-secret-service \
//!         --helper-path ./mock-wincred-helper \
//!         --disable-memprotect

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use wslss_bridge::ipc::{Request, Response};

fn main() -> ExitCode {
    let request: Request = match serde_json::from_reader(io::stdin().lock()) {
        Ok(request) => request,
        Err(e) => return fatal(format!("decode request: {e}")),
    };

    let path = store_path();
    let mut store = match load_store(&path) {
        Ok(store) => store,
        Err(e) => return fatal(format!("load store: {e:#}")),
    };

    let (response, mutated) = handle(&mut store, &request);

    if mutated && response.ok {
        if let Err(e) = save_store(&path, &store) {
            return fatal(format!("save store: {e:#}"));
        }
    }

    respond(&response);
    ExitCode::SUCCESS
}

fn store_path() -> PathBuf {
    env::var("MOCK_WINCRED_STORE")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/mock-wincred-store.json"))
}

fn load_store(path: &Path) -> Result<HashMap<String, String>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).context("decode store"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e).context("read store"),
    }
}

fn save_store(path: &Path, store: &HashMap<String, String>) -> Result<()> {
    let bytes = serde_json::to_vec(store).context("encode store")?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).context("write store")?;
    fs::rename(&tmp, path).context("replace store")?;
    Ok(())
}

/// Applies one request to the store. Returns the response and whether
/// the store was mutated.
fn handle(store: &mut HashMap<String, String>, request: &Request) -> (Response, bool) {
    match request.action.as_str() {
        "get" => match store.get(&request.target) {
            Some(secret) => (
                Response {
                    ok: true,
                    secret: Some(secret.clone()),
                    ..Default::default()
                },
                false,
            ),
            None => (not_found(), false),
        },
        "set" => {
            store.insert(
                request.target.clone(),
                request.secret.clone().unwrap_or_default(),
            );
            (ok(), true)
        }
        "delete" => {
            if store.remove(&request.target).is_some() {
                (ok(), true)
            } else {
                (not_found(), false)
            }
        }
        "list" => {
            let filter = request.filter.as_deref().unwrap_or("");
            let targets: Vec<String> = store
                .keys()
                .filter(|k| k.starts_with(filter))
                .cloned()
                .collect();
            (
                Response {
                    ok: true,
                    targets: Some(targets),
                    ..Default::default()
                },
                false,
            )
        }
        other => (
            Response {
                ok: false,
                error: Some(format!("unknown action: {other:?}")),
                ..Default::default()
            },
            false,
        ),
    }
}

fn ok() -> Response {
    Response {
        ok: true,
        ..Default::default()
    }
}

fn not_found() -> Response {
    Response {
        ok: false,
        error: Some("credential not found".to_string()),
        ..Default::default()
    }
}

fn respond(response: &Response) {
    // Failing to write stdout leaves nothing useful to report to.
    if let Ok(line) = serde_json::to_string(response) {
        println!("{line}");
    }
}

fn fatal(message: String) -> ExitCode {
    respond(&Response {
        ok: false,
        error: Some(message),
        ..Default::default()
    });
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: &str, target: &str) -> Request {
        Request {
            action: action.to_string(),
            target: target.to_string(),
            secret: None,
            filter: None,
        }
    }

    #[test]
    fn test_get_and_set() {
        let mut store = HashMap::new();
        let mut set = request("set", "wsl-ss/login/a");
        set.secret = Some("c2VjcmV0".to_string());

        let (response, mutated) = handle(&mut store, &set);
        assert!(response.ok);
        assert!(mutated);

        let (response, mutated) = handle(&mut store, &request("get", "wsl-ss/login/a"));
        assert!(response.ok);
        assert!(!mutated);
        assert_eq!(response.secret.as_deref(), Some("c2VjcmV0"));
    }

    #[test]
    fn test_get_missing_reports_not_found() {
        let mut store = HashMap::new();
        let (response, _) = handle(&mut store, &request("get", "absent"));
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_delete_only_mutates_when_present() {
        let mut store = HashMap::from([("t".to_string(), "v".to_string())]);
        let (response, mutated) = handle(&mut store, &request("delete", "t"));
        assert!(response.ok);
        assert!(mutated);

        let (response, mutated) = handle(&mut store, &request("delete", "t"));
        assert!(!response.ok);
        assert!(!mutated);
    }

    #[test]
    fn test_list_honours_filter() {
        let mut store = HashMap::from([
            ("wsl-ss/login/a".to_string(), "1".to_string()),
            ("other/b".to_string(), "2".to_string()),
        ]);
        let mut list = request("list", "");
        list.filter = Some("wsl-ss/".to_string());

        let (response, _) = handle(&mut store, &list);
        assert_eq!(response.targets.unwrap(), vec!["wsl-ss/login/a"]);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let mut store = HashMap::new();
        let (response, mutated) = handle(&mut store, &request("frobnicate", "t"));
        assert!(!response.ok);
        assert!(!mutated);
    }
}
