//! Shared-library capability modules.
//!
//! A native module exports, with C linkage:
//!
//! - `char *generate_web_proof(const char *args_json)`
//! - `char *generate_simple_web_proof(const char *args_json)`
//! - `void web_proof_free_string(char *)`
//!
//! `args_json` is the JSON array of positional arguments. Each operation
//! returns a JSON envelope, either `{"ok": <value>}` or `{"error": "<message>"}`,
//! which the caller hands back to `web_proof_free_string` once read.

use super::{CapabilityModule, ModuleResolver, Operation};
use anyhow::{bail, Context};
use futures::FutureExt;
use libloading::Library;
use serde::Deserialize;
use serde_json::Value;
use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

type RawOperation = unsafe extern "C" fn(*const c_char) -> *mut c_char;
type RawFree = unsafe extern "C" fn(*mut c_char);

const FREE_STRING_SYMBOL: &[u8] = b"web_proof_free_string\0";

/// Resolves locations by loading them as shared libraries.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibraryResolver;

impl ModuleResolver for LibraryResolver {
    fn resolve(&self, location: &Path) -> anyhow::Result<Arc<dyn CapabilityModule>> {
        // A bare file name would make the dynamic linker search its own paths.
        if !location.is_file() {
            bail!("file not found");
        }

        // SAFETY: loading runs the library's initialisers. Candidate locations
        // are install paths of the capability module.
        let library = unsafe { Library::new(location) }
            .with_context(|| format!("Failed to open {}", location.display()))?;

        // SAFETY: the symbol is declared with the signature of the ABI above.
        let free = unsafe { library.get::<RawFree>(FREE_STRING_SYMBOL) }
            .map(|symbol| *symbol)
            .context("missing `web_proof_free_string` export")?;

        debug!("opened native module {}", location.display());

        Ok(Arc::new(NativeModule {
            library: Arc::new(library),
            free,
        }))
    }
}

struct NativeModule {
    library: Arc<Library>,
    free: RawFree,
}

impl CapabilityModule for NativeModule {
    fn operation(&self, name: &str) -> Option<Operation> {
        let symbol = CString::new(name).ok()?;
        // SAFETY: the symbol is declared with the signature of the ABI above.
        let call = unsafe { self.library.get::<RawOperation>(symbol.as_bytes_with_nul()) }
            .map(|symbol| *symbol)
            .ok()?;

        let library = self.library.clone();
        let free = self.free;

        Some(Arc::new(move |args: Vec<Value>| {
            call_blocking(library.clone(), call, free, args).boxed()
        }))
    }
}

async fn call_blocking(
    library: Arc<Library>,
    call: RawOperation,
    free: RawFree,
    args: Vec<Value>,
) -> Result<Value, String> {
    let payload = serde_json::to_string(&args).map_err(|e| e.to_string())?;

    tokio::task::spawn_blocking(move || {
        // The library must stay mapped until the call returns.
        let _library = library;
        call_native(call, free, &payload)
    })
    .await
    .map_err(|e| format!("native call did not complete: {e}"))?
}

fn call_native(call: RawOperation, free: RawFree, payload: &str) -> Result<Value, String> {
    let input = CString::new(payload).map_err(|e| e.to_string())?;

    // SAFETY: `input` is NUL-terminated and outlives the call. The returned
    // string is owned by the module until passed to `free`.
    let output = unsafe { call(input.as_ptr()) };
    if output.is_null() {
        return Err("native call returned a null pointer".to_string());
    }
    let text = unsafe { CStr::from_ptr(output) }
        .to_string_lossy()
        .into_owned();
    unsafe { free(output) };

    decode_envelope(&text)
}

#[derive(Deserialize)]
enum Envelope {
    #[serde(rename = "ok")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(String),
}

fn decode_envelope(text: &str) -> Result<Value, String> {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope::Success(value)) => Ok(value),
        Ok(Envelope::Failure(message)) => Err(message),
        Err(e) => Err(format!("undecodable native response: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_success_envelope() {
        assert_eq!(
            decode_envelope(r#"{"ok":{"success":true,"data":"abc"}}"#),
            Ok(json!({"success": true, "data": "abc"}))
        );
        assert_eq!(decode_envelope(r#"{"ok":"proof"}"#), Ok(json!("proof")));
    }

    #[test]
    fn test_decode_error_envelope() {
        assert_eq!(
            decode_envelope(r#"{"error":"notary unreachable"}"#),
            Err("notary unreachable".to_string())
        );
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_envelope("not json").unwrap_err();
        assert!(err.starts_with("undecodable native response"));
        assert!(decode_envelope(r#"{"other":1}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_not_opened() {
        let err = LibraryResolver
            .resolve(Path::new("definitely/not/here/libweb_proof_engine.so"))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_non_library_file_fails_to_open() {
        let path = std::env::temp_dir().join(format!(
            "web-proof-not-a-library-{}.so",
            std::process::id()
        ));
        std::fs::write(&path, b"plain text").unwrap();

        let err = LibraryResolver.resolve(&path).err().unwrap();
        assert!(err.to_string().starts_with("Failed to open"));

        std::fs::remove_file(&path).unwrap();
    }
}
