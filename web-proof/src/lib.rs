//! Client facade for notarized web proofs.
//!
//! Proofs are produced by an external capability module that is discovered
//! and loaded at runtime, with a bounded number of attempts. Every call into
//! the module runs under a deadline, and [`WebProofClient::web_proof`] reports
//! its outcome as a [`WebProofResult`] instead of an error.

pub mod binding;
mod client;
pub mod config;
mod error;
mod invoke;
mod logging;
mod request;
mod result;
mod target;

pub use client::WebProofClient;
pub use config::{notary::NotaryConfig, ProofConfig, ProofConfigBuilder};
pub use error::{ErrorKind, Result, WebProofError};
pub use invoke::CapabilityInvoker;
pub use logging::init_logging;
pub use request::{
    format_headers, validate_options, validate_target_url, HttpMethod, WebProofOptions,
    WebProofRequest,
};
pub use result::{PerformanceMetrics, Stopwatch, WebProofResponse, WebProofResult};
pub use target::{is_valid_url, parse_url, ParsedUrl};

use binding::BindingInfo;
use once_cell::sync::OnceCell;
use tracing::warn;

static DEFAULT_CLIENT: OnceCell<WebProofClient> = OnceCell::new();

/// Process-wide client used by the free functions, configured from the
/// environment on first use.
pub fn default_client() -> &'static WebProofClient {
    DEFAULT_CLIENT.get_or_init(|| {
        let config = ProofConfig::from_env().unwrap_or_else(|e| {
            warn!("ignoring web proof environment configuration: {:#}", e);
            ProofConfig::default()
        });
        WebProofClient::new(config)
    })
}

/// Installs `client` as the process-wide default. Fails, handing the client
/// back, once a default exists.
pub fn install_default_client(client: WebProofClient) -> std::result::Result<(), WebProofClient> {
    DEFAULT_CLIENT.set(client)
}

/// See [`WebProofClient::web_proof`]. Requires a tokio runtime.
pub async fn web_proof(url: &str, options: &WebProofOptions) -> WebProofResult {
    default_client().web_proof(url, options).await
}

/// See [`WebProofClient::simple_web_proof`]. Requires a tokio runtime.
pub async fn simple_web_proof(notary_host: &str, notary_port: i64, url: &str) -> Result<String> {
    default_client()
        .simple_web_proof(notary_host, notary_port, url)
        .await
}

pub fn web_proof_sync(url: &str, options: &WebProofOptions) -> Result<WebProofResult> {
    default_client().web_proof_sync(url, options)
}

pub fn is_binding_loaded() -> bool {
    default_client().is_binding_loaded()
}

pub fn binding_info() -> BindingInfo {
    default_client().binding_info()
}
