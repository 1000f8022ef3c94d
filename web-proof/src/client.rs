use crate::binding::{BindingInfo, NativeBindingLoader};
use crate::config::ProofConfig;
use crate::error::{Result, WebProofError};
use crate::invoke::CapabilityInvoker;
use crate::request::{validate_target_url, WebProofOptions, WebProofRequest};
use crate::result::{Stopwatch, WebProofResult};
use std::sync::Arc;
use tracing::debug;

/// Entry point for proof generation.
///
/// Each client owns its loader, so the capability module is resolved at most
/// once per client and a permanent load failure stays confined to it.
#[derive(Clone)]
pub struct WebProofClient {
    config: ProofConfig,
    loader: Arc<NativeBindingLoader>,
    invoker: CapabilityInvoker,
}

impl WebProofClient {
    /// Client loading the shared-library module from the configured locations.
    pub fn new(config: ProofConfig) -> Self {
        let loader = Arc::new(NativeBindingLoader::from_config(&config));
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: ProofConfig, loader: Arc<NativeBindingLoader>) -> Self {
        let invoker = CapabilityInvoker::new(loader.clone(), config.timeout);
        Self {
            config,
            loader,
            invoker,
        }
    }

    pub fn config(&self) -> &ProofConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<NativeBindingLoader> {
        &self.loader
    }

    /// Generates a proof for `url`.
    ///
    /// Never fails: every error, including invalid input, is reported in the
    /// returned result together with timing metrics.
    ///
    /// # Panics
    ///
    /// Must be polled within a tokio runtime with the timer enabled, since the
    /// capability call is spawned onto it and raced against a tokio timer.
    pub async fn web_proof(&self, url: &str, options: &WebProofOptions) -> WebProofResult {
        let stopwatch = Stopwatch::start();
        let outcome = self.try_web_proof(url, options).await;

        if let Err(err) = &outcome {
            debug!("web proof for {} failed: {}", url, err);
        }
        WebProofResult::normalize(outcome, &stopwatch)
    }

    async fn try_web_proof(&self, url: &str, options: &WebProofOptions) -> Result<String> {
        let request = WebProofRequest::build(url, options, &self.config)?;
        self.invoker.generate_web_proof(&request).await
    }

    /// Generates a proof with only a notary endpoint and a target URL.
    ///
    /// Unlike [`Self::web_proof`], failures are returned as errors.
    ///
    /// # Panics
    ///
    /// Once the arguments are valid, panics if polled outside a tokio runtime,
    /// like [`Self::web_proof`].
    pub async fn simple_web_proof(
        &self,
        notary_host: &str,
        notary_port: i64,
        url: &str,
    ) -> Result<String> {
        if notary_host.trim().is_empty() {
            return Err(WebProofError::invalid_option(
                "Notary host must be a non-empty string",
            ));
        }
        let notary_port = u16::try_from(notary_port)
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| {
                WebProofError::invalid_option("Notary port must be an integer between 1 and 65535")
            })?;
        validate_target_url(url)?;

        self.invoker
            .generate_simple_web_proof(notary_host, notary_port, url)
            .await
    }

    /// Synchronous generation is not offered; always fails.
    pub fn web_proof_sync(&self, _url: &str, _options: &WebProofOptions) -> Result<WebProofResult> {
        Err(WebProofError::SyncUnsupported)
    }

    pub fn is_binding_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    pub fn binding_info(&self) -> BindingInfo {
        self.loader.info()
    }
}

impl Default for WebProofClient {
    fn default() -> Self {
        Self::new(ProofConfig::default())
    }
}
