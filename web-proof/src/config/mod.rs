use crate::config::notary::NotaryConfig;
use anyhow::{Context, Result};
use derive_builder::Builder;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub mod notary;

// Notary defaults
pub const DEFAULT_NOTARY_HOST: &str = "127.0.0.1";
pub const DEFAULT_NOTARY_PORT: u16 = 7047;

// Byte budget defaults for TLS notarization
pub const DEFAULT_MAX_SENT_DATA: u32 = 4 * 1024; // 4 KiB
pub const DEFAULT_MAX_RECV_DATA: u32 = 16 * 1024; // 16 KiB

/// Deadline for a single capability invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Resolution waves before a load failure becomes permanent.
pub const DEFAULT_MAX_LOAD_ATTEMPTS: u32 = 3;

const NOTARY_HOST_ENV_VAR: &str = "WEB_PROOF_NOTARY_HOST";
const NOTARY_PORT_ENV_VAR: &str = "WEB_PROOF_NOTARY_PORT";
const NOTARY_TLS_ENV_VAR: &str = "WEB_PROOF_NOTARY_TLS";
const NOTARY_URL_ENV_VAR: &str = "WEB_PROOF_NOTARY_URL";
const MAX_SENT_DATA_ENV_VAR: &str = "WEB_PROOF_MAX_SENT_DATA";
const MAX_RECV_DATA_ENV_VAR: &str = "WEB_PROOF_MAX_RECV_DATA";
const TIMEOUT_MS_ENV_VAR: &str = "WEB_PROOF_TIMEOUT_MS";
const MODULE_DIR_ENV_VAR: &str = "WEB_PROOF_MODULE_DIR";

/// Facade configuration. Every field has a default.
#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned", default, build_fn(validate = "Self::validate"))]
pub struct ProofConfig {
    /// Notary host used when a request names no notary
    #[builder(setter(into))]
    pub notary_host: String,
    /// Notary port used when a request names no notary
    pub notary_port: u16,
    /// Whether the default notary is reached over TLS
    pub notary_tls: bool,
    /// Full default notary URL; takes precedence over host/port/tls
    #[builder(setter(into, strip_option))]
    pub notary_url: Option<String>,
    /// Maximum number of bytes sent to the server when a request sets no bound
    pub max_sent_data: u32,
    /// Maximum number of bytes received from the server when a request sets no bound
    pub max_recv_data: u32,
    /// Deadline for each capability invocation
    pub timeout: Duration,
    /// Failed resolution waves tolerated before the loader gives up for good
    pub max_load_attempts: u32,
    /// Extra directory searched first for the capability module
    #[builder(setter(into, strip_option))]
    pub module_dir: Option<PathBuf>,
    /// Explicit candidate list; replaces the platform defaults entirely
    #[builder(setter(strip_option))]
    pub candidate_locations: Option<Vec<PathBuf>>,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            notary_host: DEFAULT_NOTARY_HOST.to_string(),
            notary_port: DEFAULT_NOTARY_PORT,
            notary_tls: false,
            notary_url: None,
            max_sent_data: DEFAULT_MAX_SENT_DATA,
            max_recv_data: DEFAULT_MAX_RECV_DATA,
            timeout: DEFAULT_TIMEOUT,
            max_load_attempts: DEFAULT_MAX_LOAD_ATTEMPTS,
            module_dir: None,
            candidate_locations: None,
        }
    }
}

impl ProofConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.notary_port == Some(0) {
            return Err("notary_port must be between 1 and 65535".to_string());
        }
        if self.max_sent_data == Some(0) || self.max_recv_data == Some(0) {
            return Err("byte bounds must be positive".to_string());
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err("timeout must be positive".to_string());
        }
        if self.max_load_attempts == Some(0) {
            return Err("max_load_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ProofConfig {
    pub fn builder() -> ProofConfigBuilder {
        ProofConfigBuilder::default()
    }

    /// Loads the configuration from the process environment, after preloading
    /// a `.env` file if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    /// Unset and blank variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut builder = Self::builder();

        if let Some(host) = var(NOTARY_HOST_ENV_VAR) {
            builder = builder.notary_host(host.trim());
        }
        if let Some(port) = var(NOTARY_PORT_ENV_VAR) {
            builder = builder.notary_port(parse_var(NOTARY_PORT_ENV_VAR, &port)?);
        }
        if let Some(tls) = var(NOTARY_TLS_ENV_VAR) {
            builder = builder.notary_tls(parse_var(NOTARY_TLS_ENV_VAR, &tls)?);
        }
        if let Some(url) = var(NOTARY_URL_ENV_VAR) {
            NotaryConfig::parse(&url).context("Failed to load notary URL")?;
            builder = builder.notary_url(url.trim());
        }
        if let Some(sent) = var(MAX_SENT_DATA_ENV_VAR) {
            builder = builder.max_sent_data(parse_var(MAX_SENT_DATA_ENV_VAR, &sent)?);
        }
        if let Some(recv) = var(MAX_RECV_DATA_ENV_VAR) {
            builder = builder.max_recv_data(parse_var(MAX_RECV_DATA_ENV_VAR, &recv)?);
        }
        if let Some(timeout) = var(TIMEOUT_MS_ENV_VAR) {
            let millis: u64 = parse_var(TIMEOUT_MS_ENV_VAR, &timeout)?;
            builder = builder.timeout(Duration::from_millis(millis));
        }
        if let Some(dir) = var(MODULE_DIR_ENV_VAR) {
            builder = builder.module_dir(dir);
        }

        let config = builder
            .build()
            .context("Failed to build web proof configuration")?;

        debug!("loaded web proof configuration: {:?}", config);

        Ok(config)
    }

    /// Notary URL applied to requests that do not name one.
    pub fn default_notary_url(&self) -> String {
        match &self.notary_url {
            Some(url) => url.clone(),
            None => NotaryConfig {
                host: self.notary_host.clone(),
                port: self.notary_port,
                path_prefix: String::new(),
                enable_tls: self.notary_tls,
            }
            .url(),
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: `{value}`"))
}
