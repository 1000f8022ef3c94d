use crate::error::{Result, WebProofError};
use crate::target::effective_port;
use ::url::Url;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct NotaryConfig {
    /// The host of the notary server
    #[builder(setter(into))]
    pub host: String,
    /// The port of the notary server
    #[builder(setter(into))]
    pub port: u16,
    /// The route prefix for notary requests, without surrounding slashes
    #[builder(setter(into), default)]
    pub path_prefix: String,
    /// Whether the notary is reached over TLS
    #[builder(default = "true")]
    pub enable_tls: bool,
}

impl NotaryConfig {
    pub fn builder() -> NotaryConfigBuilder {
        NotaryConfigBuilder::default()
    }

    /// Parses a notary endpoint such as `https://notary.example.com:7047/api/`.
    pub fn parse(notary_url: &str) -> Result<Self> {
        if notary_url.trim().is_empty() {
            return Err(WebProofError::InvalidNotaryUrl(
                "Notary URL must be a non-empty string".to_string(),
            ));
        }

        let url = Url::parse(notary_url)
            .map_err(|e| WebProofError::invalid_notary_url(notary_url, e))?;

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                WebProofError::invalid_notary_url(
                    notary_url,
                    "Notary URL must contain a valid hostname",
                )
            })?;

        let port = effective_port(&url)
            .map_err(|reason| WebProofError::invalid_notary_url(notary_url, reason))?;

        Self::builder()
            .host(host)
            .port(port)
            .path_prefix(url.path().trim_matches('/'))
            .enable_tls(url.scheme() == "https")
            .build()
            .map_err(|e| WebProofError::invalid_notary_url(notary_url, e))
    }

    /// Renders the config back into an endpoint URL.
    pub fn url(&self) -> String {
        let scheme = if self.enable_tls { "https" } else { "http" };
        if self.path_prefix.is_empty() {
            format!("{scheme}://{}:{}", self.host, self.port)
        } else {
            format!("{scheme}://{}:{}/{}", self.host, self.port, self.path_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_tls_notary_with_prefix() {
        let config = NotaryConfig::parse("https://notary.example.com:7047/api/").unwrap();
        assert_eq!(
            config,
            NotaryConfig {
                host: "notary.example.com".to_string(),
                port: 7047,
                path_prefix: "api".to_string(),
                enable_tls: true,
            }
        );
    }

    #[test]
    fn test_parse_plain_http_notary() {
        let config = NotaryConfig::parse("http://notary.example.com:7047").unwrap();
        assert!(!config.enable_tls);
        assert_eq!(config.port, 7047);
        assert_eq!(config.path_prefix, "");
    }

    #[test]
    fn test_strips_every_surrounding_slash() {
        let config = NotaryConfig::parse("https://notary.example.com//v0.1/api//").unwrap();
        assert_eq!(config.path_prefix, "v0.1/api");
        assert_eq!(config.port, 443);
    }

    #[test]
    fn test_rejects_empty_notary_url() {
        let err = NotaryConfig::parse("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNotaryUrl);
        assert_eq!(err.to_string(), "Notary URL must be a non-empty string");
    }

    #[test]
    fn test_rejects_out_of_range_port() {
        let err = NotaryConfig::parse("https://notary.com:70000").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNotaryUrl);
        assert!(err.to_string().contains("Invalid notary URL format"));
    }

    #[test]
    fn test_rejects_missing_hostname() {
        let err = NotaryConfig::parse("mailto:notary@example.com").unwrap_err();
        assert!(err.to_string().contains("valid hostname"));
    }

    #[test]
    fn test_url_renders_back() {
        let config = NotaryConfig::builder()
            .host("127.0.0.1")
            .port(7047u16)
            .enable_tls(false)
            .build()
            .unwrap();
        assert_eq!(config.url(), "http://127.0.0.1:7047");

        let config = NotaryConfig::parse("https://notary.example.com/api/").unwrap();
        assert_eq!(config.url(), "https://notary.example.com:443/api");
    }
}
