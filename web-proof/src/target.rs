//! Target URL parsing.

use crate::error::{Result, WebProofError};
use serde::{Deserialize, Serialize};
use ::url::Url;

const HTTPS_PORT: u16 = 443;
const HTTP_PORT: u16 = 80;

/// Structural parts of a proof target URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUrl {
    pub domain: String,
    /// Path, query and fragment, e.g. `/path?q=1#h`
    pub uri: String,
    /// Scheme with its trailing colon, e.g. `https:`
    pub protocol: String,
    pub port: u16,
}

/// Parses and validates a target URL.
///
/// The port falls back to 443 for `https` and 80 for anything else.
pub fn parse_url(url: &str) -> Result<ParsedUrl> {
    if url.trim().is_empty() {
        return Err(WebProofError::InvalidUrl(
            "URL must be a non-empty string".to_string(),
        ));
    }

    let parsed = Url::parse(url).map_err(|e| WebProofError::invalid_url(url, e))?;

    let domain = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| WebProofError::invalid_url(url, "URL has no host"))?
        .to_string();

    let port = effective_port(&parsed).map_err(|reason| WebProofError::invalid_url(url, reason))?;

    let mut uri = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        uri.push('?');
        uri.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        uri.push('#');
        uri.push_str(fragment);
    }

    Ok(ParsedUrl {
        domain,
        uri,
        protocol: format!("{}:", parsed.scheme()),
        port,
    })
}

/// Returns true if the string parses as a URL at all.
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// Explicit port, or the scheme default. `url` already rejects ports above 65535.
pub(crate) fn effective_port(url: &Url) -> std::result::Result<u16, String> {
    match url.port() {
        Some(0) => Err("Invalid port number: 0".to_string()),
        Some(port) => Ok(port),
        None if url.scheme() == "https" => Ok(HTTPS_PORT),
        None => Ok(HTTP_PORT),
    }
}
