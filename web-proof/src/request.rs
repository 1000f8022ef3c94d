//! Request validation and normalization.
//!
//! Caller options arrive loosely typed (`WebProofOptions`) and leave as an
//! immutable, fully defaulted `WebProofRequest`, which is also the parameter
//! object handed to the capability module.

use crate::config::notary::NotaryConfig;
use crate::config::ProofConfig;
use crate::error::{Result, WebProofError};
use crate::target::parse_url;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};

/// HTTP verbs accepted for the proven request.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

/// Caller-supplied options. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebProofOptions {
    /// Host to connect to instead of the URL's domain
    pub host: Option<String>,
    pub notary_url: Option<String>,
    pub method: Option<String>,
    /// Raw `Name: value` header lines
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub max_sent_data: Option<i64>,
    pub max_recv_data: Option<i64>,
}

/// Normalized request, serialized as the `generate_web_proof` parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebProofRequest {
    url: String,
    host: Option<String>,
    notary_url: Option<String>,
    method: Option<HttpMethod>,
    headers: Vec<String>,
    data: Option<String>,
    max_sent_data: Option<u32>,
    max_recv_data: Option<u32>,
}

/// Checks the options against their declared constraints.
pub fn validate_options(options: &WebProofOptions) -> Result<()> {
    positive_bound("max_sent_data", options.max_sent_data)?;
    positive_bound("max_recv_data", options.max_recv_data)?;

    if let Some(method) = &options.method {
        parse_method(method)?;
    }

    if let Some(host) = &options.host {
        if host.trim().is_empty() {
            return Err(WebProofError::invalid_option(
                "host must be a non-empty string when provided",
            ));
        }
    }

    if let Some(notary_url) = &options.notary_url {
        NotaryConfig::parse(notary_url)?;
    }

    Ok(())
}

/// Checks that the proof target is an absolute `http`/`https` URL with a host.
pub fn validate_target_url(url: &str) -> Result<()> {
    let parsed = parse_url(url)?;
    match parsed.protocol.as_str() {
        "https:" | "http:" => Ok(()),
        other => Err(WebProofError::invalid_url(
            url,
            format!("Unsupported protocol: {other}"),
        )),
    }
}

/// Drops empty and whitespace-only header lines, keeping order.
pub fn format_headers(headers: Option<&[String]>) -> Vec<String> {
    headers
        .unwrap_or_default()
        .iter()
        .filter(|header| !header.trim().is_empty())
        .cloned()
        .collect()
}

fn parse_method(method: &str) -> Result<HttpMethod> {
    HttpMethod::from_str(method)
        .map_err(|_| WebProofError::invalid_option(format!("Invalid HTTP method: {method}")))
}

fn positive_bound(name: &str, value: Option<i64>) -> Result<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    WebProofError::invalid_option(format!("{name} must be a positive integer"))
                })
        })
        .transpose()
}

impl WebProofRequest {
    /// Validates `url` and `options`, then applies the configured defaults.
    pub fn build(url: &str, options: &WebProofOptions, config: &ProofConfig) -> Result<Self> {
        validate_target_url(url)?;
        validate_options(options)?;

        let method = options.method.as_deref().map(parse_method).transpose()?;

        let max_sent_data = positive_bound("max_sent_data", options.max_sent_data)?
            .unwrap_or(config.max_sent_data);
        let max_recv_data = positive_bound("max_recv_data", options.max_recv_data)?
            .unwrap_or(config.max_recv_data);

        Ok(Self {
            url: url.to_string(),
            host: options.host.clone(),
            notary_url: Some(
                options
                    .notary_url
                    .clone()
                    .unwrap_or_else(|| config.default_notary_url()),
            ),
            method,
            headers: format_headers(options.headers.as_deref()),
            data: options.data.clone(),
            max_sent_data: Some(max_sent_data),
            max_recv_data: Some(max_recv_data),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn notary_url(&self) -> Option<&str> {
        self.notary_url.as_deref()
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn max_sent_data(&self) -> Option<u32> {
        self.max_sent_data
    }

    pub fn max_recv_data(&self) -> Option<u32> {
        self.max_recv_data
    }
}
