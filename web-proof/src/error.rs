use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Stable classification of a [`WebProofError`], embedded in failed results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    InvalidNotaryUrl,
    InvalidOption,
    BindingLoadFailure,
    CapabilityMissing,
    Timeout,
    CapabilityInvocationFailure,
    MalformedResponse,
    SyncUnsupported,
}

/// Every failure the facade can surface.
///
/// Errors are `Clone` so that a terminal loader failure can be cached and
/// replayed verbatim to every later caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebProofError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    InvalidNotaryUrl(String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("Failed to load native binding: {0}")]
    BindingLoad(String),

    #[error(
        "Native binding at `{location}` is missing required operations: {}",
        .missing.join(", ")
    )]
    CapabilityMissing {
        location: String,
        missing: Vec<&'static str>,
    },

    #[error("`{operation}` timed out after {} ms", .timeout.as_millis())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("`{operation}` failed: {message}")]
    Invocation {
        operation: &'static str,
        message: String,
    },

    #[error("`{operation}` returned a malformed response: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },

    #[error(
        "Synchronous web proof generation is not supported; use the async web_proof instead"
    )]
    SyncUnsupported,
}

impl WebProofError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::InvalidNotaryUrl(_) => ErrorKind::InvalidNotaryUrl,
            Self::InvalidOption(_) => ErrorKind::InvalidOption,
            Self::BindingLoad(_) => ErrorKind::BindingLoadFailure,
            Self::CapabilityMissing { .. } => ErrorKind::CapabilityMissing,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Invocation { .. } => ErrorKind::CapabilityInvocationFailure,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::SyncUnsupported => ErrorKind::SyncUnsupported,
        }
    }

    pub(crate) fn invalid_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl(format!("Invalid URL format: {url}. {reason}"))
    }

    pub(crate) fn invalid_notary_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidNotaryUrl(format!("Invalid notary URL format: {url}. {reason}"))
    }

    pub(crate) fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption(message.into())
    }

    pub(crate) fn malformed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = WebProofError> = std::result::Result<T, E>;
