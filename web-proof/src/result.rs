//! Result normalization and timing.

use crate::error::{ErrorKind, Result, WebProofError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use tokio::time::Instant;

/// Raw outcome of `generate_web_proof`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebProofResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WebProofResponse {
    pub(crate) fn into_proof(self, operation: &'static str) -> Result<String> {
        match (self.success, self.data) {
            (true, Some(proof)) if !proof.is_empty() => Ok(proof),
            (true, _) => Err(WebProofError::malformed(
                operation,
                "success reported without proof data",
            )),
            (false, _) => Err(WebProofError::Invocation {
                operation,
                message: self
                    .error
                    .unwrap_or_else(|| "Unknown error occurred".to_string()),
            }),
        }
    }
}

/// Timing of one public call, captured when it settles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Monotonic elapsed time, serialized in milliseconds
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Resident set size in bytes, where the platform reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Wall-clock start plus a monotonic reference for the duration.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn finish(&self) -> PerformanceMetrics {
        let duration = self.elapsed();
        let end_time = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| self.started_at.checked_add_signed(d))
            .unwrap_or(self.started_at);

        PerformanceMetrics {
            start_time: self.started_at,
            end_time,
            duration,
            memory_usage: resident_memory(),
        }
    }
}

#[cfg(target_os = "linux")]
fn resident_memory() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory() -> Option<u64> {
    None
}

/// Public outcome of `web_proof`. Failures are carried, never raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebProofResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
}

impl WebProofResult {
    /// Maps an outcome to the public shape, timing it against `stopwatch`.
    pub fn normalize(outcome: Result<String>, stopwatch: &Stopwatch) -> Self {
        let metrics = Some(stopwatch.finish());
        match outcome {
            Ok(proof) => Self {
                success: true,
                proof: Some(proof),
                error: None,
                error_kind: None,
                metrics,
            },
            Err(err) => Self {
                success: false,
                proof: None,
                error: Some(err.to_string()),
                error_kind: Some(err.kind()),
                metrics,
            },
        }
    }
}
