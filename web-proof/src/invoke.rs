//! Deadline-bounded calls into the capability module.
//!
//! A call is spawned onto the runtime and its join handle raced against a
//! timer. When the timer wins, the handle is dropped: the call keeps running
//! detached and whatever it eventually produces is discarded.
//!
//! Both steps need a tokio runtime with the timer enabled; polling an
//! invocation outside one panics.

use crate::binding::{
    NativeBindingLoader, Operation, GENERATE_SIMPLE_WEB_PROOF, GENERATE_WEB_PROOF,
};
use crate::error::{Result, WebProofError};
use crate::request::WebProofRequest;
use crate::result::WebProofResponse;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CapabilityInvoker {
    loader: Arc<NativeBindingLoader>,
    timeout: Duration,
}

impl CapabilityInvoker {
    pub fn new(loader: Arc<NativeBindingLoader>, timeout: Duration) -> Self {
        Self { loader, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `generate_web_proof` with the serialized request and returns the proof.
    pub async fn generate_web_proof(&self, request: &WebProofRequest) -> Result<String> {
        let handle = self.loader.load()?;
        let params = serde_json::to_value(request)
            .map_err(|e| WebProofError::malformed(GENERATE_WEB_PROOF, e.to_string()))?;

        let value = self
            .invoke(GENERATE_WEB_PROOF, handle.web_proof(), vec![params])
            .await?;

        let response: WebProofResponse = serde_json::from_value(value).map_err(|e| {
            WebProofError::malformed(GENERATE_WEB_PROOF, format!("unexpected shape: {e}"))
        })?;
        response.into_proof(GENERATE_WEB_PROOF)
    }

    /// Runs `generate_simple_web_proof`, which must return the proof string.
    pub async fn generate_simple_web_proof(
        &self,
        notary_host: &str,
        notary_port: u16,
        url: &str,
    ) -> Result<String> {
        let handle = self.loader.load()?;
        let args = vec![
            Value::from(notary_host),
            Value::from(notary_port),
            Value::from(url),
        ];

        match self
            .invoke(GENERATE_SIMPLE_WEB_PROOF, handle.simple_web_proof(), args)
            .await?
        {
            Value::String(proof) => Ok(proof),
            other => Err(WebProofError::malformed(
                GENERATE_SIMPLE_WEB_PROOF,
                format!("expected a string, got {other}"),
            )),
        }
    }

    async fn invoke(
        &self,
        operation: &'static str,
        call: &Operation,
        args: Vec<Value>,
    ) -> Result<Value> {
        debug!("invoking `{}` with a {:?} deadline", operation, self.timeout);

        let task = tokio::spawn(call(args));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => {
                warn!(
                    "`{}` did not settle within {:?}; abandoning the call",
                    operation, self.timeout
                );
                Err(WebProofError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
            Ok(Err(join_error)) => Err(WebProofError::Invocation {
                operation,
                message: format!("capability call panicked: {join_error}"),
            }),
            Ok(Ok(Err(message))) => Err(WebProofError::Invocation { operation, message }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}
